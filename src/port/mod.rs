pub mod search_engine;
pub mod storage_forwarder;

pub use search_engine::SearchEngine;
pub use storage_forwarder::StorageForwarder;
