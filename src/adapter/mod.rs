pub mod elasticsearch;
pub mod object_storage;

pub use elasticsearch::{ElasticsearchClient, ElasticsearchConfig};
pub use object_storage::ObjectStoreForwarder;
