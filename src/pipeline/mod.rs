pub mod batch_writer;
pub mod index_publisher;
pub mod orchestrator;

pub use batch_writer::{BatchFile, BatchWriter};
pub use index_publisher::{IndexPublisher, IndexResult, IndexStatus};
pub use orchestrator::{IngestReceipt, IngestionPipeline, Stage};
