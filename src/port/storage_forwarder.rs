use crate::error::ForwardError;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

/// Durable object storage for finished batch files.
///
/// One call is one upload attempt; implementations never retry.
/// This trait is dyn-compatible by using boxed futures instead of `impl Future`.
pub trait StorageForwarder: Send + Sync {
    fn upload<'a>(
        &'a self,
        local_path: &'a Path,
        bucket: &'a str,
        object_name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ForwardError>> + Send + 'a>>;
}
