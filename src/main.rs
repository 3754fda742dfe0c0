use rask_ingest::error::AppError;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    rask_ingest::app::run().await
}
