#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    service_bootstrap::run_service().await
}
