#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    fluent_cli::cli::run().await
}
