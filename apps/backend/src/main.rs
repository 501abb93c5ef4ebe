#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kioku_backend::run().await
}
