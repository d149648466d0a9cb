#[tokio::main]
async fn main() -> anyhow::Result<()> {
    studytrack_lib::run().await
}
