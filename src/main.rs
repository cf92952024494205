use anyhow::Result;
use mysqld_exporter::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::start().await
}
