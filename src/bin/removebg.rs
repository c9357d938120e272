//! remove.bg CLI tool
//!
//! Command-line interface for the remove.bg background removal API.

use removebg_client::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}
