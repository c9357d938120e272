//! remove.bg CLI
//!
//! Command-line interface for removing image backgrounds through the remove.bg API.

use super::config::{CliConfigBuilder, OutputTarget};
use crate::client::write_output;
use crate::tracing_config::TracingFormat;
use crate::{ImageContents, RemoveBg};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Remove image backgrounds with the remove.bg API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "removebg")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Image file, http(s) URL, or "-" to read base64 data from stdin
    #[arg(value_name = "INPUT", required_unless_present = "account")]
    pub input: Option<String>,

    /// Output file. Use "-" for stdout [default: <input stem>-no-bg.png]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// API key [default: removebg.api_key from the config file or REMOVEBG_API_KEY]
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// JSON configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the API endpoint
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Output size (preview, full, auto, ...)
    #[arg(long)]
    pub size: Option<String>,

    /// Extra body field KEY=VALUE (repeatable)
    #[arg(short = 'F', long, value_name = "KEY=VALUE")]
    pub field: Vec<String>,

    /// Extra request header KEY=VALUE (repeatable)
    #[arg(short = 'H', long, value_name = "KEY=VALUE")]
    pub header: Vec<String>,

    /// Request base64 output; decoded before writing to a file
    #[arg(long)]
    pub base64: bool,

    /// Send a local file inline as base64 instead of a multipart upload
    #[arg(long)]
    pub inline: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Treat 5xx responses as errors too
    #[arg(long)]
    pub http_errors: bool,

    /// Hold an exclusive lock on the output file while writing
    #[arg(long)]
    pub lock: bool,

    /// Print the account balance and exit
    #[arg(long)]
    pub account: bool,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log line format
    #[arg(long, value_enum, default_value_t = TracingFormat::Console)]
    pub log_format: TracingFormat,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Filter directives such as "removebg_client=debug" (overrides -v)
    #[arg(long, value_name = "DIRECTIVES", env = "RUST_LOG")]
    pub log_filter: Option<String>,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    CliConfigBuilder::tracing_config(&cli)
        .init()
        .context("Failed to initialize tracing")?;

    let host = CliConfigBuilder::host_config(&cli)?;

    if cli.account {
        let client = CliConfigBuilder::base_client(&cli, &host)?;
        return show_account(&client).await;
    }

    let client = CliConfigBuilder::from_cli(&cli, &host).context("Invalid arguments")?;
    let target = CliConfigBuilder::output_target(&cli);
    debug!(?target, format = %client.format(), "Resolved request");

    let start_time = Instant::now();
    let written = run(&cli, &client, &target).await?;
    info!(
        bytes = written,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Background removed"
    );

    if let OutputTarget::File(path) = &target {
        eprintln!("Saved {} ({} bytes)", path.display(), written);
    }
    Ok(())
}

async fn run(cli: &Cli, client: &RemoveBg, target: &OutputTarget) -> Result<usize> {
    match target {
        // Raw results go straight through the library's save path.
        OutputTarget::File(path) if !cli.base64 => client
            .save_with_lock(path, cli.lock)
            .await
            .with_context(|| format!("Failed to save {}", path.display())),
        OutputTarget::File(path) => {
            let contents = client.get().await.context("Background removal failed")?;
            write_decoded(path, &contents, cli.lock)
        },
        OutputTarget::Stdout => {
            let contents = client.get().await.context("Background removal failed")?;
            write_stdout(&contents)
        },
    }
}

/// Decode base64 contents and write them through the same (optionally locked) writer as `save`
fn write_decoded(path: &Path, contents: &ImageContents, lock: bool) -> Result<usize> {
    let bytes = contents.decode().context("Invalid base64 in response")?;
    write_output(path, &bytes, lock).with_context(|| format!("Failed to save {}", path.display()))
}

fn write_stdout(contents: &ImageContents) -> Result<usize> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(contents.as_bytes())
        .and_then(|()| stdout.flush())
        .context("Failed to write to stdout")?;
    Ok(contents.len())
}

async fn show_account(client: &RemoveBg) -> Result<()> {
    let info = client
        .account_info()
        .await
        .context("Failed to fetch account balance")?;

    println!("Credits");
    println!("  total:          {}", info.credits.total);
    println!("  subscription:   {}", info.credits.subscription);
    println!("  pay-as-you-go:  {}", info.credits.payg);
    println!("  enterprise:     {}", info.credits.enterprise);
    println!("API");
    println!("  free calls:     {}", info.api.free_calls);
    println!("  sizes:          {}", info.api.sizes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use tempfile::TempDir;

    #[test]
    fn test_write_decoded_replaces_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.png");
        std::fs::write(&path, b"previous, much longer contents").unwrap();

        let contents = ImageContents::Base64(
            base64::engine::general_purpose::STANDARD.encode(b"\x89PNG-data"),
        );
        for lock in [true, false] {
            let written = write_decoded(&path, &contents, lock).unwrap();
            assert_eq!(written, 9);
            assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG-data");
        }
    }

    #[test]
    fn test_write_decoded_rejects_invalid_base64() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.png");
        let err = write_decoded(&path, &ImageContents::Base64("@@@".to_string()), true)
            .unwrap_err();
        assert!(format!("{err:#}").contains("Invalid base64"));
        assert!(!path.exists());
    }
}
