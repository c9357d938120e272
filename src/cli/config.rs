//! Conversion of CLI arguments into a configured client

use crate::cli::main_impl::Cli;
use crate::tracing_config::{TracingConfig, TracingOutput};
use crate::{ClientOptions, HostConfig, RemoveBg, RequestOptions, ReturnFormat};
use anyhow::{bail, Context, Result};
use base64::Engine as _;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How the positional input is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InputKind {
    /// `http://` or `https://` address
    Url(String),
    /// `-`: base64 text on stdin
    Stdin,
    /// Local file path
    File(PathBuf),
}

impl InputKind {
    pub(crate) fn parse(input: &str) -> Self {
        if input == "-" {
            Self::Stdin
        } else if input.starts_with("http://") || input.starts_with("https://") {
            Self::Url(input.to_string())
        } else {
            Self::File(PathBuf::from(input))
        }
    }
}

/// Where the result goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OutputTarget {
    Stdout,
    File(PathBuf),
}

/// Split `key=value`; the value may itself contain `=`
pub(crate) fn parse_key_value(arg: &str) -> Result<(String, String)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        },
        _ => bail!("Expected KEY=VALUE, got '{}'", arg),
    }
}

/// Convert CLI arguments to a configured client
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Logging settings from `-v`, `--log-format`, `--log-file` and `--log-filter`
    pub(crate) fn tracing_config(cli: &Cli) -> TracingConfig {
        let mut config = TracingConfig::new()
            .with_verbosity(cli.verbose)
            .with_format(cli.log_format)
            .with_session_id(uuid::Uuid::new_v4().to_string());
        if let Some(path) = &cli.log_file {
            config = config.with_output(TracingOutput::File(path.clone()));
        }
        if let Some(filter) = &cli.log_filter {
            config = config.with_filter(filter.as_str());
        }
        config
    }

    /// Load host configuration from `--config` or the default locations
    pub(crate) fn host_config(cli: &Cli) -> Result<HostConfig> {
        match &cli.config {
            Some(path) => Ok(HostConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?
                .apply_env(|key| std::env::var(key).ok())),
            None => HostConfig::load().context("Failed to load host configuration"),
        }
    }

    /// Build a client without an image source (used for `--account`)
    pub(crate) fn base_client(cli: &Cli, host: &HostConfig) -> Result<RemoveBg> {
        let headers = cli
            .header
            .iter()
            .map(|h| parse_key_value(h))
            .collect::<Result<Vec<_>>>()
            .context("Invalid --header")?;

        let mut options = ClientOptions::new();
        if let Some(key) = &cli.api_key {
            options = options.api_key(key.as_str());
        }

        let mut request_options = RequestOptions::new();
        if let Some(secs) = cli.timeout {
            request_options = request_options.with_timeout(Duration::from_secs(secs));
        }
        if cli.http_errors {
            request_options = request_options.with_http_errors(true);
        }

        let mut client = RemoveBg::from_options(options, host)
            .context("Failed to create remove.bg client")?
            .headers(headers)
            .request_options(request_options);
        if let Some(endpoint) = &cli.endpoint {
            client = client.endpoint(endpoint.as_str());
        }
        Ok(client)
    }

    /// Build the full request from CLI arguments
    pub(crate) fn from_cli(cli: &Cli, host: &HostConfig) -> Result<RemoveBg> {
        let Some(input) = cli.input.as_deref() else {
            bail!("An input file, URL or '-' is required");
        };

        let mut client = Self::base_client(cli, host)?;

        client = match InputKind::parse(input) {
            InputKind::Url(url) => client.url(url),
            InputKind::Stdin => {
                let mut data = String::new();
                std::io::stdin()
                    .read_to_string(&mut data)
                    .context("Failed to read base64 image from stdin")?;
                client.base64(data.trim())
            },
            InputKind::File(path) if cli.inline => {
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                client.base64(base64::engine::general_purpose::STANDARD.encode(bytes))
            },
            InputKind::File(path) => client.file(path),
        };

        if let Some(size) = &cli.size {
            client = client.field("size", size.as_str());
        }
        let fields = cli
            .field
            .iter()
            .map(|f| parse_key_value(f))
            .collect::<Result<Vec<_>>>()
            .context("Invalid --field")?;
        client = client.body(fields);

        if cli.base64 {
            client = client.return_format(ReturnFormat::Base64);
        }

        Ok(client)
    }

    /// Resolve the output target; defaults to `<stem>-no-bg.png` next to a file input
    pub(crate) fn output_target(cli: &Cli) -> OutputTarget {
        match cli.output.as_deref() {
            Some("-") => OutputTarget::Stdout,
            Some(path) => OutputTarget::File(PathBuf::from(path)),
            None => match cli.input.as_deref().map(InputKind::parse) {
                Some(InputKind::File(path)) => OutputTarget::File(default_output_path(&path)),
                Some(InputKind::Url(url)) => {
                    let name = url
                        .rsplit('/')
                        .next()
                        .and_then(|last| last.split(['?', '#']).next())
                        .filter(|name| !name.is_empty())
                        .unwrap_or("image");
                    OutputTarget::File(default_output_path(Path::new(name)))
                },
                Some(InputKind::Stdin) | None => OutputTarget::Stdout,
            },
        }
    }
}

/// `photo.jpg` -> `photo-no-bg.png` in the same directory
pub(crate) fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned());
    input.with_file_name(format!("{stem}-no-bg.png"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracing_config::TracingFormat;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("removebg").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn test_input_kind() {
        assert_eq!(InputKind::parse("-"), InputKind::Stdin);
        assert_eq!(
            InputKind::parse("https://example.com/a.jpg"),
            InputKind::Url("https://example.com/a.jpg".to_string())
        );
        assert_eq!(
            InputKind::parse("photos/a.jpg"),
            InputKind::File(PathBuf::from("photos/a.jpg"))
        );
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("size=auto").unwrap(),
            ("size".to_string(), "auto".to_string())
        );
        assert_eq!(
            parse_key_value("bg_color=a=b").unwrap(),
            ("bg_color".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("dir/photo.jpg")),
            PathBuf::from("dir/photo-no-bg.png")
        );
        assert_eq!(
            default_output_path(Path::new("noext")),
            PathBuf::from("noext-no-bg.png")
        );
    }

    #[test]
    fn test_output_target() {
        assert_eq!(
            CliConfigBuilder::output_target(&cli(&["a.jpg", "-o", "-"])),
            OutputTarget::Stdout
        );
        assert_eq!(
            CliConfigBuilder::output_target(&cli(&["a.jpg"])),
            OutputTarget::File(PathBuf::from("a-no-bg.png"))
        );
        assert_eq!(
            CliConfigBuilder::output_target(&cli(&["https://example.com/img/cat.jpg?w=1"])),
            OutputTarget::File(PathBuf::from("cat-no-bg.png"))
        );
        assert_eq!(
            CliConfigBuilder::output_target(&cli(&["-"])),
            OutputTarget::Stdout
        );
    }

    #[test]
    fn test_tracing_config_from_flags() {
        let config = CliConfigBuilder::tracing_config(&cli(&[
            "a.jpg",
            "-vv",
            "--log-format",
            "json",
            "--log-file",
            "logs/removebg.log",
            "--log-filter",
            "removebg_client=trace",
        ]));
        assert_eq!(config.verbosity, 2);
        assert_eq!(config.format, TracingFormat::Json);
        assert_eq!(
            config.output,
            TracingOutput::File(PathBuf::from("logs/removebg.log"))
        );
        assert_eq!(config.filter_directives(), "removebg_client=trace");
        assert!(config.session_id.is_some());
        assert!(!config.uses_ansi());
    }

    #[test]
    fn test_tracing_config_defaults() {
        let config = CliConfigBuilder::tracing_config(&cli(&["a.jpg", "--log-format", "compact"]));
        assert_eq!(config.format, TracingFormat::Compact);
        assert_eq!(config.output, TracingOutput::Stderr);
        assert!(Cli::try_parse_from(["removebg", "a.jpg", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn test_from_cli_builds_request() {
        let args = cli(&[
            "https://example.com/cat.jpg",
            "--api-key",
            "k",
            "--size",
            "preview",
            "--field",
            "type=person",
            "--header",
            "X-Trace=1",
            "--base64",
            "--http-errors",
            "--timeout",
            "30",
        ]);
        let client = CliConfigBuilder::from_cli(&args, &HostConfig::default()).unwrap();

        let payload = client.payload().unwrap();
        assert_eq!(payload.text_field("image_url"), Some("https://example.com/cat.jpg"));
        assert_eq!(payload.text_field("size"), Some("preview"));
        assert_eq!(payload.text_field("type"), Some("person"));
        assert_eq!(client.header_set().get("X-Trace"), Some("1"));
        assert_eq!(client.format(), ReturnFormat::Base64);
        assert!(client.options().strict_http_errors());
        assert_eq!(client.options().timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_from_cli_requires_api_key() {
        let args = cli(&["photo.jpg"]);
        let err = CliConfigBuilder::from_cli(&args, &HostConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("removebg.api_key"));
    }

    #[test]
    fn test_from_cli_inline_encodes_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("tiny.png");
        std::fs::write(&path, b"foo").unwrap();

        let path_arg = path.to_string_lossy().into_owned();
        let args = cli(&[path_arg.as_str(), "--inline"]);
        let client = CliConfigBuilder::from_cli(&args, &HostConfig::with_api_key("k")).unwrap();
        assert_eq!(client.payload().unwrap().text_field("image_file_b64"), Some("Zm9v"));
    }
}
