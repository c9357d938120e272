#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

//! # remove.bg client
//!
//! An async client for the [remove.bg](https://www.remove.bg) background removal API,
//! with a blocking facade and an optional command-line interface.
//!
//! A [`RemoveBg`] value collects one request through chainable calls: the image
//! source (local file, public URL or base64 data), extra body fields such as
//! `size` or `type`, headers and transport options. A terminal call then performs
//! exactly one HTTP round trip and returns the processed image as raw bytes or
//! base64 text, or writes it to disk.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use removebg_client::{RemoveBg, RequestOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> removebg_client::Result<()> {
//! // Raw PNG bytes from a local file
//! let png = RemoveBg::new("my-api-key")?
//!     .file("portrait.jpg")
//!     .body([("size", "auto")])
//!     .request_options(RequestOptions::new().with_timeout(Duration::from_secs(60)))
//!     .get()
//!     .await?;
//!
//! // Base64 text for a remote image
//! let b64 = RemoveBg::new("my-api-key")?
//!     .url("https://example.com/cat.jpg")
//!     .get_base64()
//!     .await?;
//!
//! // Remaining credits
//! let account = RemoveBg::new("my-api-key")?.account_info().await?;
//! println!("{} bytes, {} chars, {} credits", png.len(), b64.len(), account.credits.total);
//! # Ok(())
//! # }
//! ```
//!
//! ## Host applications
//!
//! ```rust,no_run
//! use removebg_client::{ClientOptions, HostConfig, RemoveBg};
//!
//! # fn example() -> removebg_client::Result<()> {
//! // Reads <config dir>/removebg/config.json and REMOVEBG_API_KEY
//! let host = HostConfig::load()?;
//! let client = RemoveBg::from_options(ClientOptions::new(), &host)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): the `removebg` binary and subscriber setup in [`tracing_config`]
//!   (console, compact or JSON lines, to stderr or a log file)
//!
//! To use only as a library without CLI dependencies:
//!
//! ```toml
//! [dependencies]
//! removebg-client = { version = "0.2", default-features = false }
//! ```

pub mod account;
pub mod blocking;
#[cfg(feature = "cli")]
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod payload;
pub mod request;
pub mod response;
pub mod tracing_config;
pub mod transport;

/// Default background removal endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.remove.bg/v1.0/removebg";

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// User agent sent with every request
pub const USER_AGENT: &str = concat!(
    "removebg-client-rs/",
    env!("CARGO_PKG_VERSION"),
    " (github.com/imgly/removebg-client-rs)"
);

// Public API exports
pub use account::{AccountInfo, ApiAllowance, Credits};
pub use blocking::BlockingClient;
pub use client::RemoveBg;
pub use config::{
    ClientOptions, HostConfig, RemoveBgSection, RequestOptions, ReturnFormat, API_KEY_CONFIG_KEY,
    API_KEY_ENV,
};
pub use error::{RemoveBgError, Result};
pub use payload::{format_file_name, BodyFields, ImageSource, Part, PartContents, Payload};
pub use request::{Headers, PreparedRequest};
pub use response::{has_errors, ImageContents, Outcome};
pub use transport::{RawResponse, ReqwestTransport, Transport};

pub use tracing_config::{TracingConfig, TracingFormat, TracingOutput};
