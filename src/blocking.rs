//! Blocking client built on `reqwest::blocking`.
//!
//! Requests are configured with the same [`RemoveBg`] builder; a
//! [`BlockingClient`] then performs the round trip on the calling thread.
//! Do not call these from inside an async runtime; use the async terminals there.
//!
//! ```rust,no_run
//! use removebg_client::{blocking::BlockingClient, RemoveBg};
//!
//! # fn example() -> removebg_client::Result<()> {
//! let request = RemoveBg::new("my-api-key")?.url("https://example.com/cat.jpg");
//! let http = BlockingClient::new()?;
//! let written = http.save(&request, "cat-no-bg.png")?;
//! # Ok(())
//! # }
//! ```

use crate::client::{write_output, RemoveBg};
use crate::config::{RequestOptions, ReturnFormat};
use crate::error::{RemoveBgError, Result};
use crate::payload::{Part, PartContents, Payload};
use crate::request::PreparedRequest;
use crate::response::{extract, settle, ImageContents};
use crate::tracing_config::spans;
use crate::transport::RawResponse;
use crate::AccountInfo;
use reqwest::blocking::{multipart, Client as HttpClient};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Synchronous HTTP executor for [`RemoveBg`] requests
#[derive(Clone, Debug)]
pub struct BlockingClient {
    http: HttpClient,
    custom: bool,
    derived: Arc<Mutex<HashMap<Duration, HttpClient>>>,
}

impl BlockingClient {
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: HttpClient::builder().build()?,
            custom: false,
            derived: Arc::default(),
        })
    }

    /// Use a preconfigured client; its own connect timeout applies to every request
    #[must_use]
    pub fn with_http_client(http: HttpClient) -> Self {
        Self {
            http,
            custom: true,
            derived: Arc::default(),
        }
    }

    fn http_for(&self, options: &RequestOptions) -> Result<HttpClient> {
        match options.connect_timeout {
            Some(timeout) if !self.custom => {
                let mut derived = self.derived.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(http) = derived.get(&timeout) {
                    return Ok(http.clone());
                }
                let http = HttpClient::builder().connect_timeout(timeout).build()?;
                derived.insert(timeout, http.clone());
                Ok(http)
            },
            _ => Ok(self.http.clone()),
        }
    }

    fn send(&self, request: PreparedRequest) -> Result<RawResponse> {
        let options = request.options;
        let description = request.describe();
        debug!(request = %description, headers = request.headers.len(), "Sending blocking request");

        let mut builder = self
            .http_for(&options)?
            .request(request.method.clone(), request.url.as_str())
            .headers(request.headers.to_header_map()?);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match request.payload {
            Payload::Form(pairs) => builder.form(&pairs),
            Payload::Multipart(parts) => builder.multipart(into_form(parts)?),
            Payload::Empty => builder,
        };

        let response = builder.send()?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes()?;
        settle(&description, RawResponse { status, headers, body }, &options)
    }

    fn fetch(&self, request: &RemoveBg, format: ReturnFormat) -> Result<ImageContents> {
        let prepared = request.prepare(format)?;
        let source = request
            .image_source()
            .map_or_else(String::new, ToString::to_string);
        let _span = spans::removal(&source, format).entered();

        let response = self.send(prepared)?;
        extract(&response, format)
    }

    /// Blocking [`RemoveBg::get`]
    pub fn get(&self, request: &RemoveBg) -> Result<ImageContents> {
        self.fetch(request, request.format())
    }

    /// Blocking [`RemoveBg::get_base64`]
    pub fn get_base64(&self, request: &RemoveBg) -> Result<String> {
        match self.fetch(request, ReturnFormat::Base64)? {
            ImageContents::Base64(text) => Ok(text),
            ImageContents::Raw(_) => Err(RemoveBgError::malformed(
                "expected base64 contents in base64 mode",
            )),
        }
    }

    /// Blocking [`RemoveBg::save`]
    pub fn save<P: AsRef<Path>>(&self, request: &RemoveBg, path: P) -> Result<usize> {
        self.save_with_lock(request, path, false)
    }

    /// Blocking [`RemoveBg::save_with_lock`]
    pub fn save_with_lock<P: AsRef<Path>>(
        &self,
        request: &RemoveBg,
        path: P,
        exclusive: bool,
    ) -> Result<usize> {
        let contents = self.get(request)?;
        let path = path.as_ref();
        let written =
            spans::save(path).in_scope(|| write_output(path, contents.as_bytes(), exclusive))?;
        info!(path = %path.display(), bytes = written, exclusive, "Saved image");
        Ok(written)
    }

    /// Blocking [`RemoveBg::account`]
    pub fn account(&self, request: &RemoveBg) -> Result<Value> {
        self.account_as(request)
    }

    /// Blocking [`RemoveBg::account_as`]
    pub fn account_as<T: DeserializeOwned>(&self, request: &RemoveBg) -> Result<T> {
        let prepared = request.prepare_account();
        let _span = spans::account(&prepared.url).entered();
        let response = self.send(prepared)?;
        serde_json::from_slice(&response.body)
            .map_err(|e| RemoveBgError::malformed(format!("invalid account response: {e}")))
    }

    /// Blocking [`RemoveBg::account_info`]
    pub fn account_info(&self, request: &RemoveBg) -> Result<AccountInfo> {
        let envelope: crate::account::AccountEnvelope = self.account_as(request)?;
        Ok(envelope.data.attributes)
    }
}

fn into_form(parts: Vec<Part>) -> Result<multipart::Form> {
    let mut form = multipart::Form::new();
    for part in parts {
        form = match part.contents {
            PartContents::Text(text) => form.text(part.name, text),
            PartContents::File { data, filename } => form.part(
                part.name,
                multipart::Part::bytes(data)
                    .file_name(filename)
                    .mime_str("image/png")?,
            ),
        };
    }
    Ok(form)
}

/// [`BlockingClient::get`] on a fresh default client
pub fn get(request: &RemoveBg) -> Result<ImageContents> {
    BlockingClient::new()?.get(request)
}

/// [`BlockingClient::get_base64`] on a fresh default client
pub fn get_base64(request: &RemoveBg) -> Result<String> {
    BlockingClient::new()?.get_base64(request)
}

/// [`BlockingClient::save`] on a fresh default client
pub fn save<P: AsRef<Path>>(request: &RemoveBg, path: P) -> Result<usize> {
    BlockingClient::new()?.save(request, path)
}

/// [`BlockingClient::save_with_lock`] on a fresh default client
pub fn save_with_lock<P: AsRef<Path>>(
    request: &RemoveBg,
    path: P,
    exclusive: bool,
) -> Result<usize> {
    BlockingClient::new()?.save_with_lock(request, path, exclusive)
}

/// [`BlockingClient::account`] on a fresh default client
pub fn account(request: &RemoveBg) -> Result<Value> {
    BlockingClient::new()?.account(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derived_count(client: &BlockingClient) -> usize {
        client.derived.lock().unwrap().len()
    }

    #[test]
    fn test_blocking_missing_source() {
        let request = RemoveBg::new("key").unwrap();
        let err = get(&request).unwrap_err();
        assert!(matches!(err, RemoveBgError::MissingSource));
    }

    #[test]
    fn test_blocking_transport_error() {
        // Port 9 on localhost is the discard port and normally closed.
        let request = RemoveBg::new("key")
            .unwrap()
            .endpoint("http://127.0.0.1:9/v1.0/removebg")
            .url("https://example.com/cat.jpg");
        let err = get_base64(&request).unwrap_err();
        assert!(matches!(err, RemoveBgError::Transport(_)));
    }

    #[test]
    fn test_connect_timeout_clients() {
        let client = BlockingClient::new().unwrap();
        let five = RequestOptions::new().with_connect_timeout(Duration::from_secs(5));
        client.http_for(&five).unwrap();
        client.http_for(&five).unwrap();
        client.http_for(&RequestOptions::new()).unwrap();
        assert_eq!(derived_count(&client), 1);

        let custom = BlockingClient::with_http_client(HttpClient::new());
        custom.http_for(&five).unwrap();
        assert_eq!(derived_count(&custom), 0);
    }

    #[test]
    fn test_into_form_accepts_parts() {
        let parts = vec![
            Part {
                name: "image_file".to_string(),
                contents: PartContents::File {
                    data: vec![1, 2, 3],
                    filename: "photo.png".to_string(),
                },
            },
            Part {
                name: "size".to_string(),
                contents: PartContents::Text("auto".to_string()),
            },
        ];
        let form = into_form(parts).unwrap();
        assert!(!form.boundary().is_empty());
    }
}
