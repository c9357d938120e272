//! The remove.bg request builder and its terminal operations

use crate::account::{AccountEnvelope, AccountInfo};
use crate::config::{ClientOptions, HostConfig, RequestOptions, ReturnFormat, API_KEY_CONFIG_KEY};
use crate::error::{RemoveBgError, Result};
use crate::payload::{format_payload, BodyFields, ImageSource, Payload};
use crate::request::{account_url, Headers, PreparedRequest};
use crate::response::{extract, settle, ImageContents};
use crate::tracing_config::spans;
use crate::transport::{RawResponse, ReqwestTransport, Transport};
use crate::{API_KEY_HEADER, DEFAULT_ENDPOINT, USER_AGENT};
use fs2::FileExt;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Fluent builder for one background removal call.
///
/// Configuration methods consume and return the builder. Terminal
/// operations borrow it immutably and allocate a fresh response per call, so
/// one builder never carries state from a previous request.
///
/// ```rust,no_run
/// use removebg_client::RemoveBg;
///
/// # async fn example() -> removebg_client::Result<()> {
/// let written = RemoveBg::new("my-api-key")?
///     .file("portrait.jpg")
///     .body([("size", "auto")])
///     .save("portrait-no-bg.png")
///     .await?;
/// println!("wrote {written} bytes");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RemoveBg {
    api_key: String,
    endpoint: String,
    source: Option<ImageSource>,
    body: BodyFields,
    headers: Headers,
    request_options: RequestOptions,
    return_format: ReturnFormat,
    transport: Arc<dyn Transport>,
}

impl RemoveBg {
    /// Create a client for `api_key`
    ///
    /// # Errors
    /// - The API key is empty
    /// - Failed to create HTTP client
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        Self::with_headers(api_key, Vec::<(String, String)>::new())
    }

    /// Create a client with default headers; the API key header is applied last
    pub fn with_headers<S, I, K, V>(api_key: S, headers: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RemoveBgError::configuration(
                "You must supply a valid remove.bg API key",
            ));
        }

        let mut header_set = Headers::new();
        header_set.merge(headers);
        header_set.insert("User-Agent", USER_AGENT);
        header_set.insert(API_KEY_HEADER, api_key.as_str());

        Ok(Self {
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            source: None,
            body: BodyFields::new(),
            headers: header_set,
            request_options: RequestOptions::default(),
            return_format: ReturnFormat::default(),
            transport: Arc::new(ReqwestTransport::new()?),
        })
    }

    /// Factory used by host applications.
    ///
    /// A missing `api_key` falls back to `removebg.api_key` in `host`, missing
    /// headers fall back to the host's default headers.
    pub fn from_options(options: ClientOptions, host: &HostConfig) -> Result<Self> {
        let api_key = options
            .api_key
            .or_else(|| host.get(API_KEY_CONFIG_KEY).map(str::to_string))
            .ok_or_else(|| {
                RemoveBgError::configuration(format!(
                    "No API key given and '{API_KEY_CONFIG_KEY}' is not configured"
                ))
            })?;
        let headers = options
            .headers
            .unwrap_or_else(|| host.removebg.headers.clone());

        let client = Self::with_headers(api_key, headers)?;
        Ok(match &host.removebg.endpoint {
            Some(endpoint) => client.endpoint(endpoint.as_str()),
            None => client,
        })
    }

    /// Swap the HTTP transport
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Override the removal endpoint; the account endpoint is derived from it
    #[must_use]
    pub fn endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Upload a local file, named after its basename
    #[must_use]
    pub fn file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.source = Some(ImageSource::file(path));
        self
    }

    /// Upload a local file under an explicit name
    #[must_use]
    pub fn file_named<P: Into<PathBuf>, S: Into<String>>(mut self, path: P, name: S) -> Self {
        self.source = Some(ImageSource::file_named(path, name));
        self
    }

    /// Process the image at a public URL
    #[must_use]
    pub fn url<S: Into<String>>(mut self, url: S) -> Self {
        self.source = Some(ImageSource::Url(url.into()));
        self
    }

    /// Process a base64 encoded image
    #[must_use]
    pub fn base64<S: Into<String>>(mut self, data: S) -> Self {
        self.source = Some(ImageSource::Base64(data.into()));
        self
    }

    /// Merge extra body fields such as `size`, `type` or `crop`
    #[must_use]
    pub fn body<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.body.merge(fields);
        self
    }

    /// Merge a single body field
    #[must_use]
    pub fn field<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.body.insert(key, value);
        self
    }

    #[must_use]
    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key, value);
        self
    }

    #[must_use]
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.merge(headers);
        self
    }

    #[must_use]
    pub fn request_options(mut self, options: RequestOptions) -> Self {
        self.request_options = self.request_options.merge(options);
        self
    }

    #[must_use]
    pub fn return_format(mut self, format: ReturnFormat) -> Self {
        self.return_format = format;
        self
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    #[must_use]
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn image_source(&self) -> Option<&ImageSource> {
        self.source.as_ref()
    }

    #[must_use]
    pub fn body_fields(&self) -> &BodyFields {
        &self.body
    }

    #[must_use]
    pub fn header_set(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn options(&self) -> &RequestOptions {
        &self.request_options
    }

    #[must_use]
    pub fn format(&self) -> ReturnFormat {
        self.return_format
    }

    /// Build the request body for the configured source
    pub fn payload(&self) -> Result<Payload> {
        format_payload(self.source.as_ref(), &self.body)
    }

    /// Resolve the upload request for `format` without touching the builder.
    ///
    /// Base64 mode adds `Accept: application/json` to the prepared headers.
    pub fn prepare(&self, format: ReturnFormat) -> Result<PreparedRequest> {
        let payload = self.payload()?;
        let mut headers = self.headers.clone();
        if format == ReturnFormat::Base64 {
            headers.insert("Accept", "application/json");
        }

        Ok(PreparedRequest {
            method: Method::POST,
            url: self.endpoint.clone(),
            headers,
            payload,
            options: self.request_options,
        })
    }

    /// Resolve the account balance request
    #[must_use]
    pub fn prepare_account(&self) -> PreparedRequest {
        PreparedRequest {
            method: Method::GET,
            url: account_url(&self.endpoint),
            headers: self.headers.clone(),
            payload: Payload::Empty,
            options: self.request_options,
        }
    }

    async fn send(&self, request: PreparedRequest) -> Result<RawResponse> {
        let options = request.options;
        let description = request.describe();
        debug!(request = %description, headers = request.headers.len(), "Sending request");

        let response = self.transport.execute(request).await?;
        settle(&description, response, &options)
    }

    async fn fetch(&self, format: ReturnFormat) -> Result<ImageContents> {
        let request = self.prepare(format)?;
        let source = self
            .source
            .as_ref()
            .map_or_else(String::new, ToString::to_string);
        let span = spans::removal(&source, format);

        async {
            let response = self.send(request).await?;
            extract(&response, format)
        }
        .instrument(span)
        .await
    }

    /// Send the request and return the image in the configured format
    pub async fn get(&self) -> Result<ImageContents> {
        self.fetch(self.return_format).await
    }

    /// Send the request in base64 mode and return `data.result_b64`
    pub async fn get_base64(&self) -> Result<String> {
        match self.fetch(ReturnFormat::Base64).await? {
            ImageContents::Base64(text) => Ok(text),
            ImageContents::Raw(_) => Err(RemoveBgError::malformed(
                "expected base64 contents in base64 mode",
            )),
        }
    }

    /// Send the request and write the result to `path`; returns bytes written
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        self.save_with_lock(path, false).await
    }

    /// Like [`RemoveBg::save`], optionally holding an exclusive lock while writing
    pub async fn save_with_lock<P: AsRef<Path>>(&self, path: P, exclusive: bool) -> Result<usize> {
        let contents = self.get().await?;
        let path = path.as_ref();
        let written =
            spans::save(path).in_scope(|| write_output(path, contents.as_bytes(), exclusive))?;
        info!(path = %path.display(), bytes = written, exclusive, "Saved image");
        Ok(written)
    }

    /// Fetch the account balance as generic JSON
    pub async fn account(&self) -> Result<Value> {
        self.account_as().await
    }

    /// Fetch the account balance decoded into `T`
    pub async fn account_as<T: DeserializeOwned>(&self) -> Result<T> {
        let request = self.prepare_account();
        let span = spans::account(&request.url);
        let response = self.send(request).instrument(span).await?;
        serde_json::from_slice(&response.body)
            .map_err(|e| RemoveBgError::malformed(format!("invalid account response: {e}")))
    }

    /// Fetch the account balance as typed attributes
    pub async fn account_info(&self) -> Result<AccountInfo> {
        let envelope: AccountEnvelope = self.account_as().await?;
        Ok(envelope.data.attributes)
    }
}

/// Create or truncate `path` and write `data`.
///
/// With `exclusive` the file is opened without truncation, locked, and only
/// then truncated, so concurrent writers never interleave.
pub(crate) fn write_output(path: &Path, data: &[u8], exclusive: bool) -> Result<usize> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(!exclusive)
        .open(path)
        .map_err(|e| RemoveBgError::file_io_error("open output", path, &e))?;

    if exclusive {
        FileExt::lock_exclusive(&file)
            .map_err(|e| RemoveBgError::file_io_error("lock output", path, &e))?;
        file.set_len(0)
            .map_err(|e| RemoveBgError::file_io_error("truncate output", path, &e))?;
    }

    let result = file
        .write_all(data)
        .and_then(|()| file.flush())
        .map_err(|e| RemoveBgError::file_io_error("write output", path, &e));

    if exclusive {
        if let Err(e) = FileExt::unlock(&file) {
            warn!(path = %path.display(), error = %e, "Failed to release output lock");
        }
    }

    result.map(|()| data.len())
}
