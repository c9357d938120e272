//! HTTP execution of prepared requests

use crate::error::{RemoveBgError, Result};
use crate::payload::{Part, PartContents, Payload};
use crate::request::PreparedRequest;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::multipart;
use reqwest::{Client, ClientBuilder};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Status, headers and body of one HTTP exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new<B: Into<Bytes>>(status: u16, body: B) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Body as lossy UTF-8, for error messages
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Performs the network round trip for a prepared request.
///
/// Implementations return any HTTP status as `Ok`; only failures to obtain
/// a response at all are errors.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn execute(&self, request: PreparedRequest) -> Result<RawResponse>;
}

type ConfigureClient = Arc<dyn Fn(ClientBuilder) -> ClientBuilder + Send + Sync>;

/// `reqwest`-backed transport.
///
/// Per-request connect timeouts need a dedicated client. Transports created
/// with [`ReqwestTransport::new`] or [`ReqwestTransport::with_builder`] derive
/// one per distinct timeout from the same builder settings and reuse it. A
/// client passed to [`ReqwestTransport::with_client`] is always used as is,
/// so its own connect timeout applies.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    configure: Option<ConfigureClient>,
    derived: Arc<Mutex<HashMap<Duration, Client>>>,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("custom_client", &self.configure.is_none())
            .field("derived_clients", &self.derived_count())
            .finish()
    }
}

impl ReqwestTransport {
    /// Create a transport with a default HTTP client
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new() -> Result<Self> {
        Self::with_builder(|builder| builder)
    }

    /// Create a transport whose clients are built by `configure` (proxy, TLS roots,
    /// default headers). Connect-timeout variants go through the same closure.
    pub fn with_builder<F>(configure: F) -> Result<Self>
    where
        F: Fn(ClientBuilder) -> ClientBuilder + Send + Sync + 'static,
    {
        let client = configure(Client::builder()).build()?;
        Ok(Self {
            client,
            configure: Some(Arc::new(configure)),
            derived: Arc::default(),
        })
    }

    /// Use an existing, preconfigured client for every request
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            configure: None,
            derived: Arc::default(),
        }
    }

    fn derived_count(&self) -> usize {
        self.derived
            .lock()
            .map_or_else(|poisoned| poisoned.into_inner().len(), |map| map.len())
    }

    fn client_for(&self, request: &PreparedRequest) -> Result<Client> {
        let Some(timeout) = request.options.connect_timeout else {
            return Ok(self.client.clone());
        };
        let Some(configure) = &self.configure else {
            debug!(?timeout, "Connect timeout left to the caller-supplied client");
            return Ok(self.client.clone());
        };

        let mut derived = self.derived.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = derived.get(&timeout) {
            return Ok(client.clone());
        }
        let client = configure(Client::builder()).connect_timeout(timeout).build()?;
        derived.insert(timeout, client.clone());
        Ok(client)
    }
}

fn into_multipart(parts: Vec<Part>) -> Result<multipart::Form> {
    let mut form = multipart::Form::new();
    for part in parts {
        form = match part.contents {
            PartContents::Text(text) => form.text(part.name, text),
            PartContents::File { data, filename } => {
                let file_part = multipart::Part::bytes(data)
                    .file_name(filename)
                    .mime_str("image/png")?;
                form.part(part.name, file_part)
            },
        };
    }
    Ok(form)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: PreparedRequest) -> Result<RawResponse> {
        let client = self.client_for(&request)?;
        let headers = request.headers.to_header_map()?;

        let mut builder = client
            .request(request.method.clone(), request.url.as_str())
            .headers(headers);
        if let Some(timeout) = request.options.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match request.payload {
            Payload::Form(pairs) => builder.form(&pairs),
            Payload::Multipart(parts) => builder.multipart(into_multipart(parts)?),
            Payload::Empty => builder,
        };

        let response = builder.send().await.map_err(RemoveBgError::Transport)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
