//! Response classification, error translation and image extraction

use crate::config::{RequestOptions, ReturnFormat};
use crate::error::{RemoveBgError, Result};
use crate::transport::RawResponse;
use base64::Engine as _;
use bytes::Bytes;
use serde_json::Value;

/// Message used when an error body carries no decodable `errors` list
pub const UNPROCESSABLE_ERROR: &str = "Unprocessable error";

/// Result of sending a request, before extraction
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(RawResponse),
    HttpError { status: u16, body: Bytes },
}

/// True iff the status code's leading digit is `4`.
///
/// 5xx responses pass through unless the strict policy is enabled through
/// [`RequestOptions::http_errors`].
#[must_use]
pub fn has_errors(status: u16) -> bool {
    status.to_string().starts_with('4')
}

/// Sort a raw response into success or error under the given options
#[must_use]
pub fn classify(response: RawResponse, options: &RequestOptions) -> Outcome {
    let failed = if options.strict_http_errors() {
        response.status >= 400
    } else {
        has_errors(response.status)
    };

    if failed {
        Outcome::HttpError {
            status: response.status,
            body: response.body,
        }
    } else {
        Outcome::Success(response)
    }
}

/// Classify, log and translate a response for the request `description`
pub(crate) fn settle(
    description: &str,
    response: RawResponse,
    options: &RequestOptions,
) -> Result<RawResponse> {
    match classify(response, options) {
        Outcome::Success(response) => {
            tracing::info!(
                request = %description,
                status = response.status,
                bytes = response.body.len(),
                "Request completed"
            );
            Ok(response)
        },
        Outcome::HttpError { status, body } => {
            let error = translate_error(status, &body);
            tracing::warn!(request = %description, status, error = %error, "Request rejected");
            Err(error)
        },
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the API error for an error response.
///
/// The message joins the values of the first entry of the `errors` array
/// with `" - "`, e.g. `{"title": "Invalid api key", "code": "auth_failed"}`
/// becomes `Invalid api key - auth_failed`.
#[must_use]
pub fn translate_error(status: u16, body: &[u8]) -> RemoveBgError {
    let raw = String::from_utf8_lossy(body).into_owned();

    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            let first = value.get("errors")?.as_array()?.first()?.clone();
            let text = match first {
                Value::Object(map) => map.values().map(scalar_text).collect::<Vec<_>>().join(" - "),
                Value::Array(items) => {
                    items.iter().map(scalar_text).collect::<Vec<_>>().join(" - ")
                },
                other => scalar_text(&other),
            };
            Some(text)
        })
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| UNPROCESSABLE_ERROR.to_string());

    RemoveBgError::api(status, message, raw)
}

/// Processed image as delivered by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageContents {
    /// Binary image bytes
    Raw(Bytes),
    /// Base64 text from `data.result_b64`
    Base64(String),
}

impl ImageContents {
    /// Bytes as they would be written to disk
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Raw(bytes) => bytes,
            Self::Base64(text) => text.as_bytes(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    #[must_use]
    pub fn format(&self) -> ReturnFormat {
        match self {
            Self::Raw(_) => ReturnFormat::Raw,
            Self::Base64(_) => ReturnFormat::Base64,
        }
    }

    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Raw(bytes) => bytes,
            Self::Base64(text) => Bytes::from(text.into_bytes()),
        }
    }

    /// Image bytes, decoding base64 text when needed
    pub fn decode(&self) -> Result<Vec<u8>> {
        match self {
            Self::Raw(bytes) => Ok(bytes.to_vec()),
            Self::Base64(text) => base64::engine::general_purpose::STANDARD
                .decode(text.trim())
                .map_err(|e| {
                    RemoveBgError::malformed(format!("result_b64 is not valid base64: {e}"))
                }),
        }
    }
}

/// Extract the image from a successful response
pub fn extract(response: &RawResponse, format: ReturnFormat) -> Result<ImageContents> {
    match format {
        ReturnFormat::Raw => Ok(ImageContents::Raw(response.body.clone())),
        ReturnFormat::Base64 => {
            let value: Value = serde_json::from_slice(&response.body).map_err(|e| {
                RemoveBgError::malformed(format!("expected a JSON body in base64 mode: {e}"))
            })?;
            value
                .pointer("/data/result_b64")
                .and_then(Value::as_str)
                .map(|s| ImageContents::Base64(s.to_string()))
                .ok_or_else(|| RemoveBgError::malformed("missing data.result_b64 in response"))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_errors_boundary() {
        assert!(has_errors(400));
        assert!(has_errors(402));
        assert!(has_errors(403));
        assert!(has_errors(429));
        assert!(has_errors(499));

        assert!(!has_errors(200));
        assert!(!has_errors(302));
        assert!(!has_errors(500));
        assert!(!has_errors(503));
    }

    #[test]
    fn test_classify_default_and_strict() {
        let default_opts = RequestOptions::default();
        assert!(matches!(
            classify(RawResponse::new(500, "oops"), &default_opts),
            Outcome::Success(_)
        ));
        assert!(matches!(
            classify(RawResponse::new(403, "{}"), &default_opts),
            Outcome::HttpError { status: 403, .. }
        ));

        let strict = RequestOptions::new().with_http_errors(true);
        assert!(matches!(
            classify(RawResponse::new(500, "oops"), &strict),
            Outcome::HttpError { status: 500, .. }
        ));
        assert!(matches!(
            classify(RawResponse::new(200, "ok"), &strict),
            Outcome::Success(_)
        ));
    }

    #[test]
    fn test_translate_error_first_entry() {
        let body = br#"{"errors":[{"title":"Invalid api key"}]}"#;
        let err = translate_error(403, body);
        match &err {
            RemoveBgError::Api { status, message, body } => {
                assert_eq!(*status, 403);
                assert_eq!(message, "Invalid api key");
                assert!(body.contains("errors"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("Invalid api key"));
    }

    #[test]
    fn test_translate_error_joins_fields_in_order() {
        let body = concat!(
            r#"{"errors":[{"title":"File too large","code":"file_too_large","detail":"max 22MB"},"#,
            r#"{"title":"ignored"}]}"#
        )
        .as_bytes();
        let err = translate_error(400, body);
        assert!(matches!(
            err,
            RemoveBgError::Api { ref message, .. }
                if message == "File too large - file_too_large - max 22MB"
        ));
    }

    #[test]
    fn test_translate_error_unprocessable() {
        let bodies: [&[u8]; 5] = [
            b"not json",
            b"{}",
            br#"{"errors":[]}"#,
            br#"{"errors":"x"}"#,
            b"",
        ];
        for body in bodies {
            let err = translate_error(422, body);
            assert!(
                matches!(
                    err,
                    RemoveBgError::Api { ref message, .. } if message == UNPROCESSABLE_ERROR
                ),
                "body {:?} should be unprocessable",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_extract_raw_verbatim() {
        let bytes: &[u8] = &[0x89, b'P', b'N', b'G', 0, 255];
        let response = RawResponse::new(200, bytes.to_vec());
        let contents = extract(&response, ReturnFormat::Raw).unwrap();
        assert_eq!(contents.as_bytes(), bytes);
        assert_eq!(contents.len(), 6);
        assert_eq!(contents.format(), ReturnFormat::Raw);
    }

    #[test]
    fn test_extract_base64() {
        let response = RawResponse::new(200, r#"{"data":{"result_b64":"Zm9v"}}"#);
        let contents = extract(&response, ReturnFormat::Base64).unwrap();
        assert_eq!(contents, ImageContents::Base64("Zm9v".to_string()));
        assert_eq!(contents.decode().unwrap(), b"foo");
    }

    #[test]
    fn test_extract_base64_malformed() {
        let missing = RawResponse::new(200, r#"{"data":{}}"#);
        assert!(matches!(
            extract(&missing, ReturnFormat::Base64),
            Err(RemoveBgError::MalformedResponse(_))
        ));

        let binary = RawResponse::new(200, vec![0x89, b'P', b'N', b'G']);
        assert!(matches!(
            extract(&binary, ReturnFormat::Base64),
            Err(RemoveBgError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_decode_invalid_base64() {
        let contents = ImageContents::Base64("***".to_string());
        assert!(matches!(
            contents.decode(),
            Err(RemoveBgError::MalformedResponse(_))
        ));
        assert!(!contents.is_empty());
    }
}
