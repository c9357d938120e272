//! Image sources and request body formatting
//!
//! The remove.bg endpoint accepts the image in one of three fields. URL and
//! base64 sources travel as a flat urlencoded form; file sources are uploaded
//! as a multipart form whose first part is always the image itself.

use crate::error::{RemoveBgError, Result};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// Multipart part name used for file uploads
pub const IMAGE_FILE_FIELD: &str = "image_file";
/// Form field used for remote image URLs
pub const IMAGE_URL_FIELD: &str = "image_url";
/// Form field used for inline base64 images
pub const IMAGE_BASE64_FIELD: &str = "image_file_b64";

/// Where the image to process comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Local file, uploaded as multipart under `name`
    File { path: PathBuf, name: String },
    /// Publicly reachable image URL
    Url(String),
    /// Base64 encoded image data
    Base64(String),
}

impl ImageSource {
    /// File source named after the path's basename
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let name = basename(&path);
        Self::File { path, name }
    }

    /// File source with an explicit display name; an empty name falls back to the basename
    pub fn file_named<P: Into<PathBuf>, S: Into<String>>(path: P, name: S) -> Self {
        let path = path.into();
        let name = name.into();
        let name = if name.is_empty() { basename(&path) } else { name };
        Self::File { path, name }
    }

    /// Request field carrying the image for this source type
    #[must_use]
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::File { .. } => IMAGE_FILE_FIELD,
            Self::Url(_) => IMAGE_URL_FIELD,
            Self::Base64(_) => IMAGE_BASE64_FIELD,
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path, .. } => write!(f, "file:{}", path.display()),
            Self::Url(url) => write!(f, "url:{url}"),
            Self::Base64(data) => write!(f, "base64:{} chars", data.len()),
        }
    }
}

fn basename(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.to_string_lossy().into_owned(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Rename an upload to `.png`, cutting at the first dot of the name.
///
/// `archive.tar.gz` becomes `archive.png`, and a name without any dot
/// becomes `.png`.
#[must_use]
pub fn format_file_name(name: &str) -> String {
    let stem = name.find('.').map_or("", |idx| name.get(..idx).unwrap_or(""));
    format!("{stem}.png")
}

/// Ordered key/value fields added to the request body.
///
/// Re-inserting an existing key replaces its value in place, so the
/// position of the first insertion is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyFields {
    entries: Vec<(String, Value)>,
}

impl BodyFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a single field
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Merge many fields, later values win
    pub fn merge<I, K, V>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in fields {
            self.insert(key, value);
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Render a body value the way a form encoder sends it
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Contents of one multipart part
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartContents {
    Text(String),
    File { data: Vec<u8>, filename: String },
}

/// A named multipart part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub contents: PartContents,
}

/// Transport-level request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// `application/x-www-form-urlencoded` pairs
    Form(Vec<(String, String)>),
    /// `multipart/form-data` parts
    Multipart(Vec<Part>),
    /// No body (account lookups)
    Empty,
}

impl Payload {
    /// Look up a text value by field name in either body shape
    #[must_use]
    pub fn text_field(&self, name: &str) -> Option<&str> {
        match self {
            Self::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            Self::Multipart(parts) => parts.iter().find(|p| p.name == name).and_then(|p| {
                match &p.contents {
                    PartContents::Text(text) => Some(text.as_str()),
                    PartContents::File { .. } => None,
                }
            }),
            Self::Empty => None,
        }
    }

    /// Field or part names in wire order
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        match self {
            Self::Form(pairs) => pairs.iter().map(|(k, _)| k.as_str()).collect(),
            Self::Multipart(parts) => parts.iter().map(|p| p.name.as_str()).collect(),
            Self::Empty => Vec::new(),
        }
    }
}

/// Build the request body for `source` with the extra `fields` merged in.
///
/// File sources are read fully into memory here.
pub fn format_payload(source: Option<&ImageSource>, fields: &BodyFields) -> Result<Payload> {
    let source = source.ok_or(RemoveBgError::MissingSource)?;

    match source {
        ImageSource::File { path, name } => {
            let data = std::fs::read(path)
                .map_err(|e| RemoveBgError::file_io_error("read image", path, &e))?;

            let mut parts = Vec::with_capacity(fields.len() + 1);
            parts.push(Part {
                name: IMAGE_FILE_FIELD.to_string(),
                contents: PartContents::File {
                    data,
                    filename: format_file_name(name),
                },
            });
            parts.extend(fields.iter().map(|(key, value)| Part {
                name: key.to_string(),
                contents: PartContents::Text(render_value(value)),
            }));
            Ok(Payload::Multipart(parts))
        },
        ImageSource::Url(data) | ImageSource::Base64(data) => {
            // Extra fields share the namespace with the image field and may replace it.
            let mut merged = BodyFields::new();
            merged.insert(source.field_name(), data.as_str());
            merged.merge(fields.iter().map(|(k, v)| (k.to_string(), v.clone())));

            Ok(Payload::Form(
                merged
                    .iter()
                    .map(|(k, v)| (k.to_string(), render_value(v)))
                    .collect(),
            ))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_file_source_display_name() {
        let source = ImageSource::file("photo.jpg");
        assert_eq!(
            source,
            ImageSource::File {
                path: PathBuf::from("photo.jpg"),
                name: "photo.jpg".to_string()
            }
        );

        let source = ImageSource::file("/var/images/photo.jpg");
        assert!(matches!(source, ImageSource::File { ref name, .. } if name == "photo.jpg"));

        let source = ImageSource::file_named("photo.jpg", "custom.jpeg");
        assert!(matches!(source, ImageSource::File { ref name, .. } if name == "custom.jpeg"));

        let source = ImageSource::file_named("photo.jpg", "");
        assert!(matches!(source, ImageSource::File { ref name, .. } if name == "photo.jpg"));
    }

    #[test]
    fn test_format_file_name() {
        assert_eq!(format_file_name("photo.jpg"), "photo.png");
        assert_eq!(format_file_name("archive.tar.gz"), "archive.png");
        assert_eq!(format_file_name("noext"), ".png");
        assert_eq!(format_file_name(".hidden"), ".png");
        assert_eq!(format_file_name(""), ".png");
    }

    #[test]
    fn test_body_fields_last_write_wins() {
        let mut fields = BodyFields::new();
        fields.merge([("a", 1)]);
        fields.merge([("a", 2), ("b", 3)]);

        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("a"), Some(&json!(2)));
        assert_eq!(fields.get("b"), Some(&json!(3)));
        let keys: Vec<&str> = fields.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("auto")), "auto");
        assert_eq!(render_value(&json!(true)), "true");
        assert_eq!(render_value(&json!(12)), "12");
        assert_eq!(render_value(&Value::Null), "");
        assert_eq!(render_value(&json!(["a", 1])), "[\"a\",1]");
    }

    #[test]
    fn test_missing_source() {
        let err = format_payload(None, &BodyFields::new()).unwrap_err();
        assert!(matches!(err, RemoveBgError::MissingSource));
    }

    #[test]
    fn test_url_payload() {
        let mut fields = BodyFields::new();
        fields.insert("size", "auto");
        let url = "https://example.com/cat.jpg?x=1&y=2";
        let payload = format_payload(Some(&ImageSource::Url(url.to_string())), &fields).unwrap();

        assert_eq!(
            payload,
            Payload::Form(vec![
                ("image_url".to_string(), url.to_string()),
                ("size".to_string(), "auto".to_string()),
            ])
        );
    }

    #[test]
    fn test_base64_payload_untouched() {
        let data = "iVBORw0KGgo=";
        let payload =
            format_payload(Some(&ImageSource::Base64(data.to_string())), &BodyFields::new())
                .unwrap();
        assert_eq!(payload.text_field("image_file_b64"), Some(data));
        assert_eq!(payload.field_names(), vec!["image_file_b64"]);
    }

    #[test]
    fn test_extra_field_overwrites_primary_field() {
        let mut fields = BodyFields::new();
        fields.insert("image_url", "https://example.com/other.png");
        let payload = format_payload(
            Some(&ImageSource::Url("https://example.com/cat.jpg".to_string())),
            &fields,
        )
        .unwrap();

        assert_eq!(payload.field_names(), vec!["image_url"]);
        assert_eq!(
            payload.text_field("image_url"),
            Some("https://example.com/other.png")
        );
    }

    #[test]
    fn test_file_payload_parts() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("holiday.photo.jpg");
        std::fs::write(&path, b"\xff\xd8\xffjpeg-bytes").unwrap();

        let mut fields = BodyFields::new();
        fields.insert("size", "preview");
        fields.insert("crop", true);

        let payload = format_payload(Some(&ImageSource::file(&path)), &fields).unwrap();
        let Payload::Multipart(parts) = &payload else {
            panic!("expected multipart payload, got {payload:?}");
        };

        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[0],
            Part {
                name: "image_file".to_string(),
                contents: PartContents::File {
                    data: b"\xff\xd8\xffjpeg-bytes".to_vec(),
                    filename: "holiday.png".to_string(),
                },
            }
        );
        assert_eq!(payload.text_field("size"), Some("preview"));
        assert_eq!(payload.text_field("crop"), Some("true"));
        assert_eq!(payload.field_names(), vec!["image_file", "size", "crop"]);
    }

    #[test]
    fn test_file_payload_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.jpg");

        let err = format_payload(Some(&ImageSource::file(&path)), &BodyFields::new()).unwrap_err();
        assert!(matches!(err, RemoveBgError::Io(_)));
        assert!(err.to_string().contains("read image"));
    }
}
