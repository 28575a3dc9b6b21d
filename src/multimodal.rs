//! Multimodal input wrappers and content-fragment assembly.
//!
//! Arguments that carry images (or text destined for a multimodal message)
//! are wrapped in [`Text`], [`ImgUrl`], or [`ImgPath`] so prompt assembly can
//! tell them apart from ordinary values. Local paths are validated eagerly at
//! construction; the file itself is read and inlined as a base64 data URL
//! only when the message is built.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::{Error, Result};
use crate::message::{ContentPart, ImageDetail};
use crate::typedesc::TypeSpec;

/// Text destined for a multimodal message part.
#[derive(Debug, Clone, PartialEq)]
pub struct Text(pub String);

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Text(text.into())
    }
}

/// A remote image referenced by URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ImgUrl {
    url: String,
    detail: ImageDetail,
}

impl ImgUrl {
    /// Wraps an image URL. Only `http` and `https` schemes are accepted.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_detail(url, ImageDetail::default())
    }

    pub fn with_detail(url: impl Into<String>, detail: ImageDetail) -> Result<Self> {
        let url = url.into();
        let trimmed = url.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(Error::media(format!(
                "invalid image URL '{url}': expected an http(s) URL"
            )));
        }
        Ok(ImgUrl {
            url: trimmed.to_string(),
            detail,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn detail(&self) -> ImageDetail {
        self.detail
    }

    pub fn to_part(&self) -> ContentPart {
        ContentPart::image_url(self.url.clone(), self.detail)
    }
}

/// A local image file, inlined as a base64 data URL at message-build time.
#[derive(Debug, Clone, PartialEq)]
pub struct ImgPath {
    path: PathBuf,
    detail: ImageDetail,
}

impl ImgPath {
    /// Wraps a local image path. The file must exist when the wrapper is
    /// created; read failures are still possible later if the file vanishes.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_detail(path, ImageDetail::default())
    }

    pub fn with_detail(path: impl Into<PathBuf>, detail: ImageDetail) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(Error::media(format!(
                "image file not found: {}",
                path.display()
            )));
        }
        Ok(ImgPath { path, detail })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn detail(&self) -> ImageDetail {
        self.detail
    }

    /// Reads the file and produces an inline `data:` URL part.
    pub fn to_part(&self) -> Result<ContentPart> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            Error::media(format!("failed to read image {}: {e}", self.path.display()))
        })?;
        let encoded = BASE64.encode(&bytes);
        let mime = mime_for_path(&self.path);
        Ok(ContentPart::image_url(
            format!("data:{mime};base64,{encoded}"),
            self.detail,
        ))
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// A runtime multimodal value bound to a function argument.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaValue {
    Text(Text),
    Url(ImgUrl),
    Path(ImgPath),
}

impl MediaValue {
    pub fn to_part(&self) -> Result<ContentPart> {
        match self {
            MediaValue::Text(t) => Ok(ContentPart::text(t.0.clone())),
            MediaValue::Url(u) => Ok(u.to_part()),
            MediaValue::Path(p) => p.to_part(),
        }
    }
}

impl From<Text> for MediaValue {
    fn from(t: Text) -> Self {
        MediaValue::Text(t)
    }
}

impl From<ImgUrl> for MediaValue {
    fn from(u: ImgUrl) -> Self {
        MediaValue::Url(u)
    }
}

impl From<ImgPath> for MediaValue {
    fn from(p: ImgPath) -> Self {
        MediaValue::Path(p)
    }
}

/// An image produced by a tool, forwarded to the model in a follow-up
/// user message.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Url(ImgUrl),
    Path(ImgPath),
}

impl ImageSource {
    pub fn to_part(&self) -> Result<ContentPart> {
        match self {
            ImageSource::Url(u) => Ok(u.to_part()),
            ImageSource::Path(p) => p.to_part(),
        }
    }
}

/// A bound argument value: ordinary JSON data, a single multimodal value, or
/// a homogeneous list of multimodal values.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Json(serde_json::Value),
    Media(MediaValue),
    MediaList(Vec<MediaValue>),
}

impl ArgValue {
    pub fn json(value: serde_json::Value) -> Self {
        ArgValue::Json(value)
    }

    pub fn media(value: impl Into<MediaValue>) -> Self {
        ArgValue::Media(value.into())
    }

    pub fn media_list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<MediaValue>,
    {
        ArgValue::MediaList(values.into_iter().map(Into::into).collect())
    }

    /// Plain-text rendering used in prompt parameter listings. Strings lose
    /// their quotes; everything else is compact JSON or a media summary.
    pub fn render(&self) -> String {
        match self {
            ArgValue::Json(serde_json::Value::String(s)) => s.clone(),
            ArgValue::Json(v) => v.to_string(),
            ArgValue::Media(m) => render_media(m),
            ArgValue::MediaList(list) => {
                let items: Vec<String> = list.iter().map(render_media).collect();
                format!("[{}]", items.join(", "))
            }
        }
    }
}

impl From<serde_json::Value> for ArgValue {
    fn from(value: serde_json::Value) -> Self {
        ArgValue::Json(value)
    }
}

fn render_media(m: &MediaValue) -> String {
    match m {
        MediaValue::Text(t) => t.0.clone(),
        MediaValue::Url(u) => u.url().to_string(),
        MediaValue::Path(p) => p.path().display().to_string(),
    }
}

/// Converts one bound argument into ordered content parts for a multimodal
/// user message.
///
/// Dispatch is driven by the runtime value first and the declared type
/// second: a union-typed argument produces whichever fragment its actual
/// variant calls for, and lists flatten one fragment per element in order.
pub fn build_content(value: &ArgValue, spec: &TypeSpec) -> Result<Vec<ContentPart>> {
    match value {
        ArgValue::Media(m) => Ok(vec![m.to_part()?]),
        ArgValue::MediaList(list) => list.iter().map(MediaValue::to_part).collect(),
        ArgValue::Json(v) => match (spec, v) {
            // A list of plain text declared multimodal still becomes one
            // fragment per element.
            (TypeSpec::List(_), serde_json::Value::Array(items)) => Ok(items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => ContentPart::text(s.clone()),
                    other => ContentPart::text(other.to_string()),
                })
                .collect()),
            _ => Ok(vec![ContentPart::text(value.render())]),
        },
    }
}
