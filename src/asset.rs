//! Content-addressed local naming for media references.
//!
//! The local name is a pure function of the reference: `hash16(canonical) + ext`,
//! so the same asset maps to the same file across runs and across encodings.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use url::Url;

/// Extensions taken verbatim from a URL path.
const KNOWN_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".mp4", ".webm"];

/// HTML-entity-decoded form; the identity of a reference.
pub fn canonical_reference(raw: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(raw)
}

/// First 16 hex chars of the MD5 of `s`.
pub fn hash16(s: &str) -> String {
    let mut hex = format!("{:x}", md5::compute(s.as_bytes()));
    hex.truncate(16);
    hex
}

/// Extension for a canonical URL: path suffix, then `format=` query hint,
/// then a per-host default, then `.jpg`.
pub fn infer_extension(canonical: &str) -> &'static str {
    let Ok(url) = Url::parse(canonical) else {
        return ".jpg";
    };
    let path = url.path();

    if let Some(ext) = path_extension(path) {
        return ext;
    }

    if let Some((_, hint)) = url.query_pairs().find(|(k, _)| k == "format") {
        return match hint.to_ascii_lowercase().as_str() {
            "png" => ".png",
            "gif" => ".gif",
            "webp" => ".webp",
            _ => ".jpg",
        };
    }

    let host = url.host_str().unwrap_or("").to_ascii_lowercase();
    if host == "redd.it" || host.ends_with(".redd.it") {
        if path.contains(".png") {
            return ".png";
        }
        if path.contains(".gif") {
            return ".gif";
        }
    } else if host == "media.giphy.com" {
        return ".gif";
    }
    ".jpg"
}

fn path_extension(path: &str) -> Option<&'static str> {
    let file = path.rsplit('/').next()?;
    let dot = file.rfind('.')?;
    let ext = file[dot..].to_ascii_lowercase();
    KNOWN_EXTENSIONS.iter().copied().find(|k| *k == ext)
}

/// The deterministic local file a reference materializes to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LocalAsset {
    pub stem: String,              // 16 hex chars
    pub extension: &'static str,   // leading dot included
}

impl LocalAsset {
    /// Derive from a raw (possibly entity-encoded) reference.
    pub fn for_reference(raw: &str) -> Self {
        let canonical = canonical_reference(raw);
        Self { stem: hash16(&canonical), extension: infer_extension(&canonical) }
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.stem, self.extension)
    }

    pub fn path_in(&self, media_dir: &Path) -> PathBuf {
        media_dir.join(self.file_name())
    }
}
