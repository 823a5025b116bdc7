//! Candidate media references in free text and in post records.
//!
//! Two reference kinds are recognized: direct media URLs (by media host or file
//! suffix) and the `[label](service|ID)` shorthand, whose fetch URL is synthesized.

use crate::asset::canonical_reference;
use crate::json_utils::{http_field, str_field};
use ahash::AHashSet;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Shorthand services we know how to synthesize, with their variants in
/// preference order. Only the primary variant is fetched.
const SHORTHAND_SERVICES: &[(&str, &[&str])] = &[("giphy", &["giphy", "giphy-downsized"])];

/// Substrings that mark a post's `url` field as media rather than a web page.
const MEDIA_LINK_MARKERS: &[&str] = &[
    "redd.it", "imgur.com", ".jpg", ".jpeg", ".png", ".gif", ".webp", ".mp4", ".webm",
];

const TRAILING_PUNCT: &[char] = &['.', ',', ';', ':', '!', '?', ')'];

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)",
            r#"(?P<short>!?\[[^\]]*\]\((?P<svc>[a-z]+)\|(?P<sid>[A-Za-z0-9_\-]+)(?:\|[^)\s]*)?\))"#,
            r#"|(?P<url>"#,
            r#"https?://(?:preview\.|i\.|v\.)?redd\.it/[^\s<>")\]]+"#,
            r#"|https?://[^\s<>")\]]+\.(?:jpg|jpeg|png|gif|webp|svg|bmp|ico)"#,
            r#"|https?://[^\s<>")\]]+\.(?:mp4|avi|mov|wmv|flv|webm|m4v|mpg|mpeg)"#,
            r#"|https?://(?:i\.)?imgur\.com/[^\s<>")\]]+"#,
            r#")"#,
        ))
        .expect("media reference pattern")
    })
}

/// One reference found in text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaRef {
    /// A URL exactly as it appears in the text (trailing punctuation removed).
    Url(String),
    /// A `[label](service|ID)` token; `token` is the full matched markup.
    Shorthand { token: String, service: String, id: String },
}

impl MediaRef {
    /// The text span this reference occupies.
    pub fn matched(&self) -> &str {
        match self {
            MediaRef::Url(u) => u,
            MediaRef::Shorthand { token, .. } => token,
        }
    }

    /// The URL to fetch for this reference.
    pub fn fetch_url(&self) -> String {
        match self {
            MediaRef::Url(u) => u.clone(),
            MediaRef::Shorthand { service, id, .. } => shorthand_url(service, id),
        }
    }
}

/// `https://media.<service>.com/media/<ID>/<primary variant>.gif`
pub fn shorthand_url(service: &str, id: &str) -> String {
    let service = service.to_ascii_lowercase();
    let variant = SHORTHAND_SERVICES
        .iter()
        .find(|(s, _)| *s == service)
        .and_then(|(_, variants)| variants.first().copied())
        .unwrap_or(service.as_str());
    format!("https://media.{service}.com/media/{id}/{variant}.gif")
}

fn known_service(service: &str) -> bool {
    SHORTHAND_SERVICES.iter().any(|(s, _)| s.eq_ignore_ascii_case(service))
}

/// Every reference occurrence in `text`, in order, repeats included.
pub fn scan_spans(text: &str) -> Vec<MediaRef> {
    let mut out = Vec::new();
    if text.is_empty() {
        return out;
    }
    for caps in reference_re().captures_iter(text) {
        let r = if let Some(tok) = caps.name("short") {
            let service = &caps["svc"];
            if !known_service(service) {
                continue;
            }
            MediaRef::Shorthand {
                token: tok.as_str().to_string(),
                service: service.to_ascii_lowercase(),
                id: caps["sid"].to_string(),
            }
        } else if let Some(m) = caps.name("url") {
            let trimmed = m.as_str().trim_end_matches(TRAILING_PUNCT);
            if trimmed.is_empty() {
                continue;
            }
            MediaRef::Url(trimmed.to_string())
        } else {
            continue;
        };
        out.push(r);
    }
    out
}

/// All references in `text`, in first-seen order, distinct by canonical fetch URL.
pub fn scan_text(text: &str) -> Vec<MediaRef> {
    let mut seen: AHashSet<String> = AHashSet::new();
    scan_spans(text)
        .into_iter()
        .filter(|r| seen.insert(canonical_reference(&r.fetch_url()).into_owned()))
        .collect()
}

/// Fetch URLs for every reference in `text`.
pub fn extract_media_urls(text: &str) -> Vec<String> {
    scan_text(text).iter().map(MediaRef::fetch_url).collect()
}

fn push_unique(u: String, out: &mut Vec<String>) {
    if !out.contains(&u) {
        out.push(u);
    }
}

fn looks_like_media_link(url: &str) -> bool {
    MEDIA_LINK_MARKERS.iter().any(|m| url.contains(m))
}

/// Media URLs of a post record: link fields, thumbnail, preview images and
/// their variants, gallery items, and references in the self-text.
/// Preview and gallery URLs arrive entity-encoded and are decoded here.
pub fn extract_post_media(data: &Value) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    for key in ["url", "url_overridden_by_dest"] {
        if let Some(u) = http_field(data, key).filter(|u| looks_like_media_link(u)) {
            push_unique(u.to_string(), &mut out);
        }
    }
    if let Some(u) = http_field(data, "thumbnail") {
        push_unique(u.to_string(), &mut out);
    }

    let images = data.pointer("/preview/images").and_then(|v| v.as_array());
    for img in images.into_iter().flatten() {
        if let Some(u) = img.pointer("/source/url").and_then(|v| v.as_str()).filter(|u| u.starts_with("http")) {
            push_unique(canonical_reference(u).into_owned(), &mut out);
        }
        let variants = img.get("variants").and_then(|v| v.as_object());
        for variant in variants.into_iter().flat_map(|m| m.values()) {
            if let Some(u) = variant.pointer("/source/url").and_then(|v| v.as_str()).filter(|u| u.starts_with("http")) {
                push_unique(canonical_reference(u).into_owned(), &mut out);
            }
        }
    }

    if let (Some(items), Some(meta)) = (
        data.pointer("/gallery_data/items").and_then(|v| v.as_array()),
        data.get("media_metadata").and_then(|v| v.as_object()),
    ) {
        for item in items {
            let Some(info) = str_field(item, "media_id").and_then(|id| meta.get(id)) else {
                continue;
            };
            let src = info.get("s");
            let u = src.and_then(|s| http_field(s, "u")).or_else(|| src.and_then(|s| http_field(s, "gif")));
            if let Some(u) = u {
                push_unique(canonical_reference(u).into_owned(), &mut out);
            }
        }
    }

    for u in extract_media_urls(str_field(data, "selftext").unwrap_or("")) {
        push_unique(u, &mut out);
    }
    out
}

/// Media URLs referenced by a comment body.
pub fn extract_comment_media(data: &Value) -> Vec<String> {
    extract_media_urls(str_field(data, "body").unwrap_or(""))
}
