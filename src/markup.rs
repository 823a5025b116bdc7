//! Text rewriting around local media:
//! - `Replacements` swaps fetched references for their local relative paths;
//! - `MediaEmbedder` turns local media paths into `<img>`/`<video>` markup and
//!   HTML-escapes everything else, so bodies are safe to insert into a page;
//! - `clean_text` undoes the markup for plain-text export.

use crate::asset::canonical_reference;
use crate::extract::{scan_spans, MediaRef};
use ahash::{AHashMap, AHashSet};
use anyhow::{Context, Result};
use regex::{Captures, Regex};
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "ico"];
const VIDEO_EXTS: &[&str] = &["mp4", "webm", "avi", "mov", "wmv", "flv", "m4v", "mpg", "mpeg"];
const MEDIA_EXT_ALTERNATION: &str = "jpg|jpeg|png|gif|webp|svg|bmp|ico|mp4|webm|avi|mov|wmv|flv|m4v|mpg|mpeg";

/// `path` relative to `base` with `/` separators, or `path` as is when it is not under `base`.
pub fn relative_slash_path(path: &Path, base: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(rel) => rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Reference form → local path relative to the output directory.
#[derive(Clone, Debug, Default)]
pub struct Replacements {
    map: AHashMap<String, String>,
}

impl Replacements {
    pub fn from_resolved(resolved: &AHashMap<String, PathBuf>, output_dir: &Path) -> Self {
        let map = resolved
            .iter()
            .map(|(url, path)| (url.clone(), relative_slash_path(path, output_dir)))
            .collect();
        Self { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn lookup(&self, r: &MediaRef) -> Option<&str> {
        let url = r.fetch_url();
        self.map
            .get(&url)
            .or_else(|| self.map.get(&*canonical_reference(&url)))
            .map(String::as_str)
    }

    /// Replace every fetched reference in `text`, each spelling of it included;
    /// unresolved ones stay untouched.
    /// Longer matches are replaced first so a URL that prefixes another cannot
    /// clobber it.
    pub fn apply(&self, text: &str) -> String {
        if self.map.is_empty() || text.is_empty() {
            return text.to_string();
        }
        let mut seen: AHashSet<String> = AHashSet::new();
        let mut pairs: Vec<(String, &str)> = scan_spans(text)
            .into_iter()
            .filter(|r| seen.insert(r.matched().to_string()))
            .filter_map(|r| self.lookup(&r).map(|local| (r.matched().to_string(), local)))
            .collect();
        if pairs.is_empty() {
            return text.to_string();
        }
        pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        let mut out = text.to_string();
        for (from, to) in pairs {
            out = out.replace(&from, to);
        }
        out
    }
}

/// Converts local media paths (`<media_dir>/<file>.<ext>`) into embed markup.
pub struct MediaEmbedder {
    output_dir: PathBuf,
    re: Regex,
}

impl MediaEmbedder {
    pub fn new(output_dir: impl AsRef<Path>, media_dir_name: &str) -> Result<Self> {
        let pattern = format!(
            r#"(?i){}/[^\s<>")\]]+\.({})"#,
            regex::escape(media_dir_name),
            MEDIA_EXT_ALTERNATION
        );
        let re = Regex::new(&pattern).with_context(|| format!("media path pattern for {media_dir_name:?}"))?;
        Ok(Self { output_dir: output_dir.as_ref().to_path_buf(), re })
    }

    /// HTML-safe rendition of `text`: media paths whose file exists become
    /// `<img>`/`<video>` tags, all other text is escaped.
    pub fn embed(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 64);
        let mut last = 0usize;
        for caps in self.re.captures_iter(text) {
            let Some(m) = caps.get(0) else { continue };
            out.push_str(&html_escape::encode_text(&text[last..m.start()]));
            out.push_str(&self.embed_one(m.as_str(), &caps[1]));
            last = m.end();
        }
        out.push_str(&html_escape::encode_text(&text[last..]));
        out
    }

    fn embed_one(&self, rel_path: &str, ext: &str) -> String {
        let ext = ext.to_ascii_lowercase();
        let escaped = html_escape::encode_double_quoted_attribute(rel_path);
        if !self.output_dir.join(rel_path).is_file() {
            return html_escape::encode_text(rel_path).into_owned();
        }
        if IMAGE_EXTS.contains(&ext.as_str()) {
            format!(r#"<img src="{escaped}" style="max-width: 100%; height: auto; margin: 10px 0; border-radius: 4px;" alt="Image" />"#)
        } else if VIDEO_EXTS.contains(&ext.as_str()) {
            format!(
                r#"<video controls style="max-width: 100%; margin: 10px 0; border-radius: 4px;"><source src="{escaped}" type="video/{ext}">Your browser does not support the video tag.</video>"#
            )
        } else {
            html_escape::encode_text(rel_path).into_owned()
        }
    }
}

fn img_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<img[^>]*>").expect("img pattern"))
}

fn video_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<video[^>]*>.*?</video>").expect("video pattern"))
}

fn src_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)src=["']([^"']+)["']"#).expect("src pattern"))
}

fn source_src_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)<source[^>]+src=["']([^"']+)["']"#).expect("source pattern"))
}

fn any_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag pattern"))
}

fn media_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r#"(?i)[^\s<>")\]]+\.({MEDIA_EXT_ALTERNATION})\b"#)).expect("media path pattern")
    })
}

fn normalize_src(src: &str, output_dir: Option<&Path>, preserve: bool) -> String {
    let src = canonical_reference(src).into_owned();
    match output_dir {
        Some(base) if preserve && Path::new(&src).is_absolute() => relative_slash_path(Path::new(&src), base),
        _ => src,
    }
}

/// Plain text from an embedded body: `<img>` and `<video>` collapse to their
/// source path (`[image]`/`[video]` if none), other tags are dropped and entities
/// decoded. With `preserve_media_paths = false`, media paths become `[media]`.
pub fn clean_text(text: &str, preserve_media_paths: bool, output_dir: Option<&Path>) -> String {
    if text.is_empty() {
        return String::new();
    }
    let s = img_tag_re().replace_all(text, |c: &Captures| {
        src_attr_re()
            .captures(&c[0])
            .map(|s| normalize_src(&s[1], output_dir, preserve_media_paths))
            .unwrap_or_else(|| "[image]".to_string())
    });
    let s = video_tag_re().replace_all(&s, |c: &Captures| {
        source_src_re()
            .captures(&c[0])
            .map(|s| normalize_src(&s[1], output_dir, preserve_media_paths))
            .unwrap_or_else(|| "[video]".to_string())
    });
    let s = any_tag_re().replace_all(&s, "");
    let mut s = html_escape::decode_html_entities(&s).into_owned();
    if !preserve_media_paths {
        s = media_path_re().replace_all(&s, "[media]").into_owned();
    }
    s.trim().to_string()
}
