//! Self-contained HTML page for a set of reconciled posts.
//!
//! Bodies are expected to be HTML-safe already (see `markup::MediaEmbedder`);
//! titles, authors and subreddit names are escaped here.

use crate::model::{Comment, Post, DELETED_AUTHOR};
use crate::output::AtomicWriter;
use anyhow::{Context, Result};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::fmt::Write as _;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const STYLE: &str = r#"
    * { box-sizing: border-box; }
    body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif;
           margin: 0; padding: 0; background: #dae0e6; color: #1c1c1c; line-height: 1.5; }
    .header { background: #ffffff; border-bottom: 1px solid #edeff1; padding: 12px 16px; position: sticky; top: 0;
              z-index: 100; box-shadow: 0 2px 4px rgba(0,0,0,0.05); }
    .header-content { max-width: 1200px; margin: 0 auto; display: flex; align-items: center; gap: 16px; }
    .header h1 { margin: 0; font-size: 20px; font-weight: 700; color: #1a1a1b; }
    .header-stats { color: #7c7c7c; font-size: 14px; }
    .container { max-width: 1200px; margin: 0 auto; padding: 16px; }
    .post { background: #ffffff; border: 1px solid #ccc; border-radius: 4px; margin-bottom: 16px; overflow: hidden; }
    .post-header { padding: 12px 16px; border-bottom: 1px solid #edeff1; }
    .post-title { font-weight: 600; font-size: 18px; color: #1a1a1b; margin: 0 0 4px 0; line-height: 1.3; }
    .post-meta { font-size: 12px; color: #7c7c7c; display: flex; align-items: center; gap: 8px; }
    .subreddit, .post-author { font-weight: 600; color: #1a1a1b; }
    .post-body { padding: 16px; border-top: 1px solid #edeff1; white-space: pre-wrap; word-wrap: break-word; }
    .comments-section { border-top: 1px solid #edeff1; }
    .comment { padding: 8px 16px; border-left: 2px solid transparent; }
    .comment:hover { background: #f8f9fa; }
    .comment-thread { border-left: 2px solid #edeff1; margin-left: 16px; padding-left: 8px; }
    .comment-header { display: flex; align-items: center; gap: 8px; margin-bottom: 4px; font-size: 12px; }
    .comment-author { font-weight: 600; color: #1a1a1b; }
    .comment-score { color: #7c7c7c; font-weight: 600; }
    .comment-score.positive { color: #ff4500; }
    .comment-score.negative { color: #7193ff; }
    .comment-time { color: #7c7c7c; }
    .comment-body { margin-top: 4px; word-wrap: break-word; white-space: pre-wrap; }
    .comment-body img, .comment-body video { max-width: 100%; height: auto; margin: 8px 0; border-radius: 4px; }
    .deleted-author { color: #7c7c7c; font-style: italic; }
"#;

/// Coarse age of `ts` relative to `now`: `3y ago`, `12d ago`, `5h ago`, `7m ago`
/// or `just now`. Zero timestamps render as an empty string.
pub fn format_relative(ts: i64, now: OffsetDateTime) -> String {
    if ts == 0 {
        return String::new();
    }
    let secs = (now.unix_timestamp() - ts).max(0);
    let days = secs / 86_400;
    if days > 365 {
        format!("{}y ago", days / 365)
    } else if days > 0 {
        format!("{days}d ago")
    } else if secs > 3_600 {
        format!("{}h ago", secs / 3_600)
    } else if secs > 60 {
        format!("{}m ago", secs / 60)
    } else {
        "just now".to_string()
    }
}

fn format_absolute(ts: i64) -> String {
    OffsetDateTime::from_unix_timestamp(ts)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_default()
}

fn score_parts(score: i64) -> (&'static str, String) {
    let class = match score {
        s if s > 0 => "positive",
        s if s < 0 => "negative",
        _ => "",
    };
    let shown = if score == 0 { "0".to_string() } else { format!("{score:+}") };
    (class, shown)
}

fn write_time(out: &mut String, ts: i64, now: OffsetDateTime) -> std::fmt::Result {
    write!(
        out,
        r#"<span class="comment-time" title="{}">{}</span>"#,
        attr(&format_absolute(ts)),
        format_relative(ts, now)
    )
}

fn write_comment(out: &mut String, c: &Comment, nested: bool, now: OffsetDateTime) -> std::fmt::Result {
    if nested {
        out.push_str(r#"<div class="comment-thread">"#);
    }
    write!(out, r#"<div class="comment" id="c-{}"><div class="comment-header">"#, attr(&c.id))?;
    if c.author == DELETED_AUTHOR {
        out.push_str(r#"<span class="deleted-author">[deleted]</span>"#);
    } else {
        write!(out, r#"<span class="comment-author">u/{}</span>"#, text(&c.author))?;
    }
    let (class, shown) = score_parts(c.score);
    write!(out, r#"<span class="comment-score {class}">{shown} points</span>"#)?;
    write_time(out, c.created_at, now)?;
    write!(out, r#"</div><div class="comment-body">{}</div>"#, c.body)?;
    for reply in &c.replies {
        write_comment(out, reply, true, now)?;
    }
    out.push_str("</div>");
    if nested {
        out.push_str("</div>");
    }
    out.push('\n');
    Ok(())
}

fn write_post(out: &mut String, post: &Post, now: OffsetDateTime) -> std::fmt::Result {
    let id = attr(&post.id);
    writeln!(out, r#"<div class="post"><div class="post-header">"#)?;
    writeln!(out, r#"<div class="post-title">{}</div>"#, text(&post.title))?;
    write!(
        out,
        r#"<div class="post-meta"><span class="subreddit">r/{}</span><span>•</span><span class="post-author">u/{}</span><span>•</span><span class="post-score">{} points</span><span>•</span>"#,
        text(&post.subreddit),
        text(&post.author),
        post.score
    )?;
    write_time(out, post.created_at, now)?;
    writeln!(out, r#"<span>•</span><span>{} comments</span></div></div>"#, post.comments.total_comments())?;
    writeln!(out, r#"<div class="post-body" id="post-{id}">{}</div>"#, post.body)?;
    writeln!(out, r#"<div class="comments-section" id="comments-{id}">"#)?;
    for c in post.comments.ordered() {
        write_comment(out, c, false, now)?;
    }
    writeln!(out, "</div></div>")
}

fn write_page(out: &mut String, posts: &[Post], media_files: usize, now: OffsetDateTime) -> std::fmt::Result {
    writeln!(out, "<!DOCTYPE html>\n<html>\n<head>")?;
    writeln!(out, "<title>Reddit Conversation Archive</title>")?;
    writeln!(out, r#"<meta charset="UTF-8">"#)?;
    writeln!(out, r#"<meta name="viewport" content="width=device-width, initial-scale=1.0">"#)?;
    writeln!(out, "<style>{STYLE}</style>\n</head>\n<body>")?;
    writeln!(
        out,
        r#"<div class="header"><div class="header-content"><h1>Reddit Conversation Archive</h1><div class="header-stats">{} posts • {} media files</div></div></div>"#,
        posts.len(),
        media_files
    )?;
    writeln!(out, r#"<div class="container"><div class="post-list">"#)?;
    for post in posts {
        write_post(out, post, now)?;
    }
    writeln!(out, "</div></div>\n</body>\n</html>")
}

/// The complete page as a string. `now` anchors the relative timestamps.
pub fn render_html(posts: &[Post], media_files: usize, now: OffsetDateTime) -> Result<String> {
    let mut out = String::with_capacity(16 * 1024 + STYLE.len());
    write_page(&mut out, posts, media_files, now).context("render html")?;
    Ok(out)
}

/// Render and atomically write the page to `path`.
pub fn write_html(path: &Path, posts: &[Post], media_files: usize, write_buf_bytes: usize) -> Result<()> {
    let page = render_html(posts, media_files, OffsetDateTime::now_utc())?;
    let mut w = AtomicWriter::create(path, write_buf_bytes).with_context(|| format!("create {}", path.display()))?;
    w.write_str(&page).with_context(|| format!("write {}", path.display()))?;
    w.finish()?;
    tracing::info!(path = %path.display(), posts = posts.len(), media_files, "wrote html");
    Ok(())
}
