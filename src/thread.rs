//! Conversion of raw listing records into `Post`/`Comment` values.
//!
//! Bodies pass through an optional `BodyRewriter` on the way in: fetched media
//! references become local paths, then the text is made HTML-safe. Without a
//! rewriter, bodies are kept exactly as received.

use crate::extract::extract_comment_media;
use crate::json_utils::{i64_field, record_id, str_field};
use crate::listing::{child_kind, reply_children, Listing, Thing, KIND_COMMENT};
use crate::markup::{MediaEmbedder, Replacements};
use crate::merge::merge_comment;
use crate::model::{display_order, Comment, CommentTree, Post, DELETED_AUTHOR};
use serde_json::Value;

/// Nesting beyond this depth is dropped with a warning.
pub const MAX_REPLY_DEPTH: usize = 256;

pub const UNTITLED: &str = "Untitled";

/// Local-path substitution followed by embedding.
pub struct BodyRewriter {
    replacements: Replacements,
    embedder: MediaEmbedder,
}

impl BodyRewriter {
    pub fn new(replacements: Replacements, embedder: MediaEmbedder) -> Self {
        Self { replacements, embedder }
    }

    pub fn rewrite(&self, text: &str) -> String {
        self.embedder.embed(&self.replacements.apply(text))
    }
}

fn body_text(raw: &str, rw: Option<&BodyRewriter>) -> String {
    match rw {
        Some(rw) => rw.rewrite(raw),
        None => raw.to_string(),
    }
}

/// Parse one comment record's `data` with its nested replies.
/// Returns `None` when the record carries no id.
pub fn parse_comment(data: &Value, rw: Option<&BodyRewriter>) -> Option<Comment> {
    parse_comment_at(data, rw, 1)
}

fn parse_comment_at(data: &Value, rw: Option<&BodyRewriter>, depth: usize) -> Option<Comment> {
    let id = record_id(data)?;
    let children = reply_children(data);
    let replies = if children.is_empty() {
        Vec::new()
    } else if depth >= MAX_REPLY_DEPTH {
        tracing::warn!(comment = %id, depth, "reply nesting too deep, dropping descendants");
        Vec::new()
    } else {
        parse_children(children, rw, depth + 1)
    };
    Some(Comment {
        author: str_field(data, "author").unwrap_or(DELETED_AUTHOR).to_string(),
        body: body_text(str_field(data, "body").unwrap_or(""), rw),
        score: i64_field(data, "score"),
        created_at: i64_field(data, "created_utc"),
        replies,
        id,
    })
}

/// Comment children of a nested listing; `more` placeholders and other kinds are skipped.
fn parse_children(children: &[Value], rw: Option<&BodyRewriter>, depth: usize) -> Vec<Comment> {
    let mut out: Vec<Comment> = Vec::with_capacity(children.len());
    for child in children.iter().filter(|c| child_kind(c) == KIND_COMMENT) {
        let Some(data) = child.get("data") else { continue };
        let Some(c) = parse_comment_at(data, rw, depth) else { continue };
        match out.iter().position(|o| o.id == c.id) {
            Some(i) => out[i] = merge_comment(&out[i], &c),
            None => out.push(c),
        }
    }
    out.sort_by(display_order);
    out
}

/// Top-level comments of one reply listing.
pub fn parse_comments(listing: &Listing, rw: Option<&BodyRewriter>) -> CommentTree {
    let mut tree = CommentTree::new();
    for thing in listing.comments() {
        let Some(c) = parse_comment(&thing.data, rw) else { continue };
        let c = match tree.remove(&c.id) {
            Some(prev) => merge_comment(&prev, &c),
            None => c,
        };
        tree.insert(c);
    }
    tree
}

/// Build a post from its record and (optionally) one reply listing.
/// Returns `None` for records that are not posts or carry no id.
pub fn parse_post(thing: &Thing, replies: Option<&Listing>, rw: Option<&BodyRewriter>) -> Option<Post> {
    if !thing.is_post() {
        return None;
    }
    let data = &thing.data;
    let id = record_id(data)?;
    Some(Post {
        title: str_field(data, "title").unwrap_or(UNTITLED).to_string(),
        body: body_text(str_field(data, "selftext").unwrap_or(""), rw),
        author: str_field(data, "author").unwrap_or(DELETED_AUTHOR).to_string(),
        score: i64_field(data, "score"),
        created_at: i64_field(data, "created_utc"),
        subreddit: str_field(data, "subreddit").unwrap_or("").to_string(),
        comments: replies.map(|l| parse_comments(l, rw)).unwrap_or_default(),
        id,
    })
}

/// Media references in every comment of `listing`, at any depth.
pub fn collect_listing_media(listing: &Listing) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack: Vec<&Value> = listing.comments().map(|t| &t.data).collect();
    stack.reverse();
    while let Some(data) = stack.pop() {
        out.extend(extract_comment_media(data));
        let children: Vec<&Value> = reply_children(data)
            .iter()
            .filter(|c| child_kind(c) == KIND_COMMENT)
            .filter_map(|c| c.get("data"))
            .collect();
        stack.extend(children.into_iter().rev());
    }
    out
}
