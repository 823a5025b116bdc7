//! Cleaned one-post-per-line export for downstream text processing.

use crate::markup::clean_text;
use crate::model::{Comment, Post};
use crate::output::AtomicWriter;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

#[derive(Clone, Debug, Serialize)]
pub struct CleanedComment {
    pub id: String,
    pub author: String,
    pub body: String,
    pub score: i64,
    pub created_at: i64,
    pub replies: Vec<CleanedComment>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CleanedPost {
    pub id: String,
    pub title: String,
    pub author: String,
    pub body: String,
    pub score: i64,
    pub created_at: i64,
    pub subreddit: String,
    /// Top-level comments only.
    pub comment_count: usize,
    pub comments: Vec<CleanedComment>,
}

/// How bodies are flattened to plain text.
#[derive(Clone, Copy, Debug)]
pub struct CleanOptions<'a> {
    pub preserve_media_paths: bool,
    pub output_dir: Option<&'a Path>,
}

impl CleanOptions<'_> {
    fn clean(&self, s: &str) -> String {
        clean_text(s, self.preserve_media_paths, self.output_dir)
    }
}

pub fn clean_comment(c: &Comment, opts: CleanOptions<'_>) -> CleanedComment {
    CleanedComment {
        id: c.id.clone(),
        author: c.author.clone(),
        body: opts.clean(&c.body),
        score: c.score,
        created_at: c.created_at,
        replies: c.replies.iter().map(|r| clean_comment(r, opts)).collect(),
    }
}

pub fn clean_post(post: &Post, opts: CleanOptions<'_>) -> CleanedPost {
    let comments: Vec<CleanedComment> = post.comments.ordered().into_iter().map(|c| clean_comment(c, opts)).collect();
    CleanedPost {
        id: post.id.clone(),
        title: opts.clean(&post.title),
        author: post.author.clone(),
        body: opts.clean(&post.body),
        score: post.score,
        created_at: post.created_at,
        subreddit: post.subreddit.clone(),
        comment_count: comments.len(),
        comments,
    }
}

/// Write one cleaned record per post to `path`, replacing it atomically.
/// A post that fails to serialize is warned about and skipped.
/// Returns the number of posts written.
pub fn export_jsonl(path: &Path, posts: &[Post], opts: CleanOptions<'_>, write_buf_bytes: usize) -> Result<usize> {
    let mut w = AtomicWriter::create(path, write_buf_bytes).with_context(|| format!("create {}", path.display()))?;
    let mut written = 0usize;
    for post in posts {
        let line = match serde_json::to_string(&clean_post(post, opts)) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(post = %post.id, error = %e, "failed to serialize post, skipping");
                continue;
            }
        };
        w.write_line(&line).with_context(|| format!("write {}", path.display()))?;
        written += 1;
    }
    w.finish()?;
    tracing::info!(path = %path.display(), posts = written, preserve_media_paths = opts.preserve_media_paths, "wrote cleaned jsonl");
    Ok(written)
}
