use crate::config::ArchiveOptions;
use crate::export::{export_jsonl, CleanOptions};
use crate::extract::extract_post_media;
use crate::fetch::{FetchStats, HttpSource, MediaFetcher, MediaSource};
use crate::json_utils::{record_id, str_field};
use crate::jsonl::for_each_line;
use crate::listing::{parse_record, Listing, RawRecord, Thing};
use crate::markup::{MediaEmbedder, Replacements};
use crate::merge::merge_trees;
use crate::model::Post;
use crate::paths::{discover_inputs, InputFile};
use crate::progress::ProgressScope;
use crate::render::write_html;
use crate::thread::{collect_listing_media, parse_comments, parse_post, BodyRewriter};
use crate::util::{file_len, init_tracing_once};
use ahash::{AHashMap, AHashSet};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything retained for one post id between collection and reconciliation.
#[derive(Clone, Debug)]
pub struct PendingPost {
    /// The most complete post record seen (longest self-text; later record on a tie).
    pub post: Thing,
    /// Reply listings in the order they were read.
    pub reply_listings: Vec<Listing>,
}

fn selftext_len(t: &Thing) -> usize {
    str_field(&t.data, "selftext").map(|s| s.chars().count()).unwrap_or(0)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub files: usize,
    pub lines: u64,
    pub skipped_lines: u64,
}

/// Accumulates post records and media references across all input lines.
#[derive(Default)]
pub struct Collector {
    posts: Vec<PendingPost>,
    index: AHashMap<String, usize>,
    urls: Vec<String>,
    seen_urls: AHashSet<String>,
    stats: CollectStats,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    fn note_url(&mut self, u: String) {
        if !self.seen_urls.contains(&u) {
            self.seen_urls.insert(u.clone());
            self.urls.push(u);
        }
    }

    /// Validate and absorb one input line. Blank lines are ignored.
    pub fn add_line(&mut self, line: &str) -> Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }
        self.stats.lines += 1;
        let record = parse_record(line.trim())?;
        self.add_record(record);
        Ok(())
    }

    pub fn add_record(&mut self, record: RawRecord) {
        let reply_media = record.replies.as_ref().map(collect_listing_media).unwrap_or_default();
        for thing in record.posts.posts() {
            for u in extract_post_media(&thing.data) {
                self.note_url(u);
            }
            for u in &reply_media {
                self.note_url(u.clone());
            }
            let Some(id) = record_id(&thing.data) else {
                tracing::debug!("post record without id, skipping");
                continue;
            };
            match self.index.get(&id) {
                Some(&i) => {
                    let pending = &mut self.posts[i];
                    if selftext_len(thing) >= selftext_len(&pending.post) {
                        pending.post = thing.clone();
                    }
                    if let Some(r) = &record.replies {
                        pending.reply_listings.push(r.clone());
                    }
                }
                None => {
                    self.index.insert(id, self.posts.len());
                    self.posts.push(PendingPost {
                        post: thing.clone(),
                        reply_listings: record.replies.iter().cloned().collect(),
                    });
                }
            }
        }
    }

    /// Count a line rejected by `add_line`.
    pub fn skip_line(&mut self) {
        self.stats.skipped_lines += 1;
    }

    pub fn posts(&self) -> &[PendingPost] {
        &self.posts
    }

    /// Distinct media references in first-seen order.
    pub fn media_urls(&self) -> &[String] {
        &self.urls
    }

    pub fn stats(&self) -> CollectStats {
        self.stats
    }
}

/// Result of a completed run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub files: usize,
    pub posts: usize,
    pub comments: usize,
    pub media_urls: usize,
    pub media_present: usize,
    pub media_failed: usize,
    pub fetch: FetchStats,
    pub skipped_lines: u64,
    pub exported: usize,
    pub html_path: PathBuf,
    pub jsonl_path: PathBuf,
}

/// How a run ended. The first two variants are fatal for the binary; no output
/// is written in either case.
#[derive(Clone, Debug)]
pub enum RunOutcome {
    NoInputs,
    NoPosts { files: usize, skipped_lines: u64 },
    Completed(RunSummary),
}

#[derive(Clone)]
pub struct ThreadArchiver {
    pub(crate) opts: ArchiveOptions,
}

impl Default for ThreadArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadArchiver {
    pub fn new() -> Self {
        Self { opts: ArchiveOptions::default() }
    }

    pub fn with_options(opts: ArchiveOptions) -> Self {
        Self { opts }
    }

    // -------- Builder methods --------
    pub fn inputs<I, P>(mut self, inputs: I) -> Self where I: IntoIterator<Item = P>, P: AsRef<Path> { self.opts = self.opts.with_inputs(inputs); self }
    pub fn output_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_output_dir(dir); self }
    pub fn html_name(mut self, name: impl Into<String>) -> Self { self.opts = self.opts.with_html_name(name); self }
    pub fn jsonl_name(mut self, name: impl Into<String>) -> Self { self.opts = self.opts.with_jsonl_name(name); self }
    pub fn media_dir_name(mut self, name: impl Into<String>) -> Self { self.opts = self.opts.with_media_dir_name(name); self }
    pub fn workers(mut self, n: usize) -> Self { self.opts = self.opts.with_workers(n); self }
    pub fn attempt_timeout(mut self, t: std::time::Duration) -> Self { self.opts = self.opts.with_attempt_timeout(t); self }
    pub fn retry_backoff(mut self, d: std::time::Duration) -> Self { self.opts = self.opts.with_retry_backoff(d); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn preserve_media_paths(mut self, yes: bool) -> Self { self.opts = self.opts.with_preserve_media_paths(yes); self }
    pub fn io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self { self.opts = self.opts.with_io_buffers(read_bytes, write_bytes); self }

    pub fn options(&self) -> &ArchiveOptions {
        &self.opts
    }

    /// Run against the network.
    pub fn run(self) -> Result<RunOutcome> {
        let source = HttpSource::new(self.opts.attempt_timeout)?;
        self.run_with_source(source)
    }

    /// Collect, fetch, reconcile and emit, using `source` for every download.
    pub fn run_with_source<S: MediaSource>(self, source: S) -> Result<RunOutcome> {
        init_tracing_once();

        let inputs = discover_inputs(&self.opts.inputs);
        if inputs.is_empty() {
            tracing::error!("no valid .jsonl inputs found");
            return Ok(RunOutcome::NoInputs);
        }
        tracing::info!(files = inputs.len(), "reading inputs");

        let collector = self.collect(&inputs)?;
        let stats = collector.stats();
        if collector.posts().is_empty() {
            tracing::error!(files = stats.files, skipped_lines = stats.skipped_lines, "no posts found in inputs");
            return Ok(RunOutcome::NoPosts { files: stats.files, skipped_lines: stats.skipped_lines });
        }
        tracing::info!(
            posts = collector.posts().len(),
            media_urls = collector.media_urls().len(),
            skipped_lines = stats.skipped_lines,
            "collected posts"
        );

        let requested = &self.opts.output_dir;
        fs::create_dir_all(requested).with_context(|| format!("create output dir {}", requested.display()))?;
        let output_dir = requested.canonicalize().with_context(|| format!("resolve {}", requested.display()))?;
        // Every emitted path is anchored at the resolved directory.
        let opts = self.opts.clone().with_output_dir(&output_dir);
        let media_dir = opts.media_dir();

        let fetcher = MediaFetcher::new(source, &media_dir)
            .workers(opts.workers)
            .backoff(opts.retry_backoff)
            .progress(opts.progress);
        let fetched = fetcher.fetch_all(collector.media_urls())?;

        let replacements = Replacements::from_resolved(&fetched.resolved, &output_dir);
        let embedder = MediaEmbedder::new(&output_dir, &opts.media_dir_name)?;
        let rewriter = BodyRewriter::new(replacements, embedder);
        let posts = reconcile(collector.posts(), Some(&rewriter));

        let media_files = fetched.resolved.values().collect::<AHashSet<_>>().len();
        let html_path = opts.html_path();
        write_html(&html_path, &posts, media_files, opts.write_buffer_bytes)?;

        let jsonl_path = opts.jsonl_path();
        let clean = CleanOptions { preserve_media_paths: opts.preserve_media_paths, output_dir: Some(&output_dir) };
        let exported = export_jsonl(&jsonl_path, &posts, clean, opts.write_buffer_bytes)?;

        let summary = RunSummary {
            files: stats.files,
            posts: posts.len(),
            comments: posts.iter().map(|p| p.comments.total_comments()).sum(),
            media_urls: fetched.len(),
            media_present: fetched.present(),
            media_failed: fetched.absent(),
            fetch: fetched.stats,
            skipped_lines: stats.skipped_lines,
            exported,
            html_path,
            jsonl_path,
        };
        tracing::info!(
            posts = summary.posts,
            comments = summary.comments,
            media_present = summary.media_present,
            media_failed = summary.media_failed,
            "archive complete"
        );
        Ok(RunOutcome::Completed(summary))
    }

    /// Read every input. Malformed lines and unreadable files are warned and skipped.
    pub fn collect(&self, inputs: &[InputFile]) -> Result<Collector> {
        let total_bytes: u64 = inputs.iter().filter_map(|f| file_len(&f.path)).sum();
        let pb = ProgressScope::bytes("Reading snapshots", total_bytes, self.opts.progress);
        let mut collector = Collector::new();

        for input in inputs {
            let path = input.path.display().to_string();
            let res = for_each_line(
                input,
                self.opts.read_buffer_bytes,
                |delta| pb.inc(delta),
                |line_no, line| {
                    if let Err(e) = collector.add_line(line) {
                        tracing::warn!(file = %path, line = line_no, error = %e, "skipping malformed line");
                        collector.skip_line();
                    }
                },
            );
            match res {
                Ok(()) => collector.stats.files += 1,
                Err(e) => tracing::warn!(file = %path, error = %e, "failed to read input, skipping"),
            }
        }
        pb.finish(format!("{} posts", collector.posts().len()));
        Ok(collector)
    }
}

/// Build canonical posts: the first reply listing is parsed with the post, the
/// rest are folded in with `merge_trees` in read order.
pub fn reconcile(pending: &[PendingPost], rw: Option<&BodyRewriter>) -> Vec<Post> {
    let mut posts = Vec::with_capacity(pending.len());
    for p in pending {
        let mut listings = p.reply_listings.iter();
        let Some(mut post) = parse_post(&p.post, listings.next(), rw) else {
            continue;
        };
        for listing in listings {
            post.comments = merge_trees(&post.comments, &parse_comments(listing, rw));
        }
        if p.reply_listings.len() > 1 {
            tracing::debug!(
                post = %post.id,
                listings = p.reply_listings.len(),
                comments = post.comments.total_comments(),
                "merged reply listings"
            );
        }
        posts.push(post);
    }
    posts
}
