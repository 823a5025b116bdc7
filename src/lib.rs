mod config;
mod paths;
mod jsonl;
mod progress;
mod util;
mod json_utils;
mod output;

mod listing;
mod asset;
mod extract;
mod model;
mod merge;
mod fetch;
mod markup;
mod thread;

mod render;
mod export;
mod pipeline;

pub use crate::config::{ArchiveOptions, DEFAULT_WORKERS};
pub use crate::pipeline::{reconcile, CollectStats, Collector, PendingPost, RunOutcome, RunSummary, ThreadArchiver};

pub use crate::paths::{discover_inputs, InputFile, InputKind};
pub use crate::jsonl::for_each_line;
pub use crate::listing::{parse_record, Listing, RawRecord, Thing, KIND_COMMENT, KIND_LISTING, KIND_MORE, KIND_POST};

// addressing and extraction
pub use crate::asset::{canonical_reference, hash16, infer_extension, LocalAsset};
pub use crate::extract::{extract_comment_media, extract_media_urls, extract_post_media, scan_spans, scan_text, shorthand_url, MediaRef};

// reply trees
pub use crate::model::{display_order, Comment, CommentTree, Post, DELETED_AUTHOR, UNAVAILABLE_BODY};
pub use crate::merge::{merge_all, merge_comment, merge_replies, merge_trees};
pub use crate::thread::{collect_listing_media, parse_comment, parse_comments, parse_post, BodyRewriter, MAX_REPLY_DEPTH};

// media fetching; `MediaSource` is the transport seam
pub use crate::fetch::{FetchError, FetchResults, FetchStats, HttpSource, Identity, MediaCache, MediaFetcher, MediaSource, ATTEMPTS};

pub use crate::markup::{clean_text, relative_slash_path, MediaEmbedder, Replacements};
pub use crate::render::{format_relative, render_html, write_html};
pub use crate::export::{clean_comment, clean_post, export_jsonl, CleanOptions, CleanedComment, CleanedPost};

pub use crate::output::AtomicWriter;
pub use crate::progress::ProgressScope;
pub use crate::util::{init_tracing_once, create_with_backoff, open_with_backoff, remove_with_backoff, replace_file_atomic_backoff};
