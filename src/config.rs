use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_WORKERS: usize = 50;

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct ArchiveOptions {
    pub inputs: Vec<PathBuf>,          // files and/or directories of .jsonl / .jsonl.zst
    pub output_dir: PathBuf,
    pub html_name: String,
    pub jsonl_name: String,
    pub media_dir_name: String,        // created under output_dir
    pub workers: usize,                // fetch pool size
    pub attempt_timeout: Duration,     // per request attempt
    pub retry_backoff: Duration,       // sleep between the two attempts
    pub progress: bool,
    pub preserve_media_paths: bool,    // export keeps local paths instead of `[media]`

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output_dir: PathBuf::from("."),
            html_name: "media_aware_visualization.html".to_string(),
            jsonl_name: "conversation_data_cleaned.jsonl".to_string(),
            media_dir_name: "downloaded_media".to_string(),
            workers: DEFAULT_WORKERS,
            attempt_timeout: Duration::from_secs(15),
            retry_backoff: Duration::from_millis(500),
            progress: true,
            preserve_media_paths: true,

            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,
        }
    }
}

impl ArchiveOptions {
    pub fn with_inputs<I, P>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.inputs = inputs.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        self
    }
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_html_name(mut self, name: impl Into<String>) -> Self {
        self.html_name = name.into();
        self
    }
    pub fn with_jsonl_name(mut self, name: impl Into<String>) -> Self {
        self.jsonl_name = name.into();
        self
    }
    pub fn with_media_dir_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.media_dir_name = name.trim_matches('/').to_string();
        self
    }
    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }
    pub fn with_attempt_timeout(mut self, t: Duration) -> Self {
        self.attempt_timeout = t;
        self
    }
    pub fn with_retry_backoff(mut self, d: Duration) -> Self {
        self.retry_backoff = d;
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_preserve_media_paths(mut self, yes: bool) -> Self {
        self.preserve_media_paths = yes;
        self
    }
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }

    pub fn html_path(&self) -> PathBuf {
        self.output_dir.join(&self.html_name)
    }
    pub fn jsonl_path(&self) -> PathBuf {
        self.output_dir.join(&self.jsonl_name)
    }
    pub fn media_dir(&self) -> PathBuf {
        self.output_dir.join(&self.media_dir_name)
    }
}
