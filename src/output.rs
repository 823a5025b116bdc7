use crate::util::{create_with_backoff, remove_with_backoff, replace_file_atomic_backoff};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Buffered writer onto `<dest>.tmp`, promoted over `dest` on `finish`.
/// Dropping without `finish` removes the temp file, so a failed run never
/// leaves a truncated output behind.
pub struct AtomicWriter {
    tmp: PathBuf,
    dest: PathBuf,
    w: Option<BufWriter<File>>,
}

impl AtomicWriter {
    pub fn create(dest: &Path, buf_bytes: usize) -> io::Result<Self> {
        let mut tmp = dest.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let f = create_with_backoff(&tmp, 16, 50)?;
        Ok(Self { tmp, dest: dest.to_path_buf(), w: Some(BufWriter::with_capacity(buf_bytes.max(8 * 1024), f)) })
    }

    pub fn write_str(&mut self, s: &str) -> io::Result<()> {
        match &mut self.w {
            Some(w) => w.write_all(s.as_bytes()),
            None => Ok(()),
        }
    }

    /// One already-serialized line; `\n` is appended.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        if let Some(w) = &mut self.w {
            w.write_all(line.as_bytes())?;
            w.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Flush and atomically replace the destination. On failure the temp file
    /// is removed and `dest` is left as it was.
    pub fn finish(mut self) -> Result<()> {
        let flushed = match self.w.take() {
            Some(mut w) => w.flush().with_context(|| format!("flush {}", self.tmp.display())),
            None => Ok(()),
        };
        let res = flushed.and_then(|()| replace_file_atomic_backoff(&self.tmp, &self.dest));
        if res.is_err() {
            let _ = remove_with_backoff(&self.tmp, 4, 25);
        }
        res
    }
}

impl Drop for AtomicWriter {
    fn drop(&mut self) {
        if self.w.take().is_some() {
            let _ = remove_with_backoff(&self.tmp, 4, 25);
        }
    }
}
