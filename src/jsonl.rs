//! Line streaming over plain or zstd-compressed JSONL snapshots, with byte progress.

use crate::paths::{InputFile, InputKind};
use crate::util::open_with_backoff;
use anyhow::{Context, Result};
use std::io::{self, BufRead, BufReader, Read};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use zstd::stream::read::Decoder;

/// A `Read` wrapper that counts on-disk bytes consumed, so progress tracks the
/// file size even when the stream is decompressed.
struct CountingReader<R: Read> {
    inner: R,
    counter: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Stream `input` line by line. `on_line` receives the 1-based line number and the
/// line with its terminator stripped; `on_progress` receives on-disk byte deltas.
///
/// Lines that are not valid UTF-8 are warned about and skipped; the file continues.
pub fn for_each_line(
    input: &InputFile,
    read_buf_bytes: usize,
    mut on_progress: impl FnMut(u64),
    mut on_line: impl FnMut(u64, &str),
) -> Result<()> {
    let file = open_with_backoff(&input.path, 16, 50)
        .with_context(|| format!("open {}", input.path.display()))?;
    let counter = Arc::new(AtomicU64::new(0));
    let counted = CountingReader { inner: file, counter: counter.clone() };

    let cap = read_buf_bytes.max(8 * 1024);
    let mut reader: Box<dyn BufRead> = match input.kind {
        InputKind::Plain => Box::new(BufReader::with_capacity(cap, counted)),
        InputKind::Zstd => {
            let mut decoder = Decoder::new(counted)
                .with_context(|| format!("zstd header {}", input.path.display()))?;
            decoder.window_log_max(31)?;
            Box::new(BufReader::with_capacity(cap, decoder))
        }
    };

    let mut buf = Vec::with_capacity(16 * 1024);
    let mut last = 0u64;
    let mut line_no = 0u64;
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("read {} (line {})", input.path.display(), line_no + 1))?;
        let cur = counter.load(Ordering::Relaxed);
        if cur > last {
            on_progress(cur - last);
            last = cur;
        }
        if n == 0 {
            break;
        }
        line_no += 1;
        if buf.ends_with(b"\n") {
            buf.pop();
            if buf.ends_with(b"\r") {
                buf.pop();
            }
        }
        match std::str::from_utf8(&buf) {
            Ok(line) => on_line(line_no, line),
            Err(e) => tracing::warn!(
                path = %input.path.display(), line = line_no, error = %e,
                "skipping line with invalid UTF-8"
            ),
        }
    }
    Ok(())
}
