#![allow(dead_code)]

use parking_lot::Mutex;
use rarchive::{FetchError, Identity, MediaSource};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A post child (`t3`) with the given self-text.
pub fn post(id: &str, title: &str, selftext: &str) -> Value {
    post_with(id, json!({ "title": title, "selftext": selftext }))
}

/// A post child with extra fields merged over the defaults.
pub fn post_with(id: &str, extra: Value) -> Value {
    let mut data = json!({
        "name": format!("t3_{id}"), "id": id, "title": "Untitled", "selftext": "",
        "author": "op", "score": 10, "created_utc": 1_700_000_000.0, "subreddit": "rust"
    });
    if let (Some(d), Some(e)) = (data.as_object_mut(), extra.as_object()) {
        for (k, v) in e {
            d.insert(k.clone(), v.clone());
        }
    }
    json!({ "kind": "t3", "data": data })
}

/// A comment child (`t1`); `replies` become a nested listing, or `""` when empty.
pub fn comment(id: &str, author: &str, body: &str, score: i64, created: i64, replies: Vec<Value>) -> Value {
    let replies = if replies.is_empty() { json!("") } else { listing(replies) };
    json!({
        "kind": "t1",
        "data": {
            "name": format!("t1_{id}"), "id": id, "author": author, "body": body,
            "score": score, "created_utc": created, "replies": replies
        }
    })
}

/// Leaf comment shorthand.
pub fn leaf(id: &str, body: &str, score: i64) -> Value {
    comment(id, "user", body, score, 1_700_000_100, vec![])
}

pub fn more(id: &str) -> Value {
    json!({ "kind": "more", "data": { "name": format!("t1_{id}"), "id": id, "count": 3, "children": ["x", "y"] } })
}

pub fn listing(children: Vec<Value>) -> Value {
    json!({ "kind": "Listing", "data": { "children": children } })
}

/// One input line: `[postListing, replyListing]`.
pub fn record_line(post: Value, replies: Vec<Value>) -> String {
    json!([listing(vec![post]), listing(replies)]).to_string()
}

pub fn write_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = File::create(path).unwrap();
    for l in lines {
        writeln!(f, "{l}").unwrap();
    }
}

/// Same as `write_lines` but zstd-compressed.
pub fn write_zst_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    for l in lines {
        writeln!(&mut enc, "{l}").unwrap();
    }
    enc.finish().unwrap();
}

/// Read a JSONL file into values (skips empty lines).
pub fn read_jsonl_values(path: &Path) -> Vec<Value> {
    let r = BufReader::new(File::open(path).unwrap());
    r.lines()
        .map(|l| l.unwrap())
        .filter(|s| !s.is_empty())
        .map(|s| serde_json::from_str(&s).unwrap())
        .collect()
}

/// Scripted response for one URL.
#[derive(Clone, Debug)]
pub enum Reply {
    Bytes(Vec<u8>),
    /// First attempt fails with a status, later attempts return the bytes.
    FailFirst(Vec<u8>),
    Status(u16),
    Empty,
}

/// In-memory `MediaSource` that records every call. Clones share the call log,
/// so a test can keep a handle after moving the source into a fetcher.
#[derive(Clone)]
pub struct ScriptedSource {
    replies: HashMap<String, Reply>,
    fallback: Reply,
    calls: Arc<Mutex<Vec<(String, Identity)>>>,
    delay: Duration,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ScriptedSource {
    /// Every URL succeeds with a few bytes unless scripted otherwise.
    pub fn ok() -> Self {
        Self {
            replies: HashMap::new(),
            fallback: Reply::Bytes(b"media-bytes".to_vec()),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every call sleeps for `d` before answering.
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay = d;
        self
    }

    /// Most calls observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn with(mut self, url: &str, reply: Reply) -> Self {
        self.replies.insert(url.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<(String, Identity)> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, url: &str) -> Vec<Identity> {
        self.calls.lock().iter().filter(|(u, _)| u == url).map(|(_, i)| *i).collect()
    }
}

impl MediaSource for ScriptedSource {
    fn fetch(&self, url: &str, identity: Identity, sink: &mut dyn Write) -> Result<u64, FetchError> {
        let attempt = {
            let mut calls = self.calls.lock();
            calls.push((url.to_string(), identity));
            calls.iter().filter(|(u, _)| u == url).count()
        };
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.active.fetch_sub(1, Ordering::SeqCst);
        match self.replies.get(url).unwrap_or(&self.fallback) {
            Reply::Bytes(b) => {
                sink.write_all(b)?;
                Ok(b.len() as u64)
            }
            Reply::FailFirst(b) if attempt > 1 => {
                sink.write_all(b)?;
                Ok(b.len() as u64)
            }
            Reply::FailFirst(_) => Err(FetchError::Status(403)),
            Reply::Status(code) => Err(FetchError::Status(*code)),
            Reply::Empty => Ok(0),
        }
    }
}
