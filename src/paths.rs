use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Encoding of an input snapshot file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    Plain, // *.jsonl
    Zstd,  // *.jsonl.zst
}

#[derive(Clone, Debug)]
pub struct InputFile {
    pub kind: InputKind,
    pub path: PathBuf,
}

fn classify(path: &Path) -> Option<InputKind> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    if name.ends_with(".jsonl.zst") {
        Some(InputKind::Zstd)
    } else if name.ends_with(".jsonl") {
        Some(InputKind::Plain)
    } else {
        None
    }
}

/// Resolve user-supplied paths into input files.
/// Files must carry a `.jsonl` or `.jsonl.zst` suffix; directories are scanned one
/// level deep and their matches sorted by name. Anything else is warned and skipped.
pub fn discover_inputs(paths: &[PathBuf]) -> Vec<InputFile> {
    let mut out = Vec::new();
    for p in paths {
        if p.is_file() {
            match classify(p) {
                Some(kind) => out.push(InputFile { kind, path: p.clone() }),
                None => tracing::warn!(path = %p.display(), "not a .jsonl file, skipping"),
            }
        } else if p.is_dir() {
            let mut found: Vec<InputFile> = WalkDir::new(p)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| classify(e.path()).map(|kind| InputFile { kind, path: e.into_path() }))
                .collect();
            found.sort_by(|a, b| a.path.cmp(&b.path));
            if found.is_empty() {
                tracing::warn!(dir = %p.display(), "no .jsonl files found");
            } else {
                tracing::info!(dir = %p.display(), count = found.len(), "found input files");
            }
            out.extend(found);
        } else {
            tracing::warn!(path = %p.display(), "input does not exist, skipping");
        }
    }
    out
}
