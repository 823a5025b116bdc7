#[path = "common/mod.rs"]
mod common;

use common::*;
use rarchive::{Collector, LocalAsset, RunOutcome, RunSummary, ThreadArchiver};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn archiver(inputs: &[PathBuf], out: &Path) -> ThreadArchiver {
    ThreadArchiver::new()
        .inputs(inputs)
        .output_dir(out)
        .workers(4)
        .retry_backoff(Duration::ZERO)
        .progress(false)
}

fn completed(outcome: RunOutcome) -> RunSummary {
    match outcome {
        RunOutcome::Completed(s) => s,
        other => panic!("expected a completed run, got {other:?}"),
    }
}

fn comment_ids(list: &Value) -> Vec<String> {
    list.as_array().unwrap().iter().map(|c| c["id"].as_str().unwrap().to_string()).collect()
}

/// Two snapshots of one thread: the first lost c1's text and lacks c3, the
/// second lost c2 behind a "more" stub and carries a longer self-text.
fn overlapping_snapshots(dir: &Path) -> Vec<PathBuf> {
    let a = dir.join("a.jsonl");
    let b = dir.join("b.jsonl");
    write_lines(
        &a,
        &[record_line(
            post("p1", "Thread", "short"),
            vec![
                comment("c1", "alice", "[unavailable]", 0, 100, vec![leaf("r1", "first reply", 2)]),
                comment("c2", "bob", "second", 5, 200, vec![]),
            ],
        )],
    );
    write_lines(
        &b,
        &[record_line(
            post("p1", "Thread", "a much longer body"),
            vec![
                comment("c1", "alice", "recovered", 10, 100, vec![leaf("r2", "later reply", 1), more("m1")]),
                comment("c3", "carol", "third", 1, 300, vec![]),
                more("m2"),
            ],
        )],
    );
    vec![a, b]
}

#[test]
fn overlapping_snapshots_merge_into_one_tree() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let inputs = overlapping_snapshots(dir.path());

    let summary = completed(archiver(&inputs, &out).run_with_source(ScriptedSource::ok()).unwrap());
    assert_eq!(summary.files, 2);
    assert_eq!(summary.posts, 1);
    assert_eq!(summary.comments, 5);
    assert_eq!(summary.exported, 1);
    assert!(summary.html_path.is_file());

    let rows = read_jsonl_values(&summary.jsonl_path);
    assert_eq!(rows.len(), 1);
    let p = &rows[0];
    assert_eq!(p["id"], "t3_p1");
    assert_eq!(p["body"], "a much longer body");
    assert_eq!(p["comment_count"], 3);
    assert_eq!(comment_ids(&p["comments"]), vec!["t1_c1", "t1_c2", "t1_c3"]);

    let c1 = &p["comments"][0];
    assert_eq!(c1["body"], "recovered");
    assert_eq!(c1["score"], 10);
    assert_eq!(comment_ids(&c1["replies"]), vec!["t1_r1", "t1_r2"]);

    let html = fs::read_to_string(&summary.html_path).unwrap();
    assert!(html.contains("5 comments"));
    assert!(html.contains("recovered"));
    assert!(!html.contains("t1_m1"));
}

#[test]
fn media_is_fetched_once_and_linked_locally() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let input = dir.path().join("in.jsonl");
    let pic = "https://i.redd.it/pic.png";
    let gif = "https://media.giphy.com/media/xyz/giphy.gif";
    write_lines(
        &input,
        &[
            record_line(post("p1", "Pics", &format!("look {pic}")), vec![leaf("c1", "reaction ![gif](giphy|xyz)", 3)]),
            record_line(post("p1", "Pics", &format!("look {pic}")), vec![leaf("c2", &format!("same {pic}"), 1)]),
        ],
    );

    let source = ScriptedSource::ok();
    let summary = completed(archiver(&[input.clone()], &out).run_with_source(source.clone()).unwrap());
    assert_eq!(summary.media_urls, 2);
    assert_eq!(summary.media_present, 2);
    assert_eq!(source.calls().len(), 2);

    let pic_local = format!("downloaded_media/{}", LocalAsset::for_reference(pic).file_name());
    let gif_local = format!("downloaded_media/{}", LocalAsset::for_reference(gif).file_name());
    assert!(out.join(&pic_local).is_file());
    assert!(out.join(&gif_local).is_file());

    let html = fs::read_to_string(&summary.html_path).unwrap();
    assert!(html.contains(&format!(r#"<img src="{pic_local}""#)));
    assert!(html.contains(&format!(r#"<img src="{gif_local}""#)));
    assert!(!html.contains("giphy|xyz"));

    let rows = read_jsonl_values(&summary.jsonl_path);
    assert_eq!(rows[0]["body"], format!("look {pic_local}"));
    assert_eq!(rows[0]["comments"][0]["body"], format!("reaction {gif_local}"));

    // Second run over the same output directory reuses everything on disk.
    let again = ScriptedSource::ok();
    let summary = completed(archiver(&[input], &out).run_with_source(again.clone()).unwrap());
    assert_eq!(summary.media_present, 2);
    assert_eq!(summary.fetch.reused, 2);
    assert!(again.calls().is_empty());
}

#[test]
fn failed_media_leaves_the_original_reference() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let input = dir.path().join("in.jsonl");
    let bad = "https://i.redd.it/gone.png";
    write_lines(&input, &[record_line(post("p1", "T", &format!("was {bad}")), vec![])]);

    let source = ScriptedSource::ok().with(bad, Reply::Status(404));
    let summary = completed(archiver(&[input], &out).run_with_source(source).unwrap());
    assert_eq!(summary.media_failed, 1);

    let rows = read_jsonl_values(&summary.jsonl_path);
    assert_eq!(rows[0]["body"], format!("was {bad}"));
    assert!(fs::read_to_string(&summary.html_path).unwrap().contains(bad));
}

#[test]
fn strip_media_paths_replaces_local_paths_in_export() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let input = dir.path().join("in.jsonl");
    write_lines(&input, &[record_line(post("p1", "T", "see https://i.redd.it/x.png"), vec![])]);

    let summary = completed(
        archiver(&[input], &out).preserve_media_paths(false).run_with_source(ScriptedSource::ok()).unwrap(),
    );
    assert_eq!(read_jsonl_values(&summary.jsonl_path)[0]["body"], "see [media]");
}

#[test]
fn malformed_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let input = dir.path().join("mixed.jsonl");
    write_lines(
        &input,
        &[
            "garbage".to_string(),
            "[]".to_string(),
            String::new(),
            record_line(post("p1", "ok", ""), vec![leaf("c1", "hi", 1)]),
            r#"[{"kind":"Listing","data":{"children":[]}}, 42]"#.to_string(),
        ],
    );

    let summary = completed(archiver(&[input], &out).run_with_source(ScriptedSource::ok()).unwrap());
    assert_eq!(summary.posts, 1);
    assert_eq!(summary.comments, 1);
    assert_eq!(summary.skipped_lines, 3);
}

#[test]
fn zstd_inputs_and_directories_are_read() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let inputs = dir.path().join("inputs");
    write_zst_lines(&inputs.join("one.jsonl.zst"), &[record_line(post("p1", "A", ""), vec![leaf("c1", "x", 1)])]);
    write_lines(&inputs.join("two.jsonl"), &[record_line(post("p2", "B", ""), vec![])]);
    write_lines(&inputs.join("notes.txt"), &["ignored".to_string()]);

    let summary = completed(archiver(&[inputs], &out).run_with_source(ScriptedSource::ok()).unwrap());
    assert_eq!(summary.files, 2);
    assert_eq!(summary.posts, 2);

    let ids: Vec<String> = read_jsonl_values(&summary.jsonl_path)
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["t3_p1", "t3_p2"]);
}

#[test]
fn no_valid_inputs_is_reported_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let txt = dir.path().join("notes.txt");
    fs::write(&txt, "hello").unwrap();

    let outcome = archiver(&[txt, dir.path().join("missing.jsonl")], &out)
        .run_with_source(ScriptedSource::ok())
        .unwrap();
    assert!(matches!(outcome, RunOutcome::NoInputs));
    assert!(!out.exists());
}

#[test]
fn inputs_without_posts_are_reported_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let input = dir.path().join("bad.jsonl");
    write_lines(&input, &["nope".to_string(), "{}".to_string()]);

    let outcome = archiver(&[input], &out).run_with_source(ScriptedSource::ok()).unwrap();
    match outcome {
        RunOutcome::NoPosts { files, skipped_lines } => {
            assert_eq!(files, 1);
            assert_eq!(skipped_lines, 2);
        }
        other => panic!("expected NoPosts, got {other:?}"),
    }
    assert!(!out.exists());
}

#[test]
fn equal_length_selftext_keeps_the_later_record() {
    let mut c = Collector::new();
    c.add_line(&record_line(post("p1", "Early", "abcd"), vec![])).unwrap();
    c.add_line(&record_line(post("p1", "Late", "wxyz"), vec![])).unwrap();

    assert_eq!(c.posts().len(), 1);
    let kept = &c.posts()[0];
    assert_eq!(kept.post.data["title"], "Late");
    assert_eq!(kept.post.data["selftext"], "wxyz");
    assert_eq!(kept.reply_listings.len(), 2);
}

#[test]
fn shorter_later_selftext_does_not_replace_the_post() {
    let mut c = Collector::new();
    c.add_line(&record_line(post("p1", "Full", "a long body"), vec![])).unwrap();
    c.add_line(&record_line(post("p1", "Cut", "short"), vec![])).unwrap();
    // Length counts characters, not bytes.
    c.add_line(&record_line(post("p1", "Wide", "éééééééééé"), vec![])).unwrap();

    assert_eq!(c.posts()[0].post.data["title"], "Full");
    assert_eq!(c.stats().lines, 3);
}
