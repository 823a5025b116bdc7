#[path = "common/mod.rs"]
mod common;

use common::*;
use rarchive::{Identity, LocalAsset, MediaFetcher};
use std::fs;
use std::path::Path;
use std::time::Duration;

fn fetcher(source: &ScriptedSource, dir: &Path) -> MediaFetcher<ScriptedSource> {
    MediaFetcher::new(source.clone(), dir).workers(4).backoff(Duration::ZERO).progress(false)
}

fn urls(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("https://i.redd.it/img{i}.png")).collect()
}

fn leftover_parts(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "part"))
        .count()
}

#[test]
fn downloads_to_content_addressed_paths() {
    let dir = tempfile::tempdir().unwrap();
    let media = dir.path().join("media");
    let list = urls(3);
    let source = ScriptedSource::ok();

    let res = fetcher(&source, &media).fetch_all(&list).unwrap();

    assert_eq!(res.present(), 3);
    assert_eq!(res.stats.downloaded, 3);
    for u in &list {
        let expected = LocalAsset::for_reference(u).path_in(&media);
        assert_eq!(res.get(u), Some(expected.as_path()));
        assert_eq!(fs::read(&expected).unwrap(), b"media-bytes");
        assert_eq!(source.calls_for(u), vec![Identity::Desktop]);
    }
    assert_eq!(leftover_parts(&media), 0);
}

#[test]
fn second_run_reuses_files_without_requests() {
    let dir = tempfile::tempdir().unwrap();
    let list = urls(5);

    let first = ScriptedSource::ok();
    fetcher(&first, dir.path()).fetch_all(&list).unwrap();
    assert_eq!(first.calls().len(), 5);

    let second = ScriptedSource::ok();
    let res = fetcher(&second, dir.path()).fetch_all(&list).unwrap();
    assert_eq!(res.present(), 5);
    assert_eq!(res.stats.reused, 5);
    assert_eq!(res.stats.downloaded, 0);
    assert!(second.calls().is_empty());
}

#[test]
fn duplicate_urls_in_input_are_fetched_once() {
    let dir = tempfile::tempdir().unwrap();
    let u = "https://i.redd.it/dup.png".to_string();
    let source = ScriptedSource::ok();
    let res = fetcher(&source, dir.path()).fetch_all(&[u.clone(), u.clone(), u.clone()]).unwrap();
    assert_eq!(res.len(), 1);
    assert_eq!(source.calls().len(), 1);
}

#[test]
fn two_encodings_of_one_reference_share_one_request() {
    let dir = tempfile::tempdir().unwrap();
    let encoded = "https://preview.redd.it/x.jpg?width=640&amp;s=abc".to_string();
    let decoded = "https://preview.redd.it/x.jpg?width=640&s=abc".to_string();
    let source = ScriptedSource::ok();

    let res = fetcher(&source, dir.path()).fetch_all(&[encoded.clone(), decoded.clone()]).unwrap();

    assert_eq!(source.calls().len(), 1);
    assert_eq!(source.calls()[0].0, decoded);
    let path = LocalAsset::for_reference(&decoded).path_in(dir.path());
    assert_eq!(res.get(&encoded), Some(path.as_path()));
    assert_eq!(res.get(&decoded), Some(path.as_path()));
    assert_eq!(res.resolved.get(&encoded), Some(&path));
    assert_eq!(res.resolved.get(&decoded), Some(&path));
}

#[test]
fn distinct_assets_download_in_parallel() {
    let dir = tempfile::tempdir().unwrap();
    let list = urls(8);
    let source = ScriptedSource::ok().with_delay(Duration::from_millis(150));

    let res = fetcher(&source, dir.path()).fetch_all(&list).unwrap();

    assert_eq!(res.present(), 8);
    assert_eq!(source.calls().len(), 8);
    assert!(source.peak_in_flight() >= 2, "peak {}", source.peak_in_flight());
}

#[test]
fn many_encodings_of_one_asset_still_download_once_under_load() {
    let dir = tempfile::tempdir().unwrap();
    let decoded = "https://preview.redd.it/y.jpg?width=640&s=abc";
    let mut list = vec![decoded.to_string(), decoded.replace('&', "&amp;")];
    list.extend(urls(6));
    let source = ScriptedSource::ok().with_delay(Duration::from_millis(50));

    let res = fetcher(&source, dir.path()).fetch_all(&list).unwrap();

    assert_eq!(res.present(), 8);
    assert_eq!(source.calls_for(decoded).len(), 1);
}

#[test]
fn retry_switches_to_alternate_identity() {
    let dir = tempfile::tempdir().unwrap();
    let u = "https://i.redd.it/flaky.jpg".to_string();
    let source = ScriptedSource::ok().with(&u, Reply::FailFirst(b"second-try".to_vec()));

    let res = fetcher(&source, dir.path()).fetch_all(std::slice::from_ref(&u)).unwrap();

    assert_eq!(source.calls_for(&u), vec![Identity::Desktop, Identity::Alternate]);
    assert_eq!(Identity::Alternate.referer(), None);
    assert!(Identity::Desktop.referer().is_some());
    let path = res.get(&u).unwrap();
    assert_eq!(fs::read(path).unwrap(), b"second-try");
    assert_eq!(res.stats.downloaded, 1);
}

#[test]
fn one_failing_url_does_not_affect_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let list = urls(10);
    let bad = list[3].clone();
    let source = ScriptedSource::ok().with(&bad, Reply::Status(404));

    let res = fetcher(&source, dir.path()).fetch_all(&list).unwrap();

    assert_eq!(res.len(), 10);
    assert_eq!(res.present(), 9);
    assert_eq!(res.absent(), 1);
    assert_eq!(res.get(&bad), None);
    assert_eq!(res.stats.failed, 1);
    assert_eq!(source.calls_for(&bad).len(), 2);
    assert!(!LocalAsset::for_reference(&bad).path_in(dir.path()).exists());
    assert_eq!(leftover_parts(dir.path()), 0);
}

#[test]
fn zero_byte_bodies_count_as_failures_and_leave_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let u = "https://i.redd.it/empty.gif".to_string();
    let source = ScriptedSource::ok().with(&u, Reply::Empty);

    let res = fetcher(&source, dir.path()).fetch_all(std::slice::from_ref(&u)).unwrap();

    assert_eq!(res.get(&u), None);
    assert_eq!(source.calls_for(&u).len(), 2);
    assert!(!LocalAsset::for_reference(&u).path_in(dir.path()).exists());
    assert_eq!(leftover_parts(dir.path()), 0);
}

#[test]
fn empty_existing_file_is_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let u = "https://i.redd.it/stub.png".to_string();
    let path = LocalAsset::for_reference(&u).path_in(dir.path());
    fs::write(&path, b"").unwrap();
    let source = ScriptedSource::ok();

    let res = fetcher(&source, dir.path()).fetch_all(std::slice::from_ref(&u)).unwrap();

    assert_eq!(source.calls().len(), 1);
    assert_eq!(res.get(&u), Some(path.as_path()));
    assert_eq!(fs::read(&path).unwrap(), b"media-bytes");
}

#[test]
fn empty_url_list_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let source = ScriptedSource::ok();
    let res = fetcher(&source, dir.path()).fetch_all(&[]).unwrap();
    assert!(res.is_empty());
    assert!(res.resolved.is_empty());
    assert!(source.calls().is_empty());
}
