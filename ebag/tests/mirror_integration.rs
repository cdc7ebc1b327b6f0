use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ebag::mirror::{content_tag, MirrorProvider};
use ebag::tags::{TagStore, TAG_FILE_NAME};
use ebag_core::contract::SyncProvider;
use ebag_core::pipe::{collect, from_iter};
use ebag_core::pipeline::{download_pipeline, upload_pipeline};
use ebag_core::sink::drain;
use ebag_core::synchronise::{run_download, run_upload};
use ebag_core::SyncError;
use tempfile::{tempdir, TempDir};
use tokio::time::Instant;

fn write(root: &Path, key: &str, content: &[u8]) -> PathBuf {
    let path = root.join(key);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

struct Fixture {
    drop_dir: TempDir,
    mirror: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            drop_dir: tempdir().unwrap(),
            mirror: tempdir().unwrap(),
        }
    }

    fn provider(&self) -> MirrorProvider {
        MirrorProvider::new(self.drop_dir.path(), self.mirror.path()).with_transfer_concurrency(3)
    }
}

#[tokio::test]
async fn download_skips_object_with_recorded_tag() {
    let fx = Fixture::new();
    write(fx.mirror.path(), "a.txt", b"alpha");
    let b = write(fx.mirror.path(), "b.txt", b"bravo");
    write(fx.mirror.path(), "c.txt", b"charlie");

    let mut tags = TagStore::empty(fx.drop_dir.path().join(TAG_FILE_NAME));
    tags.record("b.txt", content_tag(&b).unwrap());
    tags.save().await.unwrap();

    let downloaded = collect(download_pipeline(&fx.provider())).await;

    let names: Vec<_> = downloaded
        .iter()
        .map(|evt| evt.local_file_name.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["a.txt", "c.txt"]);
    assert_eq!(fs::read(fx.drop_dir.path().join("a.txt")).unwrap(), b"alpha");
    assert_eq!(fs::read(fx.drop_dir.path().join("c.txt")).unwrap(), b"charlie");
    assert!(!fx.drop_dir.path().join("b.txt").exists());
}

#[tokio::test]
async fn second_download_transfers_nothing_until_an_object_changes() {
    let fx = Fixture::new();
    write(fx.mirror.path(), "docs/readme.md", b"# hello");
    write(fx.mirror.path(), "docs/deep/notes.txt", b"notes");
    write(fx.mirror.path(), "top.bin", &[0u8, 1, 2, 3]);

    let first = run_download(&fx.provider()).await.unwrap();
    assert_eq!(first.completed, 3);
    assert_eq!(
        fs::read(fx.drop_dir.path().join("docs/deep/notes.txt")).unwrap(),
        b"notes"
    );

    let second = run_download(&fx.provider()).await.unwrap();
    assert_eq!(second.completed, 0);

    write(fx.mirror.path(), "top.bin", &[9u8, 9]);
    let third = collect(download_pipeline(&fx.provider())).await;
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].local_file_name, fx.drop_dir.path().join("top.bin"));
    assert_eq!(fs::read(fx.drop_dir.path().join("top.bin")).unwrap(), [9u8, 9]);
}

#[tokio::test]
async fn concurrent_downloads_keep_listing_order() {
    let fx = Fixture::new();
    let mut expected = Vec::new();
    for i in 0..12 {
        let key = format!("file-{i:02}.dat");
        write(fx.mirror.path(), &key, key.repeat(i + 1).as_bytes());
        expected.push(fx.drop_dir.path().join(&key));
    }

    let downloaded = collect(download_pipeline(&fx.provider())).await;

    let paths: Vec<_> = downloaded.into_iter().map(|evt| evt.local_file_name).collect();
    assert_eq!(paths, expected);
}

#[tokio::test]
async fn filter_twice_without_downloads_is_stable() {
    let fx = Fixture::new();
    let a = write(fx.mirror.path(), "a", b"1");
    write(fx.mirror.path(), "b", b"2");
    let mut tags = TagStore::empty(fx.drop_dir.path().join(TAG_FILE_NAME));
    tags.record("a", content_tag(&a).unwrap());
    tags.save().await.unwrap();

    let provider = fx.provider();
    let first = collect(provider.filter_already_downloaded(provider.read_listing())).await;
    let second = collect(provider.filter_already_downloaded(provider.read_listing())).await;

    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].remote_item.key, "b");
    assert!(first[0].start_time.is_none());
}

#[tokio::test]
async fn one_provider_keeps_a_single_tag_store() {
    let fx = Fixture::new();
    write(fx.mirror.path(), "a.txt", b"alpha");
    write(fx.mirror.path(), "b.txt", b"bravo");
    let provider = fx.provider();

    assert_eq!(run_download(&provider).await.unwrap().completed, 2);
    // Tags recorded by this provider stay visible to its own filter even
    // when the file on disk goes away.
    fs::remove_file(fx.drop_dir.path().join(TAG_FILE_NAME)).unwrap();
    assert_eq!(run_download(&provider).await.unwrap().completed, 0);

    // A fresh provider starts from what is on disk.
    assert_eq!(run_download(&fx.provider()).await.unwrap().completed, 2);
}

#[tokio::test]
async fn uploaded_file_is_not_downloaded_again() {
    let fx = Fixture::new();
    let local = write(fx.drop_dir.path(), "docs/plan.md", b"v1");

    let provider = fx.provider();
    let named = provider.remote_file_namer(from_iter(vec![local.clone()]));
    assert_eq!(collect(provider.upload_items(named)).await.len(), 1);

    let tags = TagStore::load(fx.drop_dir.path().join(TAG_FILE_NAME)).await;
    assert_eq!(tags.get("docs/plan.md"), Some(content_tag(&local).unwrap().as_str()));
    assert_eq!(run_download(&fx.provider()).await.unwrap().completed, 0);

    write(fx.mirror.path(), "docs/plan.md", b"v2 from elsewhere");
    assert_eq!(run_download(&fx.provider()).await.unwrap().completed, 1);
    assert_eq!(fs::read(&local).unwrap(), b"v2 from elsewhere");
}

#[tokio::test]
async fn missing_mirror_yields_empty_listing() {
    let drop_dir = tempdir().unwrap();
    let provider = MirrorProvider::new(drop_dir.path(), drop_dir.path().join("no-such-mirror"));
    let report = run_download(&provider).await.unwrap();
    assert_eq!(report.completed, 0);
}

#[tokio::test]
async fn watch_on_missing_directory_is_setup_fatal() {
    let root = tempdir().unwrap();
    let provider = MirrorProvider::new(root.path().join("absent"), root.path());

    let err = run_upload(&provider).await.expect_err("watch must fail");

    let absent = root.path().join("absent");
    assert!(matches!(err, SyncError::WatchSetup { ref dir, .. } if dir == &absent));
}

#[tokio::test]
async fn namer_skips_paths_outside_the_drop_directory() {
    let fx = Fixture::new();
    let inside = fx.drop_dir.path().join("sub/inside.txt");
    let outside = fx.mirror.path().join("outside.txt");

    let provider = fx.provider();
    let paths = from_iter(vec![outside, inside.clone()]);
    let events = collect(provider.remote_file_namer(paths)).await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].local_file_name, inside);
    assert_eq!(events[0].remote_key, "sub/inside.txt");
}

#[tokio::test]
async fn upload_drops_vanished_file_and_keeps_going() {
    let fx = Fixture::new();
    let present = write(fx.drop_dir.path(), "here.txt", b"here");
    let gone = fx.drop_dir.path().join("gone.txt");

    let provider = fx.provider();
    let named = provider.remote_file_namer(from_iter(vec![gone, present]));
    let uploaded = collect(provider.upload_items(named)).await;

    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0].remote_key, "here.txt");
    assert_eq!(fs::read(fx.mirror.path().join("here.txt")).unwrap(), b"here");
}

#[tokio::test]
async fn watched_file_is_uploaded_to_mirror() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.drop_dir.path().join("notes")).unwrap();
    let provider = fx.provider();

    let pipeline = upload_pipeline(&provider).await.expect("watch established");
    let sink = tokio::spawn(drain(pipeline, Instant::now()));

    fs::write(fx.drop_dir.path().join("notes/today.txt"), b"remember the milk").unwrap();

    let target = fx.mirror.path().join("notes/today.txt");
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if fs::read(&target).ok().as_deref() == Some(b"remember the milk".as_slice()) {
            break;
        }
        assert!(Instant::now() < deadline, "upload did not reach the mirror");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    sink.abort();
}
