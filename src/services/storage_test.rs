use super::*;

#[test]
fn extension_for_known_image_types() {
    assert_eq!(extension_for("image/jpeg"), Some("jpg"));
    assert_eq!(extension_for("IMAGE/PNG"), Some("png"));
    assert_eq!(extension_for("image/webp; charset=binary"), Some("webp"));
    assert_eq!(extension_for("application/pdf"), None);
    assert_eq!(extension_for("text/html"), None);
    assert_eq!(extension_for(""), None);
}

#[test]
fn photo_key_is_scoped_to_uploader() {
    let uploader = Uuid::new_v4();
    let key = photo_key(uploader, "jpg");
    assert!(key.starts_with(&format!("{uploader}/")));
    assert!(key.ends_with(".jpg"));
    assert!(checked_relative(&key).is_ok());
    assert_ne!(key, photo_key(uploader, "jpg"));
}

#[test]
fn traversal_keys_are_rejected() {
    for key in ["../etc/passwd", "/abs/path.jpg", "a/../../b.jpg", "", "./a.jpg"] {
        assert!(matches!(checked_relative(key), Err(StorageError::InvalidKey(_))), "{key}");
    }
}

#[tokio::test]
async fn local_disk_put_writes_file_and_returns_url() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = LocalDiskStorage::new(dir.path(), "/media");

    let url = storage.put("worker/photo.jpg", b"jpeg-bytes").await.expect("put");
    assert_eq!(url, "/media/worker/photo.jpg");

    let written = std::fs::read(dir.path().join("worker/photo.jpg")).expect("read back");
    assert_eq!(written, b"jpeg-bytes");
}

#[tokio::test]
async fn local_disk_delete_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = LocalDiskStorage::new(dir.path(), "/media");

    storage.put("w/a.png", b"png").await.expect("put");
    storage.delete("w/a.png").await.expect("delete");
    assert!(!dir.path().join("w/a.png").exists());
    storage.delete("w/a.png").await.expect("delete missing");
}

#[tokio::test]
async fn local_disk_rejects_traversal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = LocalDiskStorage::new(dir.path(), "/media");
    assert!(matches!(storage.put("../escape.jpg", b"x").await, Err(StorageError::InvalidKey(_))));
}

#[tokio::test]
async fn memory_storage_keeps_bytes() {
    let storage = MemoryStorage::default();
    let url = storage.put("w/b.jpg", b"abc").await.expect("put");
    assert_eq!(url, "/media/w/b.jpg");
    assert_eq!(storage.objects.lock().unwrap().get("w/b.jpg").map(Vec::as_slice), Some(&b"abc"[..]));
}

#[tokio::test]
async fn removing_urls_deletes_the_backing_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = LocalDiskStorage::new(dir.path(), "/media");

    let kept = storage.put("w/kept.jpg", b"k").await.expect("put");
    let gone = storage.put("w/gone.jpg", b"g").await.expect("put");
    assert_eq!(storage.key_for_url(&gone).as_deref(), Some("w/gone.jpg"));
    assert_eq!(storage.key_for_url("/other/w/gone.jpg"), None);
    assert_eq!(storage.key_for_url("/media/../etc/passwd"), None);

    remove_urls(&storage, [gone.as_str(), "https://elsewhere/x.jpg"]).await;
    assert!(!dir.path().join("w/gone.jpg").exists());
    assert!(dir.path().join("w/kept.jpg").exists());
    assert_eq!(storage.key_for_url(&kept).as_deref(), Some("w/kept.jpg"));
}
