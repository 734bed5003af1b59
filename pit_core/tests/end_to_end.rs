use pit_core::{Category, Error, FsBackend, Hash, Repository, Store};
use std::fs;
use tempfile::TempDir;

const HELLO: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

#[test]
fn put_get_delete_by_prefix() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join(".pit");
    let store = Store::init(&root, FsBackend::new()).unwrap();

    let hash = store.put(b"hello").unwrap();
    assert_eq!(hash.to_hex(), HELLO);
    assert_eq!(
        fs::read(root.join("objects/aa/f4c61ddcc5e8a2dabede0f3b482cd9aea9434d")).unwrap(),
        b"hello"
    );

    assert_eq!(store.get("aaf4").unwrap(), b"hello");
    assert_eq!(store.get("AAF4").unwrap(), b"hello");

    assert_eq!(store.delete("aaf4").unwrap(), hash);
    assert!(!root.join("objects/aa").exists());
    assert!(store.get("aaf4").unwrap_err().is_not_found());
}

#[test]
fn ambiguous_prefix_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::init(temp_dir.path(), FsBackend::new()).unwrap();

    // "hello" and "blob-853" share the prefix "aa"
    store.put(b"hello").unwrap();
    store.put(b"blob-853").unwrap();

    assert!(matches!(
        store.get("aa"),
        Err(Error::Ambiguous { candidates: 2, .. })
    ));
    assert_eq!(store.get("aaf").unwrap(), b"hello");
    assert_eq!(store.get("aab").unwrap(), b"blob-853");

    // Deleting one leaves the shard for the other
    store.delete("aaf").unwrap();
    assert!(temp_dir.path().join("objects/aa").is_dir());
    assert_eq!(store.get("aa").unwrap(), b"blob-853");
}

#[test]
fn reopened_store_sees_objects_and_refs() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = Store::init(temp_dir.path(), FsBackend::new()).unwrap();
        let hash = store.put(b"world").unwrap();
        store.refs().put_ref(Category::Heads, "main", &hash).unwrap();
        store.refs().put_symbolic("HEAD", "heads/main").unwrap();
    }

    let store = Store::open(temp_dir.path(), FsBackend::new()).unwrap();
    let head = store.refs().resolve_hash("HEAD").unwrap();
    assert_eq!(head, Hash::digest("world"));
    assert_eq!(store.get(&head.to_hex()).unwrap(), b"world");
}

#[test]
fn record_working_tree() {
    let temp_dir = TempDir::new().unwrap();
    let work = temp_dir.path();
    let repo = Repository::init(work).unwrap();

    fs::write(work.join("hello"), "hello").unwrap();
    fs::create_dir(work.join("docs")).unwrap();
    fs::write(work.join("docs/readme"), "world").unwrap();

    let tree_hash = repo.record().unwrap();
    assert!(repo.status().unwrap().is_clean());

    let tree = repo.store().get_tree(&tree_hash.to_hex()).unwrap();
    assert_eq!(tree.get("hello").unwrap().hash.to_hex(), HELLO);

    let docs = repo
        .store()
        .get_tree(&tree.get("docs").unwrap().hash.to_hex())
        .unwrap();
    assert_eq!(docs.get("readme").unwrap().hash, Hash::digest("world"));

    fs::remove_file(work.join("hello")).unwrap();
    assert!(!repo.status().unwrap().is_clean());
}
