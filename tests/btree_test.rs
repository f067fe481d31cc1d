//! Integration tests for the B-tree engine.
//!
//! These drive whole insert/delete workloads through the public API and
//! check the resulting structure.

use std::sync::Once;

use pagetree::storage::{MemoryNodeStore, NodeStore};
use pagetree::{BTree, Error, TreeConfig};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagetree=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_ansi(false)
            .try_init();
    });
}

fn create_tree(min_degree: usize, cache_capacity: usize) -> (BTree<i64, MemoryNodeStore>, MemoryNodeStore) {
    init_tracing();
    let store = MemoryNodeStore::new();
    let config = TreeConfig::default()
        .with_min_degree(min_degree)
        .with_cache_capacity(cache_capacity);
    (BTree::open(store.clone(), config).unwrap(), store)
}

/// The classic worked example: eight keys with t = 2.
#[test]
fn test_small_tree_shape() {
    let (mut tree, _store) = create_tree(2, 16);

    let mut roots = Vec::new();
    for k in [10, 20, 5, 6, 12, 30, 7, 17] {
        assert!(tree.insert(k).unwrap());
        let root = tree.root_id().unwrap();
        if roots.last() != Some(&root) {
            roots.push(root);
        }
    }

    // One root for the first leaf, one more after the single root split
    assert_eq!(roots.len(), 2);
    assert_eq!(tree.height().unwrap(), 2);
    assert_eq!(tree.keys().unwrap(), vec![5, 6, 7, 10, 12, 17, 20, 30]);
    assert_eq!(
        tree.levels().unwrap(),
        vec![vec![vec![10, 20]], vec![vec![5, 6, 7], vec![12, 17], vec![30]]]
    );
    tree.check_invariants().unwrap();
}

#[test]
fn test_delete_descending_until_empty() {
    let (mut tree, store) = create_tree(2, 8);
    for k in 1..=20 {
        tree.insert(k).unwrap();
    }
    tree.check_invariants().unwrap();

    for k in (1..=20).rev() {
        assert!(tree.delete(&k).unwrap(), "key {} should be present", k);
        tree.check_invariants().unwrap();
        assert_eq!(tree.keys().unwrap(), (1..k).collect::<Vec<_>>());
    }

    assert!(tree.is_empty());
    assert_eq!(tree.root_id(), None);
    assert_eq!(store.get_root().unwrap(), None);

    tree.flush().unwrap();
    assert!(store.is_empty());
}

#[test]
fn test_delete_ascending_with_larger_degree() {
    let (mut tree, _store) = create_tree(3, 8);
    for k in 1..=200 {
        tree.insert(k).unwrap();
    }
    assert!(tree.height().unwrap() >= 3);

    for k in 1..=150 {
        assert!(tree.delete(&k).unwrap());
    }
    tree.check_invariants().unwrap();
    assert_eq!(tree.keys().unwrap(), (151..=200).collect::<Vec<_>>());
}

#[test]
fn test_delete_absent_key_is_idempotent() {
    let (mut tree, store) = create_tree(2, 16);
    for k in (0..40).step_by(2) {
        tree.insert(k).unwrap();
    }
    tree.flush().unwrap();
    let before = tree.keys().unwrap();
    let writes = store.write_count();

    assert!(!tree.delete(&7).unwrap());
    assert!(!tree.delete(&-1).unwrap());
    assert!(!tree.delete(&1000).unwrap());

    tree.flush().unwrap();
    assert_eq!(tree.keys().unwrap(), before);
    assert_eq!(store.write_count(), writes);
}

#[test]
fn test_duplicates_rejected() {
    let (mut tree, _store) = create_tree(2, 16);
    for k in [3, 1, 2] {
        assert!(tree.insert(k).unwrap());
    }
    for k in [3, 1, 2] {
        assert!(!tree.insert(k).unwrap());
    }
    assert_eq!(tree.len().unwrap(), 3);
}

#[test]
fn test_reinsert_after_empty() {
    let (mut tree, store) = create_tree(2, 16);
    tree.insert(1).unwrap();
    tree.delete(&1).unwrap();
    assert_eq!(store.get_root().unwrap(), None);

    tree.insert(2).unwrap();
    assert_eq!(tree.keys().unwrap(), vec![2]);
    assert_eq!(store.get_root().unwrap(), tree.root_id());
}

#[test]
fn test_update_moves_key() {
    let (mut tree, _store) = create_tree(2, 16);
    for k in 1..=10 {
        tree.insert(k).unwrap();
    }

    assert!(tree.update(&4, 40).unwrap());
    assert!(!tree.contains(&4).unwrap());
    assert!(tree.contains(&40).unwrap());
    tree.check_invariants().unwrap();
}

/// A failure between the two halves of `update` leaves the old key gone.
#[test]
fn test_update_is_not_atomic() {
    let (mut tree, store) = create_tree(2, 16);
    for k in [1, 2, 3, 4, 5, 6, 7, 0] {
        tree.insert(k).unwrap();
    }
    assert_eq!(
        tree.levels().unwrap(),
        vec![vec![vec![2, 4]], vec![vec![0, 1], vec![3], vec![5, 6, 7]]]
    );

    // Removing 0 only rewrites a cached leaf. Inserting 8 has to split the
    // full right leaf, which needs a node id the store refuses to hand out.
    store.set_read_only(true);
    assert!(matches!(tree.update(&0, 8), Err(Error::Io(_))));
    store.set_read_only(false);

    assert_eq!(tree.keys().unwrap(), (1..=7).collect::<Vec<_>>());
    tree.check_invariants().unwrap();
}

#[test]
fn test_mixed_workload_small_cache() {
    let (mut tree, _store) = create_tree(2, 3);
    let mut expected = std::collections::BTreeSet::new();

    for i in 0..500i64 {
        let k = (i * 7919) % 211;
        if i % 3 == 2 {
            assert_eq!(tree.delete(&k).unwrap(), expected.remove(&k));
        } else {
            assert_eq!(tree.insert(k).unwrap(), expected.insert(k));
        }
    }

    tree.check_invariants().unwrap();
    assert_eq!(tree.keys().unwrap(), expected.into_iter().collect::<Vec<_>>());
    assert!(tree.cache_stats().evictions > 0);
}

#[test]
fn test_string_keys() {
    let store = MemoryNodeStore::new();
    let config = TreeConfig::default().with_min_degree(2);
    let mut tree = BTree::<String, _>::open(store, config).unwrap();

    for word in ["pear", "apple", "fig", "kiwi", "banana", "cherry"] {
        tree.insert(word.to_string()).unwrap();
    }
    tree.delete(&"fig".to_string()).unwrap();

    assert_eq!(
        tree.keys().unwrap(),
        vec!["apple", "banana", "cherry", "kiwi", "pear"]
    );
}

#[test]
fn test_invalid_config() {
    let store = MemoryNodeStore::new();
    let degree = TreeConfig::default().with_min_degree(1);
    assert!(matches!(
        BTree::<i64, _>::open(store.clone(), degree),
        Err(Error::InvalidConfig(_))
    ));

    let cache = TreeConfig::default().with_cache_capacity(0);
    assert!(matches!(
        BTree::<i64, _>::open(store, cache),
        Err(Error::InvalidConfig(_))
    ));
}
