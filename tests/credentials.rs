#[path = "common/mod.rs"]
mod common;

use cetl::{load_credentials, mask_credential, CredentialPool, PoolError};
use common::*;
use std::collections::HashMap;

/// Rotation wraps around after the last key.
#[test]
fn round_robin_wraps() {
    let pool = CredentialPool::new(ids(&["a", "b", "c"]), ScriptedConnector::new()).unwrap();
    let seen: Vec<&str> = (0..7).map(|_| pool.next_credential()).collect();
    assert_eq!(seen, vec!["a", "b", "c", "a", "b", "c", "a"]);
}

#[test]
fn empty_pool_is_an_error() {
    let err = CredentialPool::new(Vec::new(), ScriptedConnector::new()).err();
    assert!(matches!(err, Some(PoolError::Empty)));
}

/// Concurrent callers each claim their own slot: 4 keys over 16 calls hand
/// out every key exactly 4 times.
#[test]
fn concurrent_selection_is_balanced() {
    let pool = CredentialPool::new(ids(&["k0", "k1", "k2", "k3"]), ScriptedConnector::new()).unwrap();
    let picked: Vec<String> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..16).map(|_| s.spawn(|| pool.next_credential().to_string())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    let mut counts: HashMap<String, usize> = HashMap::new();
    for k in picked {
        *counts.entry(k).or_default() += 1;
    }
    assert_eq!(counts.len(), 4);
    assert!(counts.values().all(|&n| n == 4), "{:?}", counts);
}

/// `next_client` connects with the claimed key.
#[test]
fn next_client_uses_rotation() {
    let conn = ScriptedConnector::new();
    let pool = CredentialPool::new(ids(&["k1", "k2"]), conn.clone()).unwrap();
    for _ in 0..3 {
        pool.next_client().unwrap();
    }
    assert_eq!(conn.connects(), vec!["k1", "k2", "k1"]);
}

/// Blank lines are ignored; a file without keys or no file at all is fatal.
#[test]
fn load_key_file() {
    let (_tmp, base) = temp_base();
    let path = base.join("api_keys").join("api_keys.txt");
    write_lines(&path, &["  key-one ", "", "key-two"]);
    assert_eq!(load_credentials(&path).unwrap(), vec!["key-one", "key-two"]);

    let blank = base.join("blank.txt");
    write_lines(&blank, &["", "  "]);
    assert!(load_credentials(&blank).is_err());
    assert!(load_credentials(&base.join("missing.txt")).is_err());
}

#[test]
fn masked_keys_show_only_the_head() {
    assert_eq!(mask_credential("AIzaSyABCDEFGHIJKLMNOP"), "AIzaSyABCDEF******");
}
