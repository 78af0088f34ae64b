//! Integration tests for lockfile management and diffing
//!
//! Tests the JSON codec with realistic lockfiles and the laws the
//! install/uninstall diff must satisfy.

use smm::{diff, LockedMod, Lockfile, Version};
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use tempfile::TempDir;

fn locked(version: &str, dependencies: &[(&str, &str)]) -> LockedMod {
    LockedMod {
        version: Version::parse(version).unwrap(),
        dependencies: dependencies
            .iter()
            .map(|(id, c)| (id.to_string(), c.to_string()))
            .collect(),
    }
}

fn lockfile(entries: &[(&str, LockedMod)]) -> Lockfile {
    let mut lock = Lockfile::new();
    for (id, locked) in entries {
        lock.insert(id.to_string(), locked.clone());
    }
    lock
}

#[test]
fn test_parse_realistic_lockfile() {
    let json = r#"
{
  "AreaActions": {
    "version": "1.6.5",
    "dependencies": { "SML": ">=2.2.0" }
  },
  "SML": {
    "version": "2.2.1",
    "dependencies": { "SatisfactoryGame": ">=118964.0.0" }
  },
  "SatisfactoryGame": {
    "version": "118964.0.0"
  }
}
"#;

    let lock = Lockfile::from_str(json).unwrap();
    assert_eq!(lock.len(), 3);
    assert_eq!(
        lock.get("SML").unwrap().version,
        Version::parse("2.2.1").unwrap()
    );
    assert!(lock.get("SatisfactoryGame").unwrap().dependencies.is_empty());
}

#[test]
fn test_reserved_ids_are_ordinary_entries() {
    let mut lock = Lockfile::new();
    lock.insert("SML".to_string(), locked("2.0.0", &[]));
    lock.insert("SatisfactoryGame".to_string(), locked("109000.0.0", &[]));
    lock.insert("aMod".to_string(), locked("1.0.0", &[("SML", ">=2.0.0")]));

    let json = serde_json::to_string_pretty(&lock).unwrap();
    let parsed = Lockfile::from_str(&json).unwrap();

    assert_eq!(parsed, lock);
    assert_eq!(parsed.len(), 3);
}

#[test]
fn test_file_roundtrip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("smm-lock.json");

    let lock = lockfile(&[
        ("A", locked("1.0.0", &[])),
        ("B", locked("2.0.0", &[("A", "^1.0.0")])),
    ]);

    lock.to_file(&path).unwrap();
    let reloaded = Lockfile::from_file(&path).unwrap();

    assert_eq!(reloaded, lock);
}

#[test]
fn test_diff_of_identical_lockfiles_is_empty() {
    let lock = lockfile(&[
        ("A", locked("1.0.0", &[])),
        ("B", locked("2.0.0", &[])),
    ]);

    let d = diff(&lock, &lock);
    assert!(d.install.is_empty());
    assert!(d.uninstall.is_empty());
}

#[test]
fn test_diff_scenario() {
    let old = lockfile(&[
        ("A", locked("1.0.0", &[])),
        ("B", locked("1.0.0", &[])),
    ]);
    let new = lockfile(&[
        ("A", locked("1.0.0", &[])),
        ("B", locked("2.0.0", &[])),
        ("C", locked("1.0.0", &[])),
    ]);

    let d = diff(&old, &new);

    assert_eq!(d.uninstall, vec!["B".to_string()]);
    assert_eq!(
        d.install,
        BTreeMap::from([
            ("B".to_string(), Version::new(2, 0, 0)),
            ("C".to_string(), Version::new(1, 0, 0)),
        ])
    );
}

#[test]
fn test_diff_applied_to_key_set_yields_new_key_set() {
    let old = lockfile(&[
        ("A", locked("1.0.0", &[])),
        ("B", locked("1.0.0", &[])),
        ("C", locked("3.0.0", &[])),
    ]);
    let new = lockfile(&[
        ("B", locked("1.5.0", &[])),
        ("C", locked("3.0.0", &[])),
        ("D", locked("0.1.0", &[])),
    ]);

    let d = diff(&old, &new);

    // Process uninstall before install, as callers do.
    let mut keys: BTreeSet<String> = old.ids().cloned().collect();
    for id in &d.uninstall {
        keys.remove(id);
    }
    for id in d.install.keys() {
        keys.insert(id.clone());
    }

    let expected: BTreeSet<String> = new.ids().cloned().collect();
    assert_eq!(keys, expected);
}

#[test]
fn test_diff_pure_removal() {
    let old = lockfile(&[
        ("A", locked("1.0.0", &[])),
        ("B", locked("1.0.0", &[])),
    ]);
    let new = lockfile(&[("A", locked("1.0.0", &[]))]);

    let d = diff(&old, &new);
    assert_eq!(d.uninstall, vec!["B".to_string()]);
    assert!(d.install.is_empty());
}

#[test]
fn test_dependency_constraints_survive_roundtrip_verbatim() {
    let lock = lockfile(&[(
        "mod",
        locked("1.0.0", &[("SML", ">=2.0.0 <3.0.0"), ("other", "1.2.*")]),
    )]);

    let json = serde_json::to_string(&lock).unwrap();
    let parsed = Lockfile::from_str(&json).unwrap();

    let deps = &parsed.get("mod").unwrap().dependencies;
    assert_eq!(deps.get("SML"), Some(&">=2.0.0 <3.0.0".to_string()));
    assert_eq!(deps.get("other"), Some(&"1.2.*".to_string()));
}
