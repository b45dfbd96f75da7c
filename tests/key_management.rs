// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0


use staunch::schema::key::{Key, RsaScheme};
use staunch::schema::RoleType;
use staunch::sign::Sign;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use test_utils::{basic_descriptor, basic_signers, create_repo, delegated_descriptor,
    delegated_signers, keystore, signer, signers_map};

fn public_key(name: &str) -> Key {
    let pem = std::fs::read_to_string(keystore().join(format!("{}.pub", name))).unwrap();
    Key::from_rsa_pem(&pem, RsaScheme::RsassaPssSha256)
}

#[test]
fn adding_a_targets_key_cascades_through_targets() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &basic_descriptor(), &basic_signers());

    let new_key = public_key("targets2");
    let mut roles_keys = HashMap::new();
    roles_keys.insert("targets".to_string(), vec![new_key.clone()]);
    let roles_signers = signers_map(&[("targets", &["targets2"])]);

    let (added, already_added, invalid) =
        repo.add_metadata_keys(&roles_keys, &roles_signers).unwrap();
    assert_eq!(added["targets"], vec![new_key.clone()]);
    assert!(already_added.is_empty());
    assert!(invalid.is_empty());

    // root holds the descriptor, and targets is re-signed even though only its keys changed
    assert_eq!(repo.get_version("root").unwrap(), 2);
    assert_eq!(repo.get_version("targets").unwrap(), 2);
    assert_eq!(repo.get_version("snapshot").unwrap(), 2);
    assert_eq!(repo.get_version("timestamp").unwrap(), 2);

    let root = repo.open_root().unwrap().signed;
    let new_id = new_key.key_id().unwrap();
    assert!(root.roles[&RoleType::Targets].keyids.contains(&new_id));
    assert!(root.keys.contains_key(&new_id));

    // the re-signed targets file carries a signature from the new key
    let targets = repo.open_targets("targets").unwrap();
    assert!(targets.signatures.iter().any(|sig| sig.keyid == new_id));
}

#[test]
fn adding_an_existing_key_is_classified_not_errored() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &basic_descriptor(), &basic_signers());

    let existing = public_key("targets1");
    let mut roles_keys = HashMap::new();
    roles_keys.insert("targets".to_string(), vec![existing.clone()]);

    let (added, already_added, invalid) =
        repo.add_metadata_keys(&roles_keys, &HashMap::new()).unwrap();
    assert!(added.is_empty());
    assert_eq!(already_added["targets"], vec![existing]);
    assert!(invalid.is_empty());

    // no version bump anywhere
    for role in &["root", "targets", "snapshot", "timestamp"] {
        assert_eq!(repo.get_version(role).unwrap(), 1, "{}", role);
    }
}

#[test]
fn structurally_invalid_keys_are_classified() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &basic_descriptor(), &basic_signers());

    let bogus = Key::from_rsa_pem("not a pem document", RsaScheme::RsassaPssSha256);
    let mut roles_keys = HashMap::new();
    roles_keys.insert("targets".to_string(), vec![bogus.clone()]);

    let (added, already_added, invalid) =
        repo.add_metadata_keys(&roles_keys, &HashMap::new()).unwrap();
    assert!(added.is_empty());
    assert!(already_added.is_empty());
    assert_eq!(invalid["targets"], vec![bogus]);
    assert_eq!(repo.get_version("root").unwrap(), 1);
}

#[test]
fn adding_a_key_to_a_delegated_role_edits_the_parent() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &delegated_descriptor(), &delegated_signers());

    let new_key = public_key("delegated2");
    let mut roles_keys = HashMap::new();
    roles_keys.insert("delegated".to_string(), vec![new_key.clone()]);
    let roles_signers = signers_map(&[("delegated", &["delegated2"])]);

    let (added, _, _) = repo.add_metadata_keys(&roles_keys, &roles_signers).unwrap();
    assert_eq!(added["delegated"], vec![new_key.clone()]);

    // the parent, not the delegated role's own file, carries the new descriptor
    assert_eq!(repo.get_version("targets").unwrap(), 2);
    assert_eq!(repo.get_version("root").unwrap(), 1);
    let targets = repo.open_targets("targets").unwrap().signed;
    let delegations = targets.delegations.as_ref().unwrap();
    let new_id = new_key.key_id().unwrap();
    assert!(delegations.role("delegated").unwrap().keyids.contains(&new_id));
    assert!(delegations.keys.contains_key(&new_id));
}

#[test]
fn revocation_below_threshold_is_refused() {
    let dir = TempDir::new().unwrap();
    // three root keys, threshold two
    let descriptor = serde_json::from_value(serde_json::json!({
        "roles": {
            "root": { "number": 3, "threshold": 2 },
            "targets": {},
            "snapshot": {},
            "timestamp": {}
        }
    }))
    .unwrap();
    let signers = signers_map(&[
        ("root", &["root1", "root2", "root3"]),
        ("targets", &["targets1"]),
        ("snapshot", &["snapshot1"]),
        ("timestamp", &["timestamp1"]),
    ]);
    let mut repo = create_repo(dir.path(), &descriptor, &signers);

    let k1 = public_key("root1").key_id().unwrap();
    let k2 = public_key("root2").key_id().unwrap();

    let (removed, not_present, below_threshold) = repo
        .revoke_metadata_keys(
            &HashMap::new(),
            &["root".to_string()],
            &[k1.clone(), k2.clone()],
        )
        .unwrap();

    // the first revocation fits; the second would leave 1 < 2 keys and is refused
    assert_eq!(removed["root"], vec![k1.clone()]);
    assert_eq!(below_threshold["root"], vec![k2.clone()]);
    assert!(not_present.is_empty());

    let root = repo.open_root().unwrap().signed;
    assert_eq!(root.roles[&RoleType::Root].keyids.len(), 2);
    assert!(!root.roles[&RoleType::Root].keyids.contains(&k1));
    assert!(root.roles[&RoleType::Root].keyids.contains(&k2));
    assert_eq!(root.version, 2);
}

#[test]
fn revoking_an_unknown_key_is_classified() {
    let dir = TempDir::new().unwrap();
    let descriptor = serde_json::from_value(serde_json::json!({
        "roles": {
            "root": { "number": 2 },
            "targets": {},
            "snapshot": {},
            "timestamp": {}
        }
    }))
    .unwrap();
    let signers = signers_map(&[
        ("root", &["root1", "root2"]),
        ("targets", &["targets1"]),
        ("snapshot", &["snapshot1"]),
        ("timestamp", &["timestamp1"]),
    ]);
    let mut repo = create_repo(dir.path(), &descriptor, &signers);

    let unknown = public_key("new1").key_id().unwrap();
    let (removed, not_present, below_threshold) = repo
        .revoke_metadata_keys(&HashMap::new(), &["root".to_string()], &[unknown.clone()])
        .unwrap();
    assert!(removed.is_empty());
    assert_eq!(not_present["root"], vec![unknown]);
    assert!(below_threshold.is_empty());
    assert_eq!(repo.get_version("root").unwrap(), 1);
}

#[test]
fn revoked_key_is_dropped_from_the_key_dictionary() {
    let dir = TempDir::new().unwrap();
    let descriptor = serde_json::from_value(serde_json::json!({
        "roles": {
            "root": { "number": 2 },
            "targets": {},
            "snapshot": {},
            "timestamp": {}
        }
    }))
    .unwrap();
    let signers = signers_map(&[
        ("root", &["root1", "root2"]),
        ("targets", &["targets1"]),
        ("snapshot", &["snapshot1"]),
        ("timestamp", &["timestamp1"]),
    ]);
    let mut repo = create_repo(dir.path(), &descriptor, &signers);

    let k2 = public_key("root2").key_id().unwrap();
    let (removed, _, _) = repo
        .revoke_metadata_keys(&HashMap::new(), &["root".to_string()], &[k2.clone()])
        .unwrap();
    assert_eq!(removed["root"], vec![k2.clone()]);

    let root = repo.open_root().unwrap().signed;
    assert!(!root.roles[&RoleType::Root].keyids.contains(&k2));
    // no other role references root2's key, so it is gone from the dictionary
    assert!(!root.keys.contains_key(&k2));
    assert_eq!(repo.get_version("snapshot").unwrap(), 2);
    assert_eq!(repo.get_version("timestamp").unwrap(), 2);
}

#[test]
fn load_signers_rejects_keys_outside_the_role() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &basic_descriptor(), &basic_signers());

    let outsider: Vec<Arc<dyn Sign>> = vec![signer("new1")];
    assert!(matches!(
        repo.load_signers("targets", &outsider),
        Err(staunch::Error::InvalidKey { .. })
    ));

    let legitimate: Vec<Arc<dyn Sign>> = vec![signer("targets1")];
    repo.load_signers("targets", &legitimate).unwrap();
}
