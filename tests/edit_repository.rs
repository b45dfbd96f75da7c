// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0


use maplit::btreemap;
use staunch::{Error, TargetContent, TargetUpdate};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tempfile::TempDir;
use test_utils::{basic_descriptor, basic_signers, create_repo, delegated_descriptor,
    delegated_signers, text_update};

#[test]
fn add_target_bumps_targets_snapshot_and_timestamp() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &basic_descriptor(), &basic_signers());

    let role = repo
        .modify_targets(
            &btreemap! { "a/b.txt".to_string() => text_update("hi") },
            &BTreeSet::new(),
        )
        .unwrap();
    assert_eq!(role, "targets");

    assert_eq!(repo.get_version("targets").unwrap(), 2);
    assert_eq!(repo.get_version("snapshot").unwrap(), 2);
    assert_eq!(repo.get_version("timestamp").unwrap(), 2);
    assert_eq!(repo.get_version("root").unwrap(), 1);

    let snapshot = repo.open_snapshot().unwrap().signed;
    assert_eq!(snapshot.meta["targets.json"].version, 2);
    let timestamp = repo.open_timestamp().unwrap().signed;
    assert_eq!(timestamp.meta["snapshot.json"].version, 2);

    // the file landed on disk, and its digests are recorded in the signed metadata
    assert_eq!(
        std::fs::read_to_string(repo.targets_path().join("a/b.txt")).unwrap(),
        "hi"
    );
    let targets = repo.open_targets("targets").unwrap().signed;
    let target = &targets.targets["a/b.txt"];
    assert_eq!(target.length, 2);
    assert_eq!(
        hex::encode(&target.hashes.sha256),
        "8f434346648f6b96df89dda901c5176b10a6d83961dd3c1ac88b59b2dc327aa4"
    );
}

#[test]
fn structured_content_is_written_as_pretty_json() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &basic_descriptor(), &basic_signers());

    let mut map = serde_json::Map::new();
    map.insert("commit".to_string(), serde_json::json!("abc123"));
    repo.modify_targets(
        &btreemap! {
            "repo.json".to_string() => TargetUpdate {
                content: Some(TargetContent::Structured(map.clone())),
                custom: None,
            }
        },
        &BTreeSet::new(),
    )
    .unwrap();

    let written = std::fs::read_to_string(repo.targets_path().join("repo.json")).unwrap();
    assert!(written.contains('\n'), "expected pretty-printed JSON");
    let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(parsed, serde_json::Value::Object(map));
}

#[test]
fn absent_content_touches_but_does_not_overwrite() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &basic_descriptor(), &basic_signers());

    // no content and no existing file: an empty file is created
    repo.modify_targets(
        &btreemap! { "empty.txt".to_string() => TargetUpdate::default() },
        &BTreeSet::new(),
    )
    .unwrap();
    assert_eq!(
        std::fs::read_to_string(repo.targets_path().join("empty.txt")).unwrap(),
        ""
    );

    // no content but the file exists: content is left alone, metadata is refreshed
    repo.modify_targets(
        &btreemap! { "kept.txt".to_string() => text_update("keep me") },
        &BTreeSet::new(),
    )
    .unwrap();
    repo.modify_targets(
        &btreemap! { "kept.txt".to_string() => TargetUpdate::default() },
        &BTreeSet::new(),
    )
    .unwrap();
    assert_eq!(
        std::fs::read_to_string(repo.targets_path().join("kept.txt")).unwrap(),
        "keep me"
    );
}

#[test]
fn custom_data_is_recorded_verbatim() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &basic_descriptor(), &basic_signers());

    let mut custom = HashMap::new();
    custom.insert("custom_attr1".to_string(), serde_json::json!("custom_val1"));
    repo.modify_targets(
        &btreemap! {
            "test1.txt".to_string() => TargetUpdate {
                content: Some(TargetContent::Text("test1".to_string())),
                custom: Some(custom.clone()),
            }
        },
        &BTreeSet::new(),
    )
    .unwrap();

    assert_eq!(repo.get_target_file_custom_data("test1.txt").unwrap(), custom);
}

#[test]
fn empty_modify_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &basic_descriptor(), &basic_signers());
    assert!(matches!(
        repo.modify_targets(&BTreeMap::new(), &BTreeSet::new()),
        Err(Error::NothingToModify)
    ));
    // nothing moved
    assert_eq!(repo.get_version("targets").unwrap(), 1);
}

#[test]
fn mixed_role_modify_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &delegated_descriptor(), &delegated_signers());

    let result = repo.modify_targets(
        &btreemap! {
            "dir1/p".to_string() => text_update(""),
            "dir2/p".to_string() => text_update(""),
        },
        &BTreeSet::new(),
    );
    assert!(matches!(result, Err(Error::MixedRoles { .. })));
    assert_eq!(repo.get_version("targets").unwrap(), 1);
    assert_eq!(repo.get_version("delegated").unwrap(), 1);
}

#[test]
fn delegated_dispatch_in_two_calls() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &delegated_descriptor(), &delegated_signers());

    let role = repo
        .modify_targets(
            &btreemap! { "dir1/p".to_string() => text_update("") },
            &BTreeSet::new(),
        )
        .unwrap();
    assert_eq!(role, "delegated");
    assert_eq!(repo.get_version("delegated").unwrap(), 2);
    assert_eq!(repo.get_version("targets").unwrap(), 1);
    assert_eq!(repo.get_version("snapshot").unwrap(), 2);

    let role = repo
        .modify_targets(
            &btreemap! { "dir2/p".to_string() => text_update("") },
            &BTreeSet::new(),
        )
        .unwrap();
    assert_eq!(role, "targets");
    assert_eq!(repo.get_version("targets").unwrap(), 2);
    assert_eq!(repo.get_version("snapshot").unwrap(), 3);
    assert_eq!(repo.get_version("timestamp").unwrap(), 3);

    let snapshot = repo.open_snapshot().unwrap().signed;
    assert_eq!(snapshot.meta["delegated.json"].version, 2);
    assert_eq!(snapshot.meta["targets.json"].version, 2);
}

#[test]
fn add_then_remove_restores_signed_state() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &basic_descriptor(), &basic_signers());

    repo.modify_targets(
        &btreemap! { "a/b.txt".to_string() => text_update("hi") },
        &BTreeSet::new(),
    )
    .unwrap();
    assert!(repo.targets_path().join("a/b.txt").is_file());

    let mut removed = BTreeSet::new();
    removed.insert("a/b.txt".to_string());
    repo.modify_targets(&BTreeMap::new(), &removed).unwrap();

    assert!(!repo.targets_path().join("a/b.txt").exists());
    let targets = repo.open_targets("targets").unwrap().signed;
    assert!(targets.targets.is_empty());
    // versions moved forward; content is back to the pre-state
    assert_eq!(repo.get_version("targets").unwrap(), 3);
}

#[test]
fn failed_edit_leaves_disk_untouched() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &basic_descriptor(), &basic_signers());

    let before = std::fs::read(repo.metadata_path().join("targets.json")).unwrap();
    let result = repo.edit_targets("targets", |_| Err(Error::NothingToModify));
    assert!(result.is_err());
    let after = std::fs::read(repo.metadata_path().join("targets.json")).unwrap();
    assert_eq!(before, after);
    assert_eq!(repo.get_version("targets").unwrap(), 1);
}

#[test]
fn edit_refreshes_expiry_unless_caller_set_one() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &basic_descriptor(), &basic_signers());
    let now = chrono::Utc::now();

    // mutator that does not touch expires: refreshed to the role default
    repo.edit_targets("targets", |_| Ok(())).unwrap();
    let days = (repo.get_expiration_date("targets").unwrap() - now).num_days();
    assert!((85..=90).contains(&days), "targets: {}", days);

    // mutator that sets a specific expiry: kept
    let explicit = now + chrono::Duration::days(10);
    repo.edit_targets("targets", |targets| {
        targets.expires = explicit;
        Ok(())
    })
    .unwrap();
    assert_eq!(repo.get_expiration_date("targets").unwrap(), explicit);
}

#[test]
fn target_files_state_reports_drift() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &basic_descriptor(), &basic_signers());

    repo.modify_targets(
        &btreemap! {
            "signed.txt".to_string() => text_update("signed"),
            "doomed.txt".to_string() => text_update("doomed"),
        },
        &BTreeSet::new(),
    )
    .unwrap();

    // drift: a new unsigned file, a modified file, and a deleted file
    std::fs::write(repo.targets_path().join("stray.txt"), "stray").unwrap();
    std::fs::write(repo.targets_path().join("signed.txt"), "changed").unwrap();
    std::fs::remove_file(repo.targets_path().join("doomed.txt")).unwrap();

    let (added, removed) = repo.all_target_files_state().unwrap();
    assert_eq!(
        added.keys().cloned().collect::<Vec<_>>(),
        vec!["signed.txt".to_string(), "stray.txt".to_string()]
    );
    assert_eq!(
        added["signed.txt"].content,
        Some(TargetContent::Text("changed".to_string()))
    );
    assert_eq!(
        removed.into_iter().collect::<Vec<_>>(),
        vec!["doomed.txt".to_string()]
    );
}

#[test]
fn unregistered_target_files_are_pruned() {
    let dir = TempDir::new().unwrap();
    let mut repo = create_repo(dir.path(), &basic_descriptor(), &basic_signers());

    repo.modify_targets(
        &btreemap! { "signed.txt".to_string() => text_update("signed") },
        &BTreeSet::new(),
    )
    .unwrap();
    std::fs::write(repo.targets_path().join("stray.txt"), "stray").unwrap();

    repo.delete_unregistered_target_files(None).unwrap();
    assert!(repo.targets_path().join("signed.txt").is_file());
    assert!(!repo.targets_path().join("stray.txt").exists());
}
