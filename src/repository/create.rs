// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bootstrapping a fresh repository from a declarative roles-and-keys descriptor.

use crate::descriptor::RolesKeysData;
use crate::error::{self, Result};
use crate::repository::{expiration_interval, role_filename, MetadataRepository};
use crate::schema::decoded::{Decoded, Hex};
use crate::schema::key::Key;
use crate::schema::{
    DelegatedRole, Delegations, Role, RoleKeys, RoleType, Root, Signed, Snapshot, SnapshotMeta,
    Targets, Timestamp, TimestampMeta,
};
use crate::sign::Sign;
use chrono::{Duration, Utc};
use log::info;
use snafu::{ensure, OptionExt};
use std::collections::HashMap;
use std::sync::Arc;

impl MetadataRepository {
    /// Creates a new metadata repository on disk.
    ///
    /// Builds initial root, targets (with the descriptor's delegated subtree), snapshot, and
    /// timestamp bodies, registers the given signers, and writes every role through the
    /// common close routine: each role starts at version 0 and lands on disk at version 1,
    /// signed by its full signer set, with its default expiry.
    ///
    /// `additional_verification_keys` lists public keys that belong to a role but whose
    /// private halves are not available at creation time (for example keys of maintainers who
    /// are absent); they are registered in the descriptors without a matching signer.
    ///
    /// Fails if the metadata directory already exists.
    pub fn create(
        &mut self,
        roles_keys_data: &RolesKeysData,
        signers: &HashMap<String, Vec<Arc<dyn Sign>>>,
        additional_verification_keys: Option<&HashMap<String, Vec<Key>>>,
    ) -> Result<()> {
        let metadata_dir = self.store.metadata_dir();
        ensure!(
            !metadata_dir.exists(),
            error::RepositoryExistsSnafu { path: metadata_dir }
        );
        self.signer_cache.clear();

        // the verification keys of each role: the signers' public keys plus any
        // additional public-only keys, deduplicated by key ID
        let mut public_keys: HashMap<String, Vec<(Decoded<Hex>, Key)>> = HashMap::new();
        for (role, role_signers) in signers {
            let keys = public_keys.entry(role.clone()).or_default();
            for signer in role_signers {
                let key_id = signer.key_id()?;
                if !keys.iter().any(|(id, _)| id == &key_id) {
                    keys.push((key_id, signer.public_key().clone()));
                }
            }
        }
        if let Some(additional) = additional_verification_keys {
            for (role, role_keys) in additional {
                let keys = public_keys.entry(role.clone()).or_default();
                for key in role_keys {
                    let key_id = key.key_id()?;
                    if !keys.iter().any(|(id, _)| id == &key_id) {
                        keys.push((key_id, key.clone()));
                    }
                }
            }
        }

        let now = Utc::now();
        let mut descriptors: HashMap<String, RoleKeys> = HashMap::new();

        // root lists the keys and thresholds of the four canonical roles
        let mut root = Root::new(0, now);
        for (role_name, setup) in roles_keys_data.roles.main_roles() {
            let role_type: RoleType = role_name
                .parse()
                .map_err(|_| error::RoleNotFoundSnafu { name: role_name }.build())?;
            let role_public_keys = public_keys
                .get(role_name)
                .filter(|keys| !keys.is_empty())
                .context(error::RoleKeysNotSpecifiedSnafu { role: role_name })?;
            for signer in signers.get(role_name).map(|s| s.as_slice()).unwrap_or(&[]) {
                self.add_signer(role_name, Arc::clone(signer))?;
            }
            for (_, key) in role_public_keys {
                root.add_key(key.clone(), role_type)?;
            }
            let role_keys = root
                .roles
                .get_mut(&role_type)
                .context(error::RoleNotInRootSnafu { role: role_name })?;
            role_keys.threshold = setup.threshold;
            descriptors.insert(role_name.to_string(), role_keys.clone());
        }

        // targets and the delegated subtree, parents before children
        let mut target_roles: Vec<(String, Targets)> =
            vec![("targets".to_string(), Targets::new(0, now))];
        for (parent, delegation) in roles_keys_data.roles.walk_delegations() {
            let role_public_keys = public_keys
                .get(&delegation.name)
                .filter(|keys| !keys.is_empty())
                .context(error::RoleKeysNotSpecifiedSnafu {
                    role: &delegation.name,
                })?
                .clone();
            for signer in signers
                .get(&delegation.name)
                .map(|s| s.as_slice())
                .unwrap_or(&[])
            {
                self.add_signer(&delegation.name, Arc::clone(signer))?;
            }
            let delegated_role = DelegatedRole {
                name: delegation.name.clone(),
                keyids: role_public_keys.iter().map(|(id, _)| id.clone()).collect(),
                threshold: delegation.setup.threshold,
                paths: delegation.paths.clone(),
                terminating: delegation.terminating,
                _extra: HashMap::new(),
            };
            descriptors.insert(delegation.name.clone(), delegated_role.keys());
            let parent_targets = target_roles
                .iter_mut()
                .find(|(name, _)| name == &parent)
                .map(|(_, targets)| targets)
                .context(error::RoleNotFoundSnafu { name: &parent })?;
            let delegations = parent_targets
                .delegations
                .get_or_insert_with(Delegations::new);
            delegations.keys.extend(role_public_keys);
            delegations.roles.push(delegated_role);
            target_roles.push((delegation.name.clone(), Targets::new(0, now)));
        }

        // snapshot tracks root and every targets-family role, all at version 1
        let mut snapshot = Snapshot::new(0, now);
        snapshot
            .meta
            .insert("root.json".to_string(), SnapshotMeta::default());
        for (name, _) in &target_roles {
            snapshot
                .meta
                .insert(role_filename(name), SnapshotMeta::default());
        }

        // timestamp tracks snapshot at version 1
        let mut timestamp = Timestamp::new(0, now);
        timestamp
            .meta
            .insert("snapshot.json".to_string(), TimestampMeta::default());

        // write every role through the common close routine so creation and editing share
        // the same bump-sign-write semantics
        root.set_expires(now + Duration::days(expiration_interval("root")));
        let root_keys = descriptors
            .get("root")
            .context(error::RoleNotInRootSnafu { role: "root" })?
            .clone();
        let mut signed_root = Signed {
            signed: root,
            signatures: Vec::new(),
        };
        self.close("root", &mut signed_root, &root_keys)?;

        timestamp.set_expires(now + Duration::days(expiration_interval("timestamp")));
        let timestamp_keys = descriptors
            .get("timestamp")
            .context(error::RoleNotInRootSnafu { role: "timestamp" })?
            .clone();
        let mut signed_timestamp = Signed {
            signed: timestamp,
            signatures: Vec::new(),
        };
        self.close("timestamp", &mut signed_timestamp, &timestamp_keys)?;

        snapshot.set_expires(now + Duration::days(expiration_interval("snapshot")));
        let snapshot_keys = descriptors
            .get("snapshot")
            .context(error::RoleNotInRootSnafu { role: "snapshot" })?
            .clone();
        let mut signed_snapshot = Signed {
            signed: snapshot,
            signatures: Vec::new(),
        };
        self.close("snapshot", &mut signed_snapshot, &snapshot_keys)?;

        for (name, mut targets) in target_roles {
            targets.set_expires(now + Duration::days(expiration_interval(&name)));
            let role_keys = descriptors
                .get(&name)
                .context(error::RoleNotFoundSnafu { name: &name })?
                .clone();
            let mut signed_targets = Signed {
                signed: targets,
                signatures: Vec::new(),
            };
            self.close(&name, &mut signed_targets, &role_keys)?;
        }

        info!("created repository at '{}'", self.path().display());
        Ok(())
    }

    /// Rebuilds a roles-and-keys descriptor from the on-disk metadata: key counts,
    /// thresholds, schemes, and the delegated subtree with its paths. Key lengths are not
    /// re-derived from the key material; the descriptor default is reported.
    pub fn generate_roles_description(&self) -> Result<RolesKeysData> {
        use crate::descriptor::{
            DelegatedRoleSetup, RoleSetup, RolesDescriptor, TargetsRoleSetup,
        };

        fn setup_from(role_keys: &RoleKeys, keys: &HashMap<Decoded<Hex>, Key>) -> RoleSetup {
            RoleSetup {
                number: role_keys.keyids.len() as u32,
                threshold: role_keys.threshold,
                scheme: role_keys
                    .keyids
                    .first()
                    .and_then(|keyid| keys.get(keyid))
                    .map(Key::scheme)
                    .unwrap_or_default(),
                ..RoleSetup::default()
            }
        }

        fn delegations_of(
            repo: &MetadataRepository,
            role: &str,
        ) -> Result<Vec<DelegatedRoleSetup>> {
            let md = repo.open_targets(role)?;
            let delegations = match &md.signed.delegations {
                Some(delegations) => delegations,
                None => return Ok(Vec::new()),
            };
            let mut setups = Vec::new();
            for delegated in &delegations.roles {
                setups.push(DelegatedRoleSetup {
                    name: delegated.name.clone(),
                    setup: setup_from(&delegated.keys(), &delegations.keys),
                    paths: delegated.paths.clone(),
                    terminating: delegated.terminating,
                    delegations: delegations_of(repo, &delegated.name)?,
                });
            }
            Ok(setups)
        }

        let root = self.open_root()?.signed;
        let descriptor_for = |role_type: RoleType, role: &str| -> Result<RoleSetup> {
            let role_keys = root
                .roles
                .get(&role_type)
                .context(error::RoleNotInRootSnafu { role })?;
            Ok(setup_from(role_keys, &root.keys))
        };

        Ok(RolesKeysData {
            roles: RolesDescriptor {
                root: descriptor_for(RoleType::Root, "root")?,
                targets: TargetsRoleSetup {
                    setup: descriptor_for(RoleType::Targets, "targets")?,
                    delegations: delegations_of(self, "targets")?,
                },
                snapshot: descriptor_for(RoleType::Snapshot, "snapshot")?,
                timestamp: descriptor_for(RoleType::Timestamp, "timestamp")?,
                _extra: HashMap::new(),
            },
            _extra: HashMap::new(),
        })
    }
}
