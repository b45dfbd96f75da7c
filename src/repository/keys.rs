// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key management: adding public keys to role descriptors and revoking them, with threshold
//! safety. Canonical roles are edited through root; delegated roles through their delegating
//! parent.

use crate::error::Result;
use crate::repository::{is_delegated_role, MetadataRepository};
use crate::schema::decoded::{Decoded, Hex};
use crate::schema::key::{pkcs1_from_spki_pem, Key};
use crate::sign::Sign;
use log::info;
use snafu::OptionExt;
use std::collections::HashMap;
use std::sync::Arc;

/// Keys classified by a key addition, keyed by role name.
pub type KeyReport = HashMap<String, Vec<Key>>;

/// Key IDs classified by a key revocation, keyed by role name.
pub type KeyIdReport = HashMap<String, Vec<Decoded<Hex>>>;

impl MetadataRepository {
    /// Adds public keys to role descriptors and registers the matching signers.
    ///
    /// Keys for canonical roles land in root under a single root edit; keys for delegated
    /// roles land in each delegating parent (descriptor and delegations key dictionary) under
    /// one edit per parent. When `targets` gained a key without being edited itself, it is
    /// re-signed under an empty edit so clients see it signed by the new key set. Snapshot and
    /// timestamp are cascaded when anything changed.
    ///
    /// Returns `(added, already_added, invalid)` keys per role. A key already present in a
    /// role's descriptor is classified, not an error; so is a structurally invalid key record.
    pub fn add_metadata_keys(
        &mut self,
        roles_keys: &HashMap<String, Vec<Key>>,
        roles_signers: &HashMap<String, Vec<Arc<dyn Sign>>>,
    ) -> Result<(KeyReport, KeyReport, KeyReport)> {
        let mut added: KeyReport = HashMap::new();
        let mut already_added: KeyReport = HashMap::new();
        let mut invalid: KeyReport = HashMap::new();

        // partition each candidate key: already listed, structurally invalid, or to add
        let mut to_add_root: HashMap<String, Vec<Key>> = HashMap::new();
        let mut to_add_delegated: HashMap<String, Vec<Key>> = HashMap::new();
        for (role, keys) in roles_keys {
            for key in keys {
                if pkcs1_from_spki_pem(key.public_pem()).is_err() {
                    invalid.entry(role.clone()).or_default().push(key.clone());
                    continue;
                }
                match self.is_valid_metadata_key(role, key) {
                    Ok(true) => {
                        already_added
                            .entry(role.clone())
                            .or_default()
                            .push(key.clone());
                    }
                    Ok(false) => {
                        let bucket = if is_delegated_role(role) {
                            &mut to_add_delegated
                        } else {
                            &mut to_add_root
                        };
                        bucket.entry(role.clone()).or_default().push(key.clone());
                    }
                    Err(_) => {
                        invalid.entry(role.clone()).or_default().push(key.clone());
                    }
                }
            }
        }

        if !to_add_root.is_empty() {
            let pending = to_add_root.clone();
            self.edit_root(|root| {
                for (role, keys) in &pending {
                    let role_type = role
                        .parse()
                        .map_err(|_| crate::error::RoleNotFoundSnafu { name: role }.build())?;
                    for key in keys {
                        root.add_key(key.clone(), role_type)?;
                    }
                }
                Ok(())
            })?;
            for (role, keys) in to_add_root {
                added.entry(role).or_default().extend(keys);
            }
        }

        // group delegated roles by their delegating parent, one edit per parent
        let mut roles_by_parents: HashMap<String, Vec<String>> = HashMap::new();
        for role in to_add_delegated.keys() {
            let parent = self
                .find_delegated_roles_parent(role)?
                .context(crate::error::RoleNotFoundSnafu { name: role })?;
            roles_by_parents
                .entry(parent)
                .or_default()
                .push(role.clone());
        }
        for (parent, roles) in &roles_by_parents {
            let pending: Vec<(String, Vec<Key>)> = roles
                .iter()
                .map(|role| (role.clone(), to_add_delegated[role].clone()))
                .collect();
            self.edit_targets(parent, |targets| {
                for (role, keys) in &pending {
                    for key in keys {
                        targets.add_key(key.clone(), role)?;
                    }
                }
                Ok(())
            })?;
            for (role, keys) in pending {
                added.entry(role).or_default().extend(keys);
            }
        }

        if !added.is_empty() {
            for (role, signers) in roles_signers {
                for signer in signers {
                    self.add_signer(role, Arc::clone(signer))?;
                }
            }

            // targets' keys live on root; re-sign targets so clients see the new key set
            if added.contains_key("targets") && !roles_by_parents.contains_key("targets") {
                self.edit_targets("targets", |_| Ok(()))?;
            }

            self.do_snapshot()?;
            self.do_timestamp()?;
            info!(
                "added keys to roles: {}",
                added.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        }

        Ok((added, already_added, invalid))
    }

    /// Removes key IDs from role descriptors, refusing any removal that would leave a role
    /// with fewer keys than its threshold.
    ///
    /// Each `(role, key)` pair is classified: `below_threshold` when removing it would break
    /// the role's threshold (taking earlier removals in the same call into account),
    /// `not_present` when the role does not list the key, and `removed` otherwise. Refusals
    /// are classifications, not errors, and cause no version bump on their own.
    pub fn revoke_metadata_keys(
        &mut self,
        roles_signers: &HashMap<String, Vec<Arc<dyn Sign>>>,
        roles: &[String],
        key_ids: &[Decoded<Hex>],
    ) -> Result<(KeyIdReport, KeyIdReport, KeyIdReport)> {
        let mut removed: KeyIdReport = HashMap::new();
        let mut not_present: KeyIdReport = HashMap::new();
        let mut below_threshold: KeyIdReport = HashMap::new();

        let mut to_remove_root: HashMap<String, Vec<Decoded<Hex>>> = HashMap::new();
        let mut to_remove_delegated: HashMap<String, Vec<Decoded<Hex>>> = HashMap::new();
        for role in roles {
            let role_keys = self.role_keys(role)?;
            let mut remaining = role_keys.keyids.len() as u64;
            for key_id in key_ids {
                if remaining.saturating_sub(1) < role_keys.threshold.get() {
                    below_threshold
                        .entry(role.clone())
                        .or_default()
                        .push(key_id.clone());
                    continue;
                }
                if !role_keys.keyids.contains(key_id) {
                    not_present
                        .entry(role.clone())
                        .or_default()
                        .push(key_id.clone());
                    continue;
                }
                remaining -= 1;
                let bucket = if is_delegated_role(role) {
                    &mut to_remove_delegated
                } else {
                    &mut to_remove_root
                };
                bucket.entry(role.clone()).or_default().push(key_id.clone());
            }
        }

        if !to_remove_root.is_empty() {
            let pending = to_remove_root.clone();
            self.edit_root(|root| {
                for (role, key_ids) in &pending {
                    let role_type = role
                        .parse()
                        .map_err(|_| crate::error::RoleNotFoundSnafu { name: role }.build())?;
                    for key_id in key_ids {
                        root.revoke_key(key_id, role_type);
                    }
                }
                Ok(())
            })?;
            for (role, key_ids) in to_remove_root {
                removed.entry(role).or_default().extend(key_ids);
            }
        }

        let mut roles_by_parents: HashMap<String, Vec<String>> = HashMap::new();
        for role in to_remove_delegated.keys() {
            let parent = self
                .find_delegated_roles_parent(role)?
                .context(crate::error::RoleNotFoundSnafu { name: role })?;
            roles_by_parents
                .entry(parent)
                .or_default()
                .push(role.clone());
        }
        for (parent, parent_roles) in &roles_by_parents {
            let pending: Vec<(String, Vec<Decoded<Hex>>)> = parent_roles
                .iter()
                .map(|role| (role.clone(), to_remove_delegated[role].clone()))
                .collect();
            self.edit_targets(parent, |targets| {
                for (role, key_ids) in &pending {
                    for key_id in key_ids {
                        targets.revoke_key(key_id, role);
                    }
                }
                Ok(())
            })?;
            for (role, key_ids) in pending {
                removed.entry(role).or_default().extend(key_ids);
            }
        }

        if !removed.is_empty() {
            for (role, signers) in roles_signers {
                for signer in signers {
                    self.add_signer(role, Arc::clone(signer))?;
                }
            }

            if removed.contains_key("targets") && !roles_by_parents.contains_key("targets") {
                self.edit_targets("targets", |_| Ok(()))?;
            }

            self.do_snapshot()?;
            self.do_timestamp()?;
            info!(
                "revoked keys from roles: {}",
                removed.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        }

        Ok((removed, not_present, below_threshold))
    }
}
