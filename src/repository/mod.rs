// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provides the `MetadataRepository` object: the on-disk role metadata store together with the
//! signer cache, the edit transaction, the snapshot/timestamp cascade, and the expiration
//! service. Target-file, key-management, creation, and delegation-resolution operations live
//! in the sibling modules of this one.

mod create;
mod keys;
mod resolve;
mod targets;

pub use crate::repository::keys::{KeyIdReport, KeyReport};
pub use crate::repository::targets::{TargetContent, TargetUpdate};

use crate::error::{self, Result};
use crate::schema::decoded::{Decoded, Hex};
use crate::schema::key::Key;
use crate::schema::{
    Role, RoleKeys, RoleType, Root, Signature, Signed, Snapshot, Targets, Timestamp,
};
use crate::sign::Sign;
use crate::store::MetadataStore;
use chrono::{DateTime, Duration, Utc};
use log::debug;
use snafu::{ensure, OptionExt};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The names of the four canonical roles. Any other role name is a delegated targets role.
pub const MAIN_ROLES: [&str; 4] = ["root", "targets", "snapshot", "timestamp"];

/// Whether a role name refers to a delegated targets role.
pub fn is_delegated_role(role: &str) -> bool {
    !MAIN_ROLES.contains(&role)
}

/// The metadata filename of a role.
pub fn role_filename(role: &str) -> String {
    format!("{}.json", role)
}

/// A versioned, signed metadata repository rooted at a directory on disk.
///
/// Mutations run as edit transactions: the role file is opened and parsed, the caller's
/// mutator runs over the body, and on success the version is bumped by one, the expiry is
/// refreshed unless the mutator set one, the role is re-signed by every cached signer, and the
/// file is rewritten atomically. A failed mutation leaves the on-disk state untouched.
///
/// The repository assumes a single writer; the surrounding transport (a git working tree)
/// serializes writers, and atomic file replacement keeps concurrent readers safe.
pub struct MetadataRepository {
    pub(crate) store: MetadataStore,

    /// All signers available to the repository, keyed by role name and then by key ID. On
    /// every edit each cached signer for the role signs the role's metadata.
    pub(crate) signer_cache: HashMap<String, HashMap<String, Arc<dyn Sign>>>,

    /// Versions of changed root and targets-family roles, keyed by filename; folded into
    /// snapshot by `do_snapshot`.
    pub(crate) targets_infos: HashMap<String, u64>,

    /// Version of the last written snapshot, consumed by `do_timestamp`.
    pub(crate) snapshot_info: u64,
}

impl std::fmt::Debug for MetadataRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataRepository")
            .field("path", &self.store.path())
            .field("targets_infos", &self.targets_infos)
            .field("snapshot_info", &self.snapshot_info)
            .finish()
    }
}

impl MetadataRepository {
    /// Creates a repository handle rooted at `path`. No filesystem access happens until a role
    /// is opened or edited.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        MetadataRepository {
            store: MetadataStore::new(path),
            signer_cache: HashMap::new(),
            targets_infos: HashMap::new(),
            snapshot_info: 1,
        }
    }

    /// The repository's base path.
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// The metadata directory.
    pub fn metadata_path(&self) -> PathBuf {
        self.store.metadata_dir()
    }

    /// The targets directory.
    pub fn targets_path(&self) -> PathBuf {
        self.store.targets_dir()
    }

    /// The certificates directory, created on first use.
    pub fn certs_dir(&self) -> Result<PathBuf> {
        self.store.certs_dir()
    }

    // =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

    /// Reads root metadata from disk.
    pub fn open_root(&self) -> Result<Signed<Root>> {
        self.store.load("root")
    }

    /// Reads a targets-family role (top-level `targets` or a delegated role) from disk.
    pub fn open_targets(&self, role: &str) -> Result<Signed<Targets>> {
        ensure!(
            role == "targets" || is_delegated_role(role),
            error::RoleNotFoundSnafu { name: role }
        );
        self.store.load(role)
    }

    /// Reads snapshot metadata from disk.
    pub fn open_snapshot(&self) -> Result<Signed<Snapshot>> {
        self.store.load("snapshot")
    }

    /// Reads timestamp metadata from disk.
    pub fn open_timestamp(&self) -> Result<Signed<Timestamp>> {
        self.store.load("timestamp")
    }

    // =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

    /// Registers a signer for a role without checking it against the role's descriptor. Used
    /// when the descriptor is being changed in the same operation.
    pub fn add_signer(&mut self, role: &str, signer: Arc<dyn Sign>) -> Result<()> {
        let keyid = hex::encode(signer.key_id()?);
        self.signer_cache
            .entry(role.to_string())
            .or_default()
            .insert(keyid, signer);
        Ok(())
    }

    /// Verifies that each signer's key is listed in the role's descriptor, then registers it
    /// in the signer cache.
    pub fn load_signers(&mut self, role: &str, signers: &[Arc<dyn Sign>]) -> Result<()> {
        for signer in signers {
            ensure!(
                self.is_valid_metadata_key(role, signer.public_key())?,
                error::InvalidKeySnafu { role }
            );
            self.add_signer(role, Arc::clone(signer))?;
        }
        Ok(())
    }

    /// Checks whether the role's descriptor lists the key's ID.
    pub fn is_valid_metadata_key(&self, role: &str, key: &Key) -> Result<bool> {
        let key_id = key.key_id()?;
        Ok(self.role_keys(role)?.keyids.contains(&key_id))
    }

    /// The key IDs of a role's descriptor.
    pub fn get_keyids_of_role(&self, role: &str) -> Result<Vec<Decoded<Hex>>> {
        Ok(self.role_keys(role)?.keyids)
    }

    /// The signature threshold of a role.
    pub fn get_role_threshold(&self, role: &str) -> Result<u64> {
        Ok(self.role_keys(role)?.threshold.get())
    }

    /// Whether the role is defined, either in root or somewhere in the delegation tree.
    pub fn check_if_role_exists(&self, role: &str) -> bool {
        self.role_keys(role).is_ok()
    }

    /// Looks up a role's descriptor: canonical roles are described by root, delegated roles by
    /// their delegating parent.
    pub(crate) fn role_keys(&self, role: &str) -> Result<RoleKeys> {
        if is_delegated_role(role) {
            let parent = self
                .find_delegated_roles_parent(role)?
                .context(error::RoleNotFoundSnafu { name: role })?;
            let parent_md = self.open_targets(&parent)?;
            let delegated = parent_md
                .signed
                .delegations
                .as_ref()
                .and_then(|delegations| delegations.role(role))
                .context(error::RoleNotFoundSnafu { name: role })?;
            Ok(delegated.keys())
        } else {
            let role_type: RoleType = role
                .parse()
                .map_err(|_| error::RoleNotFoundSnafu { name: role }.build())?;
            let root = self.open_root()?;
            root.signed
                .roles
                .get(&role_type)
                .cloned()
                .context(error::RoleNotInRootSnafu { role })
        }
    }

    // =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

    /// Edits root under a transaction. The mutator may change keys, role descriptors, and the
    /// expiry; the epilogue bumps the version, re-signs with the cached root signers, writes
    /// `root.json` and the `<N>.root.json` history copy.
    pub fn edit_root<F>(&mut self, mutator: F) -> Result<u64>
    where
        F: FnOnce(&mut Root) -> Result<()>,
    {
        let mut md = self.open_root()?;
        let expires_before = md.signed.expires;
        mutator(&mut md.signed)?;
        if md.signed.expires == expires_before {
            md.signed.expires = Utc::now() + Duration::days(expiration_interval("root"));
        }
        // root's own descriptor comes from the body being written, so that key rotations are
        // signed against the new key set
        let role_keys = md
            .signed
            .roles
            .get(&RoleType::Root)
            .cloned()
            .context(error::RoleNotInRootSnafu { role: "root" })?;
        self.close("root", &mut md, &role_keys)
    }

    /// Edits the top-level `targets` role or a delegated targets role under a transaction.
    pub fn edit_targets<F>(&mut self, role: &str, mutator: F) -> Result<u64>
    where
        F: FnOnce(&mut Targets) -> Result<()>,
    {
        let mut md = self.open_targets(role)?;
        let expires_before = md.signed.expires;
        mutator(&mut md.signed)?;
        if md.signed.expires == expires_before {
            md.signed.expires = Utc::now() + Duration::days(expiration_interval(role));
        }
        let role_keys = self.role_keys(role)?;
        self.close(role, &mut md, &role_keys)
    }

    /// Edits snapshot under a transaction.
    pub fn edit_snapshot<F>(&mut self, mutator: F) -> Result<u64>
    where
        F: FnOnce(&mut Snapshot) -> Result<()>,
    {
        let mut md = self.open_snapshot()?;
        let expires_before = md.signed.expires;
        mutator(&mut md.signed)?;
        if md.signed.expires == expires_before {
            md.signed.expires = Utc::now() + Duration::days(expiration_interval("snapshot"));
        }
        let role_keys = self.role_keys("snapshot")?;
        self.close("snapshot", &mut md, &role_keys)
    }

    /// Edits timestamp under a transaction.
    pub fn edit_timestamp<F>(&mut self, mutator: F) -> Result<u64>
    where
        F: FnOnce(&mut Timestamp) -> Result<()>,
    {
        let mut md = self.open_timestamp()?;
        let expires_before = md.signed.expires;
        mutator(&mut md.signed)?;
        if md.signed.expires == expires_before {
            md.signed.expires = Utc::now() + Duration::days(expiration_interval("timestamp"));
        }
        let role_keys = self.role_keys("timestamp")?;
        self.close("timestamp", &mut md, &role_keys)
    }

    /// The bump-resign-write epilogue shared by every edit transaction and by repository
    /// creation. Signs with every cached signer for the role, requires the descriptor's
    /// threshold to be met by authorized keys, writes atomically, and records the new version
    /// for the snapshot/timestamp cascade.
    pub(crate) fn close<T>(
        &mut self,
        role: &str,
        md: &mut Signed<T>,
        role_keys: &RoleKeys,
    ) -> Result<u64>
    where
        T: Role + Serialize,
    {
        let version = md
            .signed
            .version()
            .checked_add(1)
            .context(error::VersionOverflowSnafu { role })?;
        md.signed.set_version(version);

        md.signatures.clear();
        let signers = self
            .signer_cache
            .get(role)
            .filter(|signers| !signers.is_empty())
            .context(error::SigningKeysMissingSnafu { role })?;
        let payload = md.signed.canonical_form()?;
        let mut ordered: Vec<_> = signers.iter().collect();
        ordered.sort_by(|a, b| a.0.cmp(b.0));
        let mut authorized = 0u64;
        for (_, signer) in ordered {
            let keyid = signer.key_id()?;
            let sig = signer.sign(&payload)?;
            if role_keys.keyids.contains(&keyid) {
                authorized += 1;
            }
            md.signatures.push(Signature {
                keyid,
                sig: sig.into(),
            });
        }
        ensure!(
            authorized >= role_keys.threshold.get(),
            error::ThresholdNotMetSnafu {
                role,
                count: authorized,
                threshold: role_keys.threshold.get(),
            }
        );

        self.store.write_role(role, md)?;
        if role == "root" {
            self.store.write_versioned_role(role, md)?;
        }

        // track the change for `do_snapshot` / `do_timestamp`
        if role == "snapshot" {
            self.snapshot_info = version;
        } else if role != "timestamp" {
            self.targets_infos.insert(role_filename(role), version);
        }
        debug!("closed role '{}' at version {}", role, version);
        Ok(version)
    }

    // =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

    /// Bumps snapshot, folding in the recorded version of every changed root and
    /// targets-family role. Callers invoke this after their own edits; it is an explicit
    /// post-step rather than part of the edit transaction.
    pub fn do_snapshot(&mut self) -> Result<u64> {
        let infos = self.targets_infos.clone();
        self.edit_snapshot(move |snapshot| {
            for (filename, version) in infos {
                snapshot.meta.entry(filename).or_default().version = version;
            }
            Ok(())
        })
    }

    /// Bumps timestamp to reference the current snapshot version. Run after `do_snapshot`.
    pub fn do_timestamp(&mut self) -> Result<u64> {
        let snapshot_version = self.snapshot_info;
        self.edit_timestamp(move |timestamp| {
            timestamp
                .meta
                .entry("snapshot.json".to_string())
                .or_default()
                .version = snapshot_version;
            Ok(())
        })
    }

    // =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

    /// The version and expiration instant of a role, read from disk.
    pub(crate) fn role_version_and_expiry(&self, role: &str) -> Result<(u64, DateTime<Utc>)> {
        match role {
            "root" => {
                let md = self.open_root()?;
                Ok((md.signed.version, md.signed.expires))
            }
            "snapshot" => {
                let md = self.open_snapshot()?;
                Ok((md.signed.version, md.signed.expires))
            }
            "timestamp" => {
                let md = self.open_timestamp()?;
                Ok((md.signed.version, md.signed.expires))
            }
            _ => {
                let md = self.open_targets(role)?;
                Ok((md.signed.version, md.signed.expires))
            }
        }
    }

    /// The expiration instant of a role.
    pub fn get_expiration_date(&self, role: &str) -> Result<DateTime<Utc>> {
        Ok(self.role_version_and_expiry(role)?.1)
    }

    /// The current version of a role.
    pub fn get_version(&self, role: &str) -> Result<u64> {
        Ok(self.role_version_and_expiry(role)?.0)
    }

    /// Loads the given signers for the role and re-signs it with a fresh expiry of
    /// `start_date + interval` days. `start_date` defaults to now and `interval` to the
    /// role's default interval. The snapshot/timestamp cascade is the caller's
    /// responsibility, as with any other single-role maintenance edit.
    pub fn set_metadata_expiration_date(
        &mut self,
        role: &str,
        signers: &[Arc<dyn Sign>],
        start_date: Option<DateTime<Utc>>,
        interval: Option<i64>,
    ) -> Result<()> {
        self.load_signers(role, signers)?;
        let start_date = start_date.unwrap_or_else(Utc::now);
        let interval = interval.unwrap_or_else(|| expiration_interval(role));
        let expires = start_date + Duration::days(interval);
        match role {
            "root" => self.edit_root(|root| {
                root.expires = expires;
                Ok(())
            })?,
            "snapshot" => self.edit_snapshot(|snapshot| {
                snapshot.expires = expires;
                Ok(())
            })?,
            "timestamp" => self.edit_timestamp(|timestamp| {
                timestamp.expires = expires;
                Ok(())
            })?,
            _ => self.edit_targets(role, |targets| {
                targets.expires = expires;
                Ok(())
            })?,
        };
        Ok(())
    }

    /// Determines which roles have expired at `start_date`, and which will expire within
    /// `interval` days of it. Both lists are sorted by expiry, soonest first.
    pub fn check_roles_expiration_dates(
        &self,
        interval: Option<i64>,
        start_date: Option<DateTime<Utc>>,
        excluded_roles: &[String],
    ) -> Result<(Vec<(String, DateTime<Utc>)>, Vec<(String, DateTime<Utc>)>)> {
        let start_date = start_date.unwrap_or_else(Utc::now);
        let threshold = start_date + Duration::days(interval.unwrap_or(30));

        let mut roles = self.get_all_targets_roles()?;
        for role in &["root", "snapshot", "timestamp"] {
            roles.push((*role).to_string());
        }
        roles.retain(|role| !excluded_roles.contains(role));

        let mut expired = Vec::new();
        let mut will_expire = Vec::new();
        for role in roles {
            let expiry = self.get_expiration_date(&role)?;
            if start_date > expiry {
                expired.push((role, expiry));
            } else if threshold >= expiry {
                will_expire.push((role, expiry));
            }
        }
        expired.sort_by_key(|(_, expiry)| *expiry);
        will_expire.sort_by_key(|(_, expiry)| *expiry);
        Ok((expired, will_expire))
    }

    // =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

    /// All roles whose metadata the provided public keys can sign. With `check_threshold`,
    /// a role qualifies only when the keys meet its threshold; without, one key suffices.
    pub fn find_keys_roles(&self, public_keys: &[Key], check_threshold: bool) -> Result<Vec<String>> {
        let mut key_ids = Vec::new();
        for key in public_keys {
            key_ids.push(key.key_id()?);
        }
        let mut pending: Vec<String> = MAIN_ROLES.iter().map(|role| (*role).to_string()).collect();
        let mut found = Vec::new();
        while let Some(role) = pending.pop() {
            let role_keys = self.role_keys(&role)?;
            let signing = role_keys
                .keyids
                .iter()
                .filter(|keyid| key_ids.contains(keyid))
                .count() as u64;
            if (!check_threshold && signing >= 1) || signing >= role_keys.threshold.get() {
                found.push(role.clone());
            }
            if role == "targets" || is_delegated_role(&role) {
                for delegation in self.get_delegations_of_role(&role)? {
                    pending.push(delegation.name);
                }
            }
        }
        Ok(found)
    }

    /// All roles listing this key as a signing key, regardless of threshold.
    pub fn find_associated_roles_of_key(&self, public_key: &Key) -> Result<Vec<String>> {
        self.find_keys_roles(std::slice::from_ref(public_key), false)
    }

    /// Loads the given signers for a role and re-signs it under an empty edit, bumping its
    /// version and refreshing its expiry.
    pub fn update_role(&mut self, role: &str, signers: &[Arc<dyn Sign>]) -> Result<u64> {
        self.load_signers(role, signers)?;
        match role {
            "root" => self.edit_root(|_| Ok(())),
            "snapshot" => self.edit_snapshot(|_| Ok(())),
            "timestamp" => self.edit_timestamp(|_| Ok(())),
            _ => self.edit_targets(role, |_| Ok(())),
        }
    }

    /// Unconditionally re-signs snapshot and then timestamp with the given signers. Used by
    /// maintenance flows that need fresh meta-of-meta roles without any lower-role change.
    /// Runs the regular cascade so timestamp always references the new snapshot version.
    pub fn update_snapshot_and_timestamp(
        &mut self,
        roles_signers: &HashMap<String, Vec<Arc<dyn Sign>>>,
    ) -> Result<()> {
        for role in &["snapshot", "timestamp"] {
            let signers = roles_signers
                .get(*role)
                .map(|signers| signers.as_slice())
                .unwrap_or(&[]);
            self.load_signers(role, signers)?;
        }
        self.do_snapshot()?;
        self.do_timestamp()?;
        Ok(())
    }

    /// The canonical JSON form of a role's signed body, i.e. the exact signing payload.
    pub fn get_signable_metadata(&self, role: &str) -> Result<String> {
        let bytes = match role {
            "root" => self.open_root()?.signed.canonical_form()?,
            "snapshot" => self.open_snapshot()?.signed.canonical_form()?,
            "timestamp" => self.open_timestamp()?.signed.canonical_form()?,
            _ => self.open_targets(role)?.signed.canonical_form()?,
        };
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Default expiration interval of a role in days. Delegated targets roles use the `targets`
/// interval.
pub fn expiration_interval(role: &str) -> i64 {
    match role {
        "root" => 365,
        "snapshot" => 7,
        "timestamp" => 1,
        _ => 90,
    }
}

#[cfg(test)]
mod tests {
    use super::{expiration_interval, is_delegated_role, role_filename};

    #[test]
    fn delegated_role_names() {
        assert!(!is_delegated_role("root"));
        assert!(!is_delegated_role("timestamp"));
        assert!(is_delegated_role("delegated"));
        assert!(is_delegated_role("role1"));
    }

    #[test]
    fn default_intervals() {
        assert_eq!(expiration_interval("root"), 365);
        assert_eq!(expiration_interval("targets"), 90);
        assert_eq!(expiration_interval("snapshot"), 7);
        assert_eq!(expiration_interval("timestamp"), 1);
        assert_eq!(expiration_interval("delegated"), 90);
    }

    #[test]
    fn filenames() {
        assert_eq!(role_filename("root"), "root.json");
        assert_eq!(role_filename("delegated"), "delegated.json");
    }
}
