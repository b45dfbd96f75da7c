// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::used_underscore_binding)]

//! Provides the typed in-memory representation of role metadata: the four canonical roles,
//! delegated targets roles, and their canonical JSON (de)serialization.

mod de;
pub mod decoded;
pub mod key;

use crate::error::{self, Result};
use crate::schema::decoded::{Decoded, Hex};
use crate::schema::key::Key;
use aws_lc_rs::digest::{Context, SHA256, SHA512};
use chrono::{DateTime, Utc};
use globset::GlobBuilder;
use olpc_cjson::CanonicalFormatter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_plain::{forward_display_to_serde, forward_from_str_to_serde};
use snafu::{ensure, ResultExt};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::num::NonZeroU64;
use std::path::Path;

/// The version of the metadata format written by this library.
pub const SPEC_VERSION: &str = "1.0.0";

/// The type of metadata role.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RoleType {
    /// The root role delegates trust to specific keys trusted for all other top-level roles used in
    /// the system.
    Root,
    /// The snapshot role signs a metadata file that provides information about the latest version
    /// of all targets metadata on the repository (the top-level targets role and all delegated
    /// roles).
    Snapshot,
    /// The targets role's signature indicates which target files are trusted by clients.
    Targets,
    /// The timestamp role is used to prevent an adversary from replaying an out-of-date signed
    /// metadata file whose signature has not yet expired.
    Timestamp,
}

forward_display_to_serde!(RoleType);
forward_from_str_to_serde!(RoleType);

/// Common trait implemented by all roles.
pub trait Role: Serialize {
    /// The type of role this object represents.
    const TYPE: RoleType;

    /// Determines when metadata should be considered expired and no longer trusted by clients.
    fn expires(&self) -> DateTime<Utc>;

    /// An integer version number, incremented by exactly one on every successful edit.
    fn version(&self) -> u64;

    /// Replaces the expiration instant.
    fn set_expires(&mut self, expires: DateTime<Utc>);

    /// Replaces the version number.
    fn set_version(&mut self, version: u64);

    /// A deterministic JSON serialization used as the signing payload for this role.
    /// [More info on canonical JSON](http://wiki.laptop.org/go/Canonical_JSON)
    fn canonical_form(&self) -> Result<Vec<u8>> {
        canonical_bytes(self, "role")
    }
}

/// Serializes any value as canonical JSON: sorted object keys, ASCII with escapes, no trailing
/// whitespace. This byte sequence is used both for signing and for on-disk writes.
pub(crate) fn canonical_bytes<S>(value: &S, what: &str) -> Result<Vec<u8>>
where
    S: Serialize + ?Sized,
{
    let mut data = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut data, CanonicalFormatter::new());
    value
        .serialize(&mut ser)
        .context(error::JsonSerializationSnafu { what })?;
    Ok(data)
}

/// A signed metadata object.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Signed<T> {
    /// The role that is signed.
    pub signed: T,
    /// A list of signatures and their key IDs.
    pub signatures: Vec<Signature>,
}

impl<T: Role> Signed<T> {
    /// Counts the signatures that belong to the role's descriptor and verify over the role's
    /// canonical form, given the key dictionary of the containing metadata.
    pub fn valid_signature_count(
        &self,
        keys: &HashMap<Decoded<Hex>, Key>,
        role_keys: &RoleKeys,
    ) -> Result<u64> {
        let payload = self.signed.canonical_form()?;
        let mut count = 0;
        for signature in &self.signatures {
            if !role_keys.keyids.contains(&signature.keyid) {
                continue;
            }
            if let Some(key) = keys.get(&signature.keyid) {
                if key.verify(&payload, &signature.sig) {
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

/// A signature and the key ID that made it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Signature {
    /// The ID of the key that made this signature.
    pub keyid: Decoded<Hex>,
    /// A hex-encoded signature of the canonical JSON form of a role.
    pub sig: Decoded<Hex>,
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// The root role. It indicates which keys are authorized for all canonical roles, including the
/// root role itself. Revocation and replacement of canonical role keys is done by changing the
/// keys listed for the roles in this file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "root")]
pub struct Root {
    /// A string that contains the version number of the metadata format.
    pub spec_version: String,

    /// Whether the repository uses version-prefixed metadata and targets filenames. Always
    /// `false` in this system; root history copies are written unconditionally instead.
    pub consistent_snapshot: bool,

    /// An integer version number, incremented by exactly one on every successful edit.
    pub version: u64,

    /// Determines when metadata should be considered expired and no longer trusted by clients.
    pub expires: DateTime<Utc>,

    /// The key dictionary needed to verify the canonical roles. Every key ID referenced by a
    /// role descriptor below must appear here.
    #[serde(deserialize_with = "de::deserialize_keys")]
    pub keys: HashMap<Decoded<Hex>, Key>,

    /// A list of roles, the keys associated with each role, and the threshold of signatures used
    /// for each role.
    pub roles: HashMap<RoleType, RoleKeys>,

    /// Extra arguments found during deserialization.
    ///
    /// We must store these to correctly verify signatures for this object.
    ///
    /// If you're instantiating this struct, you should make this `HashMap::new()`.
    #[serde(flatten)]
    #[serde(deserialize_with = "de::extra_skip_type")]
    pub _extra: HashMap<String, Value>,
}

/// Represents the key IDs used for a role and the threshold of signatures required to validate
/// it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RoleKeys {
    /// The key IDs used for the role.
    pub keyids: Vec<Decoded<Hex>>,

    /// The threshold of signatures required to validate the role.
    pub threshold: NonZeroU64,

    /// Extra arguments found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl Root {
    /// Creates an empty `Root` object with no keys and no role descriptors.
    pub fn new(version: u64, expires: DateTime<Utc>) -> Self {
        Root {
            spec_version: SPEC_VERSION.to_string(),
            consistent_snapshot: false,
            version,
            expires,
            keys: HashMap::new(),
            roles: HashMap::new(),
            _extra: HashMap::new(),
        }
    }

    /// Registers a public key for a canonical role, creating the role's descriptor if needed.
    /// Returns the key ID. Adding a key that is already present is a no-op.
    pub fn add_key(&mut self, key: Key, role: RoleType) -> Result<Decoded<Hex>> {
        let key_id = key.key_id()?;
        self.keys.entry(key_id.clone()).or_insert(key);
        let role_keys = self.roles.entry(role).or_insert_with(|| RoleKeys {
            keyids: Vec::new(),
            threshold: NonZeroU64::new(1).unwrap(),
            _extra: HashMap::new(),
        });
        if !role_keys.keyids.contains(&key_id) {
            role_keys.keyids.push(key_id.clone());
        }
        Ok(key_id)
    }

    /// Removes a key ID from a canonical role's descriptor. The key itself is dropped from the
    /// key dictionary once no role references it. Returns whether the role listed the key.
    pub fn revoke_key(&mut self, keyid: &Decoded<Hex>, role: RoleType) -> bool {
        let removed = match self.roles.get_mut(&role) {
            Some(role_keys) => {
                let before = role_keys.keyids.len();
                role_keys.keyids.retain(|id| id != keyid);
                role_keys.keyids.len() != before
            }
            None => false,
        };
        if removed && !self.roles.values().any(|r| r.keyids.contains(keyid)) {
            self.keys.remove(keyid);
        }
        removed
    }

    /// An iterator over the keys for a given role.
    pub fn keys_for_role(&self, role: RoleType) -> impl Iterator<Item = &Key> {
        let keyids = match self.roles.get(&role) {
            Some(role_keys) => role_keys.keyids.as_slice(),
            None => &[],
        };
        keyids.iter().filter_map(move |keyid| self.keys.get(keyid))
    }
}

impl Role for Root {
    const TYPE: RoleType = RoleType::Root;

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_expires(&mut self, expires: DateTime<Utc>) {
        self.expires = expires;
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// The snapshot role. It lists the version numbers of root and of the top-level and delegated
/// targets metadata, so that a client can detect a stale or mixed set of role files.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "snapshot")]
pub struct Snapshot {
    /// A string that contains the version number of the metadata format.
    pub spec_version: String,

    /// An integer version number, incremented by exactly one on every successful edit.
    pub version: u64,

    /// Determines when metadata should be considered expired and no longer trusted by clients.
    pub expires: DateTime<Utc>,

    /// Maps a role's filename (`root.json`, `targets.json`, `<delegated>.json`) to its current
    /// on-disk version.
    pub meta: HashMap<String, SnapshotMeta>,

    /// Extra arguments found during deserialization.
    #[serde(flatten)]
    #[serde(deserialize_with = "de::extra_skip_type")]
    pub _extra: HashMap<String, Value>,
}

/// A single entry in `snapshot.meta`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SnapshotMeta {
    /// The version of the referenced metadata file.
    pub version: u64,

    /// Extra arguments found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl Default for SnapshotMeta {
    fn default() -> Self {
        SnapshotMeta {
            version: 1,
            _extra: HashMap::new(),
        }
    }
}

impl Snapshot {
    /// Creates a new `Snapshot` object with an empty meta map.
    pub fn new(version: u64, expires: DateTime<Utc>) -> Self {
        Snapshot {
            spec_version: SPEC_VERSION.to_string(),
            version,
            expires,
            meta: HashMap::new(),
            _extra: HashMap::new(),
        }
    }
}

impl Role for Snapshot {
    const TYPE: RoleType = RoleType::Snapshot;

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_expires(&mut self, expires: DateTime<Utc>) {
        self.expires = expires;
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// A targets role, either the top-level `targets` role or a delegated targets role. It records
/// the target files trusted by the role and, optionally, delegations to further roles.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "targets")]
pub struct Targets {
    /// A string that contains the version number of the metadata format.
    pub spec_version: String,

    /// An integer version number, incremented by exactly one on every successful edit.
    pub version: u64,

    /// Determines when metadata should be considered expired and no longer trusted by clients.
    pub expires: DateTime<Utc>,

    /// Each key is a target path, POSIX style, relative to the targets directory.
    pub targets: HashMap<String, Target>,

    /// Delegations describe subsets of the targets for which responsibility is delegated to
    /// another role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegations: Option<Delegations>,

    /// Extra arguments found during deserialization.
    #[serde(flatten)]
    #[serde(deserialize_with = "de::extra_skip_type")]
    pub _extra: HashMap<String, Value>,
}

/// A target file entry in a targets role.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Target {
    /// The length in bytes of the target file.
    pub length: u64,

    /// The cryptographic digests of the target file.
    pub hashes: Hashes,

    /// Opaque application data attached to the target. Carried verbatim.
    #[serde(default)]
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, Value>,

    /// Extra arguments found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

/// The digests recorded for a target file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Hashes {
    /// The SHA-256 digest of the file.
    pub sha256: Decoded<Hex>,

    /// The SHA-512 digest of the file.
    pub sha512: Decoded<Hex>,

    /// Extra arguments found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl Target {
    /// Builds a `Target` from a file on disk, computing its length and digests.
    pub fn from_file<P>(path: P) -> Result<Target>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        ensure!(path.is_file(), error::TargetNotAFileSnafu { path });

        let mut file = File::open(path).context(error::FileReadSnafu { path })?;
        let mut sha256 = Context::new(&SHA256);
        let mut sha512 = Context::new(&SHA512);
        let mut buf = [0; 8 * 1024];
        let mut length = 0;
        loop {
            match file.read(&mut buf).context(error::FileReadSnafu { path })? {
                0 => break,
                n => {
                    sha256.update(&buf[..n]);
                    sha512.update(&buf[..n]);
                    length += n as u64;
                }
            }
        }

        Ok(Target {
            length,
            hashes: Hashes {
                sha256: sha256.finish().as_ref().to_vec().into(),
                sha512: sha512.finish().as_ref().to_vec().into(),
                _extra: HashMap::new(),
            },
            custom: HashMap::new(),
            _extra: HashMap::new(),
        })
    }
}

impl Targets {
    /// Creates a new `Targets` object with no targets and an empty delegations block.
    pub fn new(version: u64, expires: DateTime<Utc>) -> Self {
        Targets {
            spec_version: SPEC_VERSION.to_string(),
            version,
            expires,
            targets: HashMap::new(),
            delegations: Some(Delegations::new()),
            _extra: HashMap::new(),
        }
    }

    /// Add a target to this role.
    pub fn add_target(&mut self, name: &str, target: Target) {
        self.targets.insert(name.to_string(), target);
    }

    /// Remove a target from this role.
    pub fn remove_target(&mut self, name: &str) -> Option<Target> {
        self.targets.remove(name)
    }

    /// The delegated roles listed directly by this role.
    pub fn delegated_roles(&self) -> &[DelegatedRole] {
        match &self.delegations {
            Some(delegations) => &delegations.roles,
            None => &[],
        }
    }

    /// Registers a public key for a directly delegated role: the key lands in this role's
    /// delegations key dictionary, and the key ID is appended to the child's descriptor.
    pub fn add_key(&mut self, key: Key, role: &str) -> Result<Decoded<Hex>> {
        let key_id = key.key_id()?;
        let delegations = self
            .delegations
            .get_or_insert_with(Delegations::new);
        delegations.keys.entry(key_id.clone()).or_insert(key);
        let delegated = delegations
            .roles
            .iter_mut()
            .find(|delegated| delegated.name == role)
            .ok_or_else(|| error::Error::RoleNotFound {
                name: role.to_string(),
            })?;
        if !delegated.keyids.contains(&key_id) {
            delegated.keyids.push(key_id.clone());
        }
        Ok(key_id)
    }

    /// Removes a key ID from a directly delegated role's descriptor, dropping the key from the
    /// delegations dictionary once no child references it. Returns whether the child listed it.
    pub fn revoke_key(&mut self, keyid: &Decoded<Hex>, role: &str) -> bool {
        let delegations = match &mut self.delegations {
            Some(delegations) => delegations,
            None => return false,
        };
        let removed = match delegations
            .roles
            .iter_mut()
            .find(|delegated| delegated.name == role)
        {
            Some(delegated) => {
                let before = delegated.keyids.len();
                delegated.keyids.retain(|id| id != keyid);
                delegated.keyids.len() != before
            }
            None => false,
        };
        if removed
            && !delegations
                .roles
                .iter()
                .any(|delegated| delegated.keyids.contains(keyid))
        {
            delegations.keys.remove(keyid);
        }
        removed
    }
}

impl Role for Targets {
    const TYPE: RoleType = RoleType::Targets;

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_expires(&mut self, expires: DateTime<Utc>) {
        self.expires = expires;
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Delegations found in a targets role: the public keys used to verify the delegated roles, and
/// the ordered list of delegated role descriptors.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Delegations {
    /// Lists the public keys to verify signatures of delegated targets roles. Revocation and
    /// replacement of delegated targets roles keys is done by changing the keys in this field in
    /// the delegating role's metadata.
    #[serde(deserialize_with = "de::deserialize_keys")]
    pub keys: HashMap<Decoded<Hex>, Key>,

    /// The list of delegated roles, in delegation order.
    pub roles: Vec<DelegatedRole>,
}

impl Delegations {
    /// Creates a new `Delegations` with no keys or roles.
    pub fn new() -> Self {
        Delegations {
            keys: HashMap::new(),
            roles: Vec::new(),
        }
    }

    /// Returns the directly delegated role with the given name, if any.
    pub fn role(&self, role_name: &str) -> Option<&DelegatedRole> {
        self.roles.iter().find(|role| role.name == role_name)
    }
}

impl Default for Delegations {
    fn default() -> Self {
        Delegations::new()
    }
}

/// The descriptor of a delegated targets role, embedded in its parent's signed body.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DelegatedRole {
    /// The name of the delegated role.
    pub name: String,

    /// The key IDs used by this role.
    pub keyids: Vec<Decoded<Hex>>,

    /// The threshold of signatures required to validate the role.
    pub threshold: NonZeroU64,

    /// The glob patterns for target paths governed by this role. `*` matches within a single
    /// path component, `**` matches any sequence of components.
    pub paths: Vec<String>,

    /// When true and a target path matches this role, traversal stops for that path: no role
    /// visited later may claim it.
    pub terminating: bool,

    /// Extra arguments found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl DelegatedRole {
    /// Returns a `RoleKeys` representation of the role's descriptor.
    pub fn keys(&self) -> RoleKeys {
        RoleKeys {
            keyids: self.keyids.clone(),
            threshold: self.threshold,
            _extra: HashMap::new(),
        }
    }

    /// Determines whether any of this role's path patterns matches the target path.
    pub fn matches_path(&self, target: &str) -> bool {
        let target = target.trim_start_matches('/');
        self.paths
            .iter()
            .any(|pattern| matched_path(pattern.trim_start_matches('/'), target))
    }
}

/// Matches a target path against a glob pattern where `*` stays within one path component and
/// `**` crosses components. Invalid patterns match nothing.
fn matched_path(pattern: &str, target: &str) -> bool {
    let glob = match GlobBuilder::new(pattern).literal_separator(true).build() {
        Ok(glob) => glob.compile_matcher(),
        Err(_) => return false,
    };
    glob.is_match(target)
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// The timestamp role. It indicates the latest version of the snapshot metadata and is
/// frequently re-signed to limit the amount of time a client can be kept unaware of
/// interference with obtaining updates.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "timestamp")]
pub struct Timestamp {
    /// A string that contains the version number of the metadata format.
    pub spec_version: String,

    /// An integer version number, incremented by exactly one on every successful edit.
    pub version: u64,

    /// Determines when metadata should be considered expired and no longer trusted by clients.
    pub expires: DateTime<Utc>,

    /// The single entry for `snapshot.json`.
    pub meta: HashMap<String, TimestampMeta>,

    /// Extra arguments found during deserialization.
    #[serde(flatten)]
    #[serde(deserialize_with = "de::extra_skip_type")]
    pub _extra: HashMap<String, Value>,
}

/// The snapshot entry in `timestamp.meta`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TimestampMeta {
    /// The version of the snapshot metadata file.
    pub version: u64,

    /// Extra arguments found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl Default for TimestampMeta {
    fn default() -> Self {
        TimestampMeta {
            version: 1,
            _extra: HashMap::new(),
        }
    }
}

impl Timestamp {
    /// Creates a new `Timestamp` object with an empty meta map.
    pub fn new(version: u64, expires: DateTime<Utc>) -> Self {
        Timestamp {
            spec_version: SPEC_VERSION.to_string(),
            version,
            expires,
            meta: HashMap::new(),
            _extra: HashMap::new(),
        }
    }
}

impl Role for Timestamp {
    const TYPE: RoleType = RoleType::Timestamp;

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_expires(&mut self, expires: DateTime<Utc>) {
        self.expires = expires;
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn expires() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn canonical_form_is_sorted_and_stable() {
        let snapshot = Snapshot::new(1, expires());
        let first = snapshot.canonical_form().unwrap();
        let second = snapshot.canonical_form().unwrap();
        assert_eq!(first, second);
        let text = String::from_utf8(first).unwrap();
        // keys of the body appear lexicographically sorted
        let positions: Vec<usize> = ["_type", "expires", "meta", "spec_version", "version"]
            .iter()
            .map(|k| text.find(&format!("\"{}\"", k)).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn body_round_trips_through_canonical_json() {
        let mut targets = Targets::new(3, expires());
        targets.add_target(
            "a/b.txt",
            Target {
                length: 2,
                hashes: Hashes {
                    sha256: vec![0xab; 32].into(),
                    sha512: vec![0xcd; 64].into(),
                    _extra: HashMap::new(),
                },
                custom: HashMap::new(),
                _extra: HashMap::new(),
            },
        );
        let bytes = targets.canonical_form().unwrap();
        let parsed: Targets = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.canonical_form().unwrap(), bytes);
        assert_eq!(parsed, targets);
    }

    #[test]
    fn glob_star_stays_within_component() {
        assert!(matched_path("dir1/*", "dir1/file"));
        assert!(!matched_path("dir1/*", "dir1/sub/file"));
        assert!(matched_path("dir1/**", "dir1/sub/file"));
        assert!(!matched_path("dir1/*", "dir2/file"));
    }

    #[test]
    fn delegated_role_path_matching_strips_leading_separator() {
        let role = DelegatedRole {
            name: "delegated".to_string(),
            keyids: Vec::new(),
            threshold: NonZeroU64::new(1).unwrap(),
            paths: vec!["/dir1/*".to_string()],
            terminating: false,
            _extra: HashMap::new(),
        };
        assert!(role.matches_path("dir1/file"));
        assert!(role.matches_path("/dir1/file"));
        assert!(!role.matches_path("dir1/sub/file"));
    }
}
