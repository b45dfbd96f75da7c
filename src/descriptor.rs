// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The declarative roles-and-keys descriptor used to bootstrap a repository: which roles
//! exist, how many keys each carries, thresholds, schemes, and the delegated targets subtree.
//! Unrecognized fields are preserved verbatim when round-tripping.

use crate::schema::key::RsaScheme;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::num::NonZeroU64;

/// The top-level descriptor.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RolesKeysData {
    /// The canonical roles and the delegated targets subtree.
    pub roles: RolesDescriptor,

    /// Extra arguments found during deserialization, preserved verbatim.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

/// Descriptors for the four canonical roles.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RolesDescriptor {
    /// The root role.
    pub root: RoleSetup,
    /// The top-level targets role, with its delegated subtree.
    pub targets: TargetsRoleSetup,
    /// The snapshot role.
    pub snapshot: RoleSetup,
    /// The timestamp role.
    pub timestamp: RoleSetup,

    /// Extra arguments found during deserialization, preserved verbatim.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl RolesDescriptor {
    /// The canonical roles in bootstrap order, paired with their names.
    pub fn main_roles(&self) -> [(&'static str, &RoleSetup); 4] {
        [
            ("root", &self.root),
            ("targets", &self.targets.setup),
            ("snapshot", &self.snapshot),
            ("timestamp", &self.timestamp),
        ]
    }

    /// All delegated role setups in pre-order, paired with their parent's name.
    pub fn walk_delegations(&self) -> Vec<(String, &DelegatedRoleSetup)> {
        let mut found = Vec::new();
        collect_delegations("targets", &self.targets.delegations, &mut found);
        found
    }
}

fn collect_delegations<'a>(
    parent: &str,
    delegations: &'a [DelegatedRoleSetup],
    found: &mut Vec<(String, &'a DelegatedRoleSetup)>,
) {
    for delegation in delegations {
        found.push((parent.to_string(), delegation));
        collect_delegations(&delegation.name, &delegation.delegations, found);
    }
}

/// Key parameters for a single role.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RoleSetup {
    /// Number of signing keys.
    #[serde(default = "default_number")]
    pub number: u32,

    /// Signature threshold.
    #[serde(default = "default_threshold")]
    pub threshold: NonZeroU64,

    /// Signature scheme for the role's keys.
    #[serde(default)]
    pub scheme: RsaScheme,

    /// RSA key size in bits.
    #[serde(default = "default_length")]
    pub length: u32,

    /// Whether the role's keys live on hardware tokens.
    #[serde(default)]
    pub is_hardware: bool,

    /// Keystore names assigned to the role's keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_names: Option<Vec<String>>,

    /// Extra arguments found during deserialization, preserved verbatim.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl Default for RoleSetup {
    fn default() -> Self {
        RoleSetup {
            number: default_number(),
            threshold: default_threshold(),
            scheme: RsaScheme::default(),
            length: default_length(),
            is_hardware: false,
            key_names: None,
            _extra: HashMap::new(),
        }
    }
}

/// The top-level targets role descriptor, with its optional delegated subtree.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct TargetsRoleSetup {
    /// Key parameters of the targets role itself.
    #[serde(flatten)]
    pub setup: RoleSetup,

    /// Directly delegated roles, in delegation order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delegations: Vec<DelegatedRoleSetup>,
}

/// A delegated targets role descriptor.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DelegatedRoleSetup {
    /// The delegated role's name.
    pub name: String,

    /// Key parameters of the delegated role.
    #[serde(flatten)]
    pub setup: RoleSetup,

    /// The glob patterns for target paths governed by this role.
    #[serde(default)]
    pub paths: Vec<String>,

    /// Whether a path match on this role stops traversal for that path.
    #[serde(default)]
    pub terminating: bool,

    /// Delegations nested under this role, in delegation order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delegations: Vec<DelegatedRoleSetup>,
}

fn default_number() -> u32 {
    1
}

fn default_threshold() -> NonZeroU64 {
    NonZeroU64::new(1).unwrap()
}

fn default_length() -> u32 {
    3072
}
