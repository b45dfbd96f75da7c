// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delegation-tree traversal: finding a delegated role's parent, enumerating roles, and
//! matching target paths to the most specific role that may sign them.

use crate::error::Result;
use crate::repository::MetadataRepository;
use crate::schema::DelegatedRole;
use std::collections::{HashMap, HashSet};

impl MetadataRepository {
    /// The delegated role descriptors listed directly by a targets-family role.
    pub fn get_delegations_of_role(&self, role: &str) -> Result<Vec<DelegatedRole>> {
        let md = self.open_targets(role)?;
        Ok(md
            .signed
            .delegations
            .map(|delegations| delegations.roles)
            .unwrap_or_default())
    }

    /// Finds the role that delegates to `delegated_role` by walking the tree from `targets`.
    /// Returns `None` when no role delegates to it.
    pub fn find_delegated_roles_parent(&self, delegated_role: &str) -> Result<Option<String>> {
        let mut parents = vec!["targets".to_string()];
        while let Some(parent) = parents.pop() {
            for delegation in self.get_delegations_of_role(&parent)? {
                if delegation.name == delegated_role {
                    return Ok(Some(parent));
                }
                parents.push(delegation.name);
            }
        }
        Ok(None)
    }

    /// The names of all targets-family roles, starting with `targets`.
    pub fn get_all_targets_roles(&self) -> Result<Vec<String>> {
        let mut pending = vec!["targets".to_string()];
        let mut all_roles = Vec::new();
        while let Some(role) = pending.pop() {
            for delegation in self.get_delegations_of_role(&role)? {
                pending.push(delegation.name);
            }
            all_roles.push(role);
        }
        Ok(all_roles)
    }

    /// The names of every defined role: the canonical roles plus all delegated targets roles.
    pub fn get_all_roles(&self) -> Result<Vec<String>> {
        let mut all_roles = vec![
            "root".to_string(),
            "snapshot".to_string(),
            "timestamp".to_string(),
        ];
        all_roles.extend(self.get_all_targets_roles()?);
        Ok(all_roles)
    }

    /// The path patterns of a targets-family role. The top-level `targets` role may sign any
    /// path.
    pub fn get_role_paths(&self, role: &str) -> Result<Vec<String>> {
        if role == "targets" {
            return Ok(vec!["**".to_string()]);
        }
        let parent = self
            .find_delegated_roles_parent(role)?
            .ok_or_else(|| crate::error::RoleNotFoundSnafu { name: role }.build())?;
        let md = self.open_targets(&parent)?;
        let delegated = md
            .signed
            .delegations
            .as_ref()
            .and_then(|delegations| delegations.role(role))
            .ok_or_else(|| crate::error::RoleNotFoundSnafu { name: role }.build())?;
        Ok(delegated.paths.clone())
    }

    /// For each target path, finds the most specific role responsible for it.
    ///
    /// The delegation tree is traversed in pre-order from `targets`; any role whose path
    /// patterns match a target overwrites the previous mapping, so the most deeply nested
    /// match wins. A terminating role stops the traversal for the paths it matches. Paths not
    /// matched by any delegation map to `targets`.
    pub fn map_signing_roles(&self, target_filenames: &[String]) -> Result<HashMap<String, String>> {
        let mut roles_targets: HashMap<String, String> = target_filenames
            .iter()
            .map(|target| (target.clone(), "targets".to_string()))
            .collect();
        let mut stopped = HashSet::new();
        self.visit_delegations("targets", target_filenames, &mut roles_targets, &mut stopped)?;
        Ok(roles_targets)
    }

    fn visit_delegations(
        &self,
        role: &str,
        target_filenames: &[String],
        roles_targets: &mut HashMap<String, String>,
        stopped: &mut HashSet<String>,
    ) -> Result<()> {
        for delegation in self.get_delegations_of_role(role)? {
            for target in target_filenames {
                if stopped.contains(target) {
                    continue;
                }
                if delegation.matches_path(target) {
                    roles_targets.insert(target.clone(), delegation.name.clone());
                    if delegation.terminating {
                        stopped.insert(target.clone());
                    }
                }
            }
            self.visit_delegations(&delegation.name, target_filenames, roles_targets, stopped)?;
        }
        Ok(())
    }

    /// Finds the single role that may sign every one of the given target paths, or `None` when
    /// the paths spread across more than one role.
    pub fn get_role_from_target_paths(&self, target_paths: &[String]) -> Result<Option<String>> {
        let roles_targets = self.map_signing_roles(target_paths)?;
        let mut roles = roles_targets.values();
        let first = match roles.next() {
            Some(role) => role,
            None => return Ok(None),
        };
        if roles.all(|role| role == first) {
            Ok(Some(first.clone()))
        } else {
            Ok(None)
        }
    }

    /// Groups target paths by the role responsible for signing them.
    pub fn roles_targets_for_filenames(
        &self,
        target_filenames: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        let mut roles_targets: HashMap<String, Vec<String>> = HashMap::new();
        for (target, role) in self.map_signing_roles(target_filenames)? {
            roles_targets.entry(role).or_default().push(target);
        }
        Ok(roles_targets)
    }
}
