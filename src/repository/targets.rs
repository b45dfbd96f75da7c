// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The target-file lifecycle: writing target files through to signed metadata, diffing the
//! on-disk tree against the signed state, and pruning unregistered files.

use crate::error::{self, Result};
use crate::repository::MetadataRepository;
use crate::schema::{Hashes, Target};
use aws_lc_rs::digest::{digest, SHA256};
use log::info;
use serde_json::Value;
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Content to write for an added target file.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetContent {
    /// Plain text, written verbatim.
    Text(String),
    /// A structured map, written as pretty-printed JSON.
    Structured(serde_json::Map<String, Value>),
}

/// One entry of the `added` argument to [`MetadataRepository::modify_targets`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetUpdate {
    /// Content for the file. When absent, existing content is kept, and a missing file is
    /// created empty.
    pub content: Option<TargetContent>,
    /// Opaque application data recorded verbatim on the target's metadata entry.
    pub custom: Option<HashMap<String, Value>>,
}

impl MetadataRepository {
    /// Adds and removes target files, both on disk and in the signed metadata of the one role
    /// responsible for all of the given paths, then cascades snapshot and timestamp.
    ///
    /// Added files are written under the targets directory (parent directories are created),
    /// hashed with SHA-256 and SHA-512, and recorded with their `custom` data. Removed paths
    /// are deleted from disk (files or whole directories) and dropped from the metadata.
    ///
    /// Returns the name of the role that was edited.
    pub fn modify_targets(
        &mut self,
        added: &BTreeMap<String, TargetUpdate>,
        removed: &BTreeSet<String>,
    ) -> Result<String> {
        ensure!(
            !(added.is_empty() && removed.is_empty()),
            error::NothingToModifySnafu
        );

        let all_paths: Vec<String> = added.keys().chain(removed.iter()).cloned().collect();
        let role = self
            .get_role_from_target_paths(&all_paths)?
            .context(error::MixedRolesSnafu {
                paths: all_paths.clone(),
            })?;

        let mut new_targets = Vec::new();
        for (path, update) in added {
            let target_path = self.write_target_content(path, update)?;
            let mut target = Target::from_file(&target_path)?;
            if let Some(custom) = &update.custom {
                target.custom = custom.clone();
            }
            new_targets.push((path.clone(), target));
        }

        for path in removed {
            self.store.remove_target(path)?;
        }

        let removed = removed.clone();
        self.edit_targets(&role, move |targets| {
            for (path, target) in new_targets {
                targets.targets.insert(path, target);
            }
            for path in &removed {
                targets.targets.remove(path);
            }
            Ok(())
        })?;
        info!("updated targets of role '{}'", role);

        self.do_snapshot()?;
        self.do_timestamp()?;
        Ok(role)
    }

    /// Convenience wrapper over [`modify_targets`](Self::modify_targets) for additions only.
    pub fn add_target_files_to_role(
        &mut self,
        added: &BTreeMap<String, TargetUpdate>,
    ) -> Result<String> {
        self.modify_targets(added, &BTreeSet::new())
    }

    fn write_target_content(&self, path: &str, update: &TargetUpdate) -> Result<std::path::PathBuf> {
        match &update.content {
            Some(TargetContent::Text(text)) => self.store.write_target_file(path, text.as_bytes()),
            Some(TargetContent::Structured(map)) => {
                let pretty = serde_json::to_vec_pretty(map).context(
                    error::JsonSerializationSnafu {
                        what: "target content",
                    },
                )?;
                self.store.write_target_file(path, &pretty)
            }
            None => self.store.touch_target_file(path),
        }
    }

    // =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

    /// Relative paths of every file currently inside the targets directory.
    pub fn all_target_files(&self) -> Result<BTreeSet<String>> {
        self.store.all_target_files()
    }

    /// The target entries signed by one role.
    pub fn get_targets_of_role(&self, role: &str) -> Result<HashMap<String, Target>> {
        Ok(self.open_targets(role)?.signed.targets)
    }

    /// All target paths signed by the given roles.
    pub fn get_signed_target_files_of_roles(&self, roles: &[String]) -> Result<BTreeSet<String>> {
        let mut files = BTreeSet::new();
        for role in roles {
            files.extend(self.get_targets_of_role(role)?.into_keys());
        }
        Ok(files)
    }

    /// All target paths signed by any role in the repository.
    pub fn get_signed_target_files(&self) -> Result<BTreeSet<String>> {
        let roles = self.get_all_targets_roles()?;
        self.get_signed_target_files_of_roles(&roles)
    }

    /// All signed target paths with their custom data, merged across the given roles (all
    /// roles when `None`).
    pub fn get_signed_targets_with_custom_data(
        &self,
        roles: Option<&[String]>,
    ) -> Result<HashMap<String, HashMap<String, Value>>> {
        let roles = match roles {
            Some(roles) => roles.to_vec(),
            None => self.get_all_targets_roles()?,
        };
        let mut target_files: HashMap<String, HashMap<String, Value>> = HashMap::new();
        for role in roles {
            for (path, target) in self.get_targets_of_role(&role)? {
                target_files
                    .entry(path)
                    .or_default()
                    .extend(target.custom);
            }
        }
        Ok(target_files)
    }

    /// The custom data recorded for a target path.
    pub fn get_target_file_custom_data(&self, target_path: &str) -> Result<HashMap<String, Value>> {
        let role = self
            .get_role_from_target_paths(std::slice::from_ref(&target_path.to_string()))?
            .context(error::TargetUnknownSnafu { path: target_path })?;
        let targets = self.get_targets_of_role(&role)?;
        let target = targets
            .get(target_path)
            .context(error::TargetUnknownSnafu { path: target_path })?;
        Ok(target.custom.clone())
    }

    /// The digests recorded for a target path.
    pub fn get_target_file_hashes(&self, target_path: &str) -> Result<Hashes> {
        let role = self
            .get_role_from_target_paths(std::slice::from_ref(&target_path.to_string()))?
            .context(error::TargetUnknownSnafu { path: target_path })?;
        let targets = self.get_targets_of_role(&role)?;
        let target = targets
            .get(target_path)
            .context(error::TargetUnknownSnafu { path: target_path })?;
        Ok(target.hashes.clone())
    }

    /// Compares the on-disk targets tree with the signed state across all roles and returns
    /// the drift as `(added_or_modified, removed)`, directly usable as inputs to
    /// [`modify_targets`](Self::modify_targets).
    pub fn all_target_files_state(
        &self,
    ) -> Result<(BTreeMap<String, TargetUpdate>, BTreeSet<String>)> {
        let fs_target_files = self.all_target_files()?;
        let signed_target_files = self.get_signed_target_files()?;

        let mut added = BTreeMap::new();
        for file_name in &fs_target_files {
            let target_path = self.store.target_path(file_name);
            let bytes =
                std::fs::read(&target_path).context(error::FileReadSnafu { path: &target_path })?;
            let on_disk_sha256 = digest(&SHA256, &bytes).as_ref().to_vec();
            let recorded = self
                .get_target_file_hashes(file_name)
                .map(|hashes| hashes.sha256.bytes().to_vec())
                .ok();
            if recorded.as_deref() != Some(on_disk_sha256.as_slice()) {
                let custom = self.get_target_file_custom_data(file_name).ok();
                added.insert(
                    file_name.clone(),
                    TargetUpdate {
                        content: Some(TargetContent::Text(
                            String::from_utf8_lossy(&bytes).into_owned(),
                        )),
                        custom: custom.filter(|custom| !custom.is_empty()),
                    },
                );
            }
        }

        let removed = signed_target_files
            .difference(&fs_target_files)
            .cloned()
            .collect();
        Ok((added, removed))
    }

    /// Deletes on-disk files that fall under the given role's path patterns but are absent
    /// from that role's signed targets. Only the one role's tree is pruned.
    pub fn delete_unregistered_target_files(&mut self, targets_role: Option<&str>) -> Result<()> {
        let role = targets_role.unwrap_or("targets");
        let fs_target_files: Vec<String> = self.all_target_files()?.into_iter().collect();
        let by_role = self.roles_targets_for_filenames(&fs_target_files)?;
        let signed = self.get_targets_of_role(role)?;
        if let Some(files) = by_role.get(role) {
            for file in files {
                if !signed.contains_key(file) {
                    self.store.remove_target(file)?;
                }
            }
        }
        Ok(())
    }
}
