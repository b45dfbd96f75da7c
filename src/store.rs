// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The on-disk metadata store: role files under `metadata/`, target files under `targets/`,
//! and token certificates under `certs/`. Every metadata write goes through a temporary
//! sibling file and an atomic rename, so concurrent readers never observe a partial file.

use crate::error::{self, Result};
use crate::schema::{canonical_bytes, Role, Signed};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use snafu::{ensure, ResultExt};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

pub(crate) const METADATA_DIRECTORY_NAME: &str = "metadata";
pub(crate) const TARGETS_DIRECTORY_NAME: &str = "targets";
pub(crate) const CERTS_DIRECTORY_NAME: &str = "certs";

/// Filesystem layout of a single repository.
#[derive(Debug, Clone)]
pub(crate) struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub(crate) fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn metadata_dir(&self) -> PathBuf {
        self.path.join(METADATA_DIRECTORY_NAME)
    }

    pub(crate) fn targets_dir(&self) -> PathBuf {
        self.path.join(TARGETS_DIRECTORY_NAME)
    }

    /// The certificates directory, created on first use.
    pub(crate) fn certs_dir(&self) -> Result<PathBuf> {
        let dir = self.path.join(CERTS_DIRECTORY_NAME);
        std::fs::create_dir_all(&dir).context(error::DirCreateSnafu { path: &dir })?;
        Ok(dir)
    }

    pub(crate) fn role_path(&self, role: &str) -> PathBuf {
        self.metadata_dir().join(format!("{}.json", role))
    }

    pub(crate) fn role_exists(&self, role: &str) -> bool {
        self.role_path(role).is_file()
    }

    /// Reads and parses a role metadata file.
    pub(crate) fn load<T>(&self, role: &str) -> Result<Signed<T>>
    where
        T: DeserializeOwned,
    {
        let path = self.role_path(role);
        ensure!(
            path.is_file(),
            error::MetadataMissingSnafu { role, path: &path }
        );
        let buf = std::fs::read(&path).context(error::FileReadSnafu { path: &path })?;
        serde_json::from_slice(&buf).context(error::MetadataCorruptSnafu { path })
    }

    /// Writes a signed role to `metadata/<role>.json` in canonical JSON.
    pub(crate) fn write_role<T>(&self, role: &str, signed: &Signed<T>) -> Result<()>
    where
        T: Role + Serialize,
    {
        let bytes = canonical_bytes(signed, "signed metadata")?;
        self.atomic_write(&self.role_path(role), &bytes)
    }

    /// Writes the version-prefixed history copy of a role, `metadata/<N>.<role>.json`. Only
    /// root is written this way, so that historical root versions stay verifiable.
    pub(crate) fn write_versioned_role<T>(&self, role: &str, signed: &Signed<T>) -> Result<()>
    where
        T: Role + Serialize,
    {
        let bytes = canonical_bytes(signed, "signed metadata")?;
        let path = self
            .metadata_dir()
            .join(format!("{}.{}.json", signed.signed.version(), role));
        self.atomic_write(&path, &bytes)
    }

    fn atomic_write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        // role paths always live under the metadata directory
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).context(error::DirCreateSnafu { path: parent })?;
        let mut tmp =
            NamedTempFile::new_in(parent).context(error::FileTempCreateSnafu { path: parent })?;
        tmp.write_all(bytes)
            .context(error::FileWriteSnafu { path })?;
        tmp.persist(path)
            .context(error::FilePersistSnafu { path })?;
        debug!("wrote '{}'", path.display());
        Ok(())
    }

    pub(crate) fn target_path(&self, name: &str) -> PathBuf {
        self.targets_dir().join(name.trim_start_matches('/'))
    }

    /// Writes a target file, creating parent directories as needed.
    pub(crate) fn write_target_file(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.target_path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context(error::DirCreateSnafu { path: parent })?;
        }
        std::fs::write(&path, bytes).context(error::FileWriteSnafu { path: &path })?;
        Ok(path)
    }

    /// Creates an empty target file if nothing exists at the path yet.
    pub(crate) fn touch_target_file(&self, name: &str) -> Result<PathBuf> {
        let path = self.target_path(name);
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).context(error::DirCreateSnafu { path: parent })?;
            }
            std::fs::write(&path, b"").context(error::FileWriteSnafu { path: &path })?;
        }
        Ok(path)
    }

    /// Removes the target file or directory at the path, if present.
    pub(crate) fn remove_target(&self, name: &str) -> Result<()> {
        let path = self.target_path(name);
        if path.is_dir() {
            debug!("removing target directory '{}'", path.display());
            std::fs::remove_dir_all(&path).context(error::FileRemoveSnafu { path })?;
        } else if path.is_file() {
            debug!("removing target file '{}'", path.display());
            std::fs::remove_file(&path).context(error::FileRemoveSnafu { path })?;
        }
        Ok(())
    }

    /// Relative POSIX paths of every file under the targets directory.
    pub(crate) fn all_target_files(&self) -> Result<BTreeSet<String>> {
        let base = self.targets_dir();
        let mut files = BTreeSet::new();
        if !base.is_dir() {
            return Ok(files);
        }
        for entry in WalkDir::new(&base) {
            let entry = entry.context(error::WalkDirSnafu { directory: &base })?;
            if !entry.file_type().is_file() {
                continue;
            }
            // walkdir yields paths under its root, so the prefix always strips
            let relative = match entry.path().strip_prefix(&base) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            let mut components = Vec::new();
            for component in relative.components() {
                let part = component
                    .as_os_str()
                    .to_str()
                    .ok_or_else(|| error::PathUtf8Snafu { path: entry.path() }.build())?;
                components.push(part);
            }
            files.insert(components.join("/"));
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::MetadataStore;
    use crate::error::Error;
    use crate::schema::{Snapshot, Targets};
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn load_missing_role() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path());
        match store.load::<Snapshot>("snapshot") {
            Err(Error::MetadataMissing { role, .. }) => assert_eq!(role, "snapshot"),
            other => panic!("expected MetadataMissing, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn load_corrupt_role() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path());
        std::fs::create_dir_all(store.metadata_dir()).unwrap();
        std::fs::write(store.role_path("targets"), b"{ not json").unwrap();
        assert!(matches!(
            store.load::<Targets>("targets"),
            Err(Error::MetadataCorrupt { .. })
        ));
    }

    #[test]
    fn target_file_lifecycle() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path());
        store.write_target_file("dir1/a.txt", b"hello").unwrap();
        store.touch_target_file("dir1/b.txt").unwrap();
        assert_eq!(
            store.all_target_files().unwrap().into_iter().collect::<Vec<_>>(),
            vec!["dir1/a.txt".to_string(), "dir1/b.txt".to_string()]
        );
        store.remove_target("dir1/a.txt").unwrap();
        store.remove_target("dir1").unwrap();
        assert!(store.all_target_files().unwrap().is_empty());
        // removing something that is already gone is fine
        store.remove_target("dir1/a.txt").unwrap();
    }

    #[test]
    fn write_is_atomic_rename() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path());
        let snapshot = crate::schema::Signed {
            signed: Snapshot::new(1, Utc::now()),
            signatures: Vec::new(),
        };
        store.write_role("snapshot", &snapshot).unwrap();
        // no temporary siblings left behind
        let leftovers: Vec<_> = std::fs::read_dir(store.metadata_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|name| name != "snapshot.json")
            .collect();
        assert!(leftovers.is_empty(), "leftover files: {:?}", leftovers);
    }
}
