// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Staunch maintains a versioned, cryptographically signed metadata repository describing a
//! tree of target files, using a hierarchical threshold-signature trust model.
//!
//! The repository consists of four canonical roles (`root`, `targets`, `snapshot`,
//! `timestamp`) plus arbitrarily nested delegated targets roles, stored as canonical JSON
//! files under a `metadata/` directory, alongside the target files themselves under
//! `targets/`. [`MetadataRepository`] is the entry point: it bootstraps a repository from a
//! declarative [descriptor](descriptor::RolesKeysData), runs every mutation as an edit
//! transaction (bump version, refresh expiry, re-sign, write atomically), and cascades
//! snapshot and timestamp after each change so the meta-of-meta roles always reference the
//! current versions of everything below them.
//!
//! Signing is abstracted behind the [`Sign`](sign::Sign) capability; software keys loaded
//! from keystore files and PIN-gated hardware tokens (via a
//! [`TokenDriver`](token::TokenDriver)) both fit behind it.
//!
//! Network transport, filesystem access control, and key rotation policy are out of scope:
//! the repository directory is treated as a plain filesystem owned by a single writer, and
//! the surrounding transport (typically a git working tree) is expected to serialize writers.

#![deny(rust_2018_idioms)]
// missing_docs is on its own line to make it easy to comment out when making changes.
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc
)]

pub mod descriptor;
mod error;
mod repository;
pub mod schema;
pub mod sign;
mod store;
pub mod token;

pub use crate::error::{Error, Result};
pub use crate::repository::{
    expiration_interval, is_delegated_role, role_filename, KeyIdReport, KeyReport,
    MetadataRepository, TargetContent, TargetUpdate, MAIN_ROLES,
};
