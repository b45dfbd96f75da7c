// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contains the error type for this library.

#![allow(clippy::default_trait_access)]

use snafu::Snafu;
use std::path::PathBuf;

/// Alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for this library.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// A role metadata file was expected on disk but is not there.
    #[snafu(display("Metadata file for role '{}' does not exist: {}", role, path.display()))]
    MetadataMissing {
        /// The role whose file is missing.
        role: String,
        /// The expected location of the file.
        path: PathBuf,
    },

    /// A role metadata file exists but cannot be parsed.
    #[snafu(display("Failed to parse metadata file {}: {}", path.display(), source))]
    MetadataCorrupt {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying parse error.
        source: serde_json::Error,
    },

    /// A file could not be read.
    #[snafu(display("Failed to read {}: {}", path.display(), source))]
    FileRead {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// A file could not be written.
    #[snafu(display("Failed to write to {}: {}", path.display(), source))]
    FileWrite {
        /// The file that could not be written.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// A temporary sibling file could not be created for an atomic write.
    #[snafu(display("Failed to create temporary file in {}: {}", path.display(), source))]
    FileTempCreate {
        /// The directory the temporary file was created in.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// A temporary file could not be renamed over its destination.
    #[snafu(display("Failed to persist temporary file to {}: {}", path.display(), source))]
    FilePersist {
        /// The destination of the rename.
        path: PathBuf,
        /// The underlying rename error.
        source: tempfile::PersistError,
    },

    /// A file or directory could not be removed.
    #[snafu(display("Failed to remove {}: {}", path.display(), source))]
    FileRemove {
        /// The path that could not be removed.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// A directory could not be created.
    #[snafu(display("Failed to create directory '{}': {}", path.display(), source))]
    DirCreate {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// A directory tree could not be traversed.
    #[snafu(display("Failed to walk directory tree '{}': {}", directory.display(), source))]
    WalkDir {
        /// The root of the traversal.
        directory: PathBuf,
        /// The underlying traversal error.
        source: walkdir::Error,
    },

    /// A path under the targets directory is not valid UTF-8.
    #[snafu(display("Path {} is not valid UTF-8", path.display()))]
    PathUtf8 {
        /// The offending path.
        path: PathBuf,
    },

    /// A value could not be serialized to JSON.
    #[snafu(display("Failed to serialize {} to JSON: {}", what, source))]
    JsonSerialization {
        /// What was being serialized.
        what: String,
        /// The underlying serialization error.
        source: serde_json::Error,
    },

    /// A signer was offered for a role that does not list its key.
    #[snafu(display("Signer's key is not a valid signing key for role '{}'", role))]
    InvalidKey {
        /// The role the signer was offered for.
        role: String,
    },

    /// The signer cache holds no signers for a role that must be re-signed.
    #[snafu(display("No signers available for role '{}'", role))]
    SigningKeysMissing {
        /// The role lacking signers.
        role: String,
    },

    /// Fewer of the role's descriptor keys signed than the descriptor's threshold requires.
    #[snafu(display(
        "Role '{}' was signed by {} of its keys but requires {}",
        role,
        count,
        threshold
    ))]
    ThresholdNotMet {
        /// The role being signed.
        role: String,
        /// How many authorized keys signed.
        count: u64,
        /// The role's threshold.
        threshold: u64,
    },

    /// Root metadata carries no descriptor for a canonical role.
    #[snafu(display("Root metadata does not define role '{}'", role))]
    RoleNotInRoot {
        /// The undefined role.
        role: String,
    },

    /// A role is not defined anywhere in the delegation tree.
    #[snafu(display("Role '{}' not found in the delegation tree", name))]
    RoleNotFound {
        /// The undefined role.
        name: String,
    },

    /// A targets modification was requested with nothing to add and nothing to remove.
    #[snafu(display("Nothing to be modified"))]
    NothingToModify,

    /// The paths of one targets modification are signed by more than one role.
    #[snafu(display("Target paths do not map to a single signing role: {}", paths.join(", ")))]
    MixedRoles {
        /// The offending paths.
        paths: Vec<String>,
    },

    /// A target path is not recorded in any role's signed targets.
    #[snafu(display("Target '{}' is not signed by any role", path))]
    TargetUnknown {
        /// The unknown target path.
        path: String,
    },

    /// A path expected to be a target file is not a regular file.
    #[snafu(display("Target {} is not a file", path.display()))]
    TargetNotAFile {
        /// The offending path.
        path: PathBuf,
    },

    /// The hardware token driver reported a failure.
    #[snafu(display("Hardware token error: {}", message))]
    HardwareToken {
        /// The driver's description of the failure.
        message: String,
    },

    /// No hardware token is inserted. Retry-able: the caller may prompt and try again.
    #[snafu(display("Hardware token is not inserted"))]
    TokenNotInserted,

    /// The hardware token rejected the PIN. Retry-able at the caller level.
    #[snafu(display("Hardware token rejected the PIN"))]
    TokenPinRejected,

    /// A keystore file could not be read.
    #[snafu(display("Failed to read keystore file {}: {}", path.display(), source))]
    KeystoreRead {
        /// The keystore file.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// A PEM document could not be parsed.
    #[snafu(display("Invalid PEM document: {}", source))]
    PemParse {
        /// The underlying parse error.
        source: pem::PemError,
    },

    /// A public key's SubjectPublicKeyInfo encoding could not be parsed.
    #[snafu(display("Invalid public key encoding: {}", source))]
    SpkiParse {
        /// The underlying DER error.
        source: pkcs8::der::Error,
    },

    /// A private key is in none of the accepted formats.
    #[snafu(display("Unrecognized private key format"))]
    KeyUnrecognized,

    /// A private key parsed but was rejected by the crypto backend.
    #[snafu(display("Private key rejected: {}", source))]
    KeyRejected {
        /// The backend's rejection reason.
        source: aws_lc_rs::error::KeyRejected,
    },

    /// An encrypted private key could not be decrypted.
    #[snafu(display("Failed to decrypt private key (wrong password or corrupt key)"))]
    KeyDecrypt,

    /// The crypto backend failed to produce a signature.
    #[snafu(display("Failed to sign message"))]
    Sign {
        /// The backend's error.
        source: aws_lc_rs::error::Unspecified,
    },

    /// A key's recorded ID does not match the ID computed from its material.
    #[snafu(display("Invalid key ID {}, calculated {}", keyid, calculated))]
    InvalidKeyId {
        /// The recorded key ID.
        keyid: String,
        /// The computed key ID.
        calculated: String,
    },

    /// The same key ID appears twice in one key dictionary.
    #[snafu(display("Duplicate key ID {}", keyid))]
    DuplicateKeyId {
        /// The duplicated key ID.
        keyid: String,
    },

    /// A hex string could not be decoded.
    #[snafu(display("Invalid hex string: {}", source))]
    HexDecode {
        /// The underlying decode error.
        source: hex::FromHexError,
    },

    /// A role's version counter cannot be incremented further.
    #[snafu(display("Version number overflow for role '{}'", role))]
    VersionOverflow {
        /// The role at the counter limit.
        role: String,
    },

    /// Repository creation was attempted over an existing metadata directory.
    #[snafu(display("Metadata directory {} already exists", path.display()))]
    RepositoryExists {
        /// The existing directory.
        path: PathBuf,
    },

    /// Repository creation found no keys for a role named in the descriptor.
    #[snafu(display("Cannot set up role '{}': keys not specified", role))]
    RoleKeysNotSpecified {
        /// The role without keys.
        role: String,
    },
}
