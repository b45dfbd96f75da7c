// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The interface presented by a hardware token driver. The engine only ever sees this trait
//! (wrapped in a [`HardwareSigner`](crate::sign::HardwareSigner)); applet interaction, PIN
//! policy, and slot management all live behind it.

use crate::error::Result;
use crate::schema::key::{Key, RsaScheme};
use std::path::{Path, PathBuf};

/// Operations a hardware token driver must provide.
///
/// Implementations should surface failures as
/// [`Error::HardwareToken`](crate::Error::HardwareToken),
/// [`Error::TokenNotInserted`](crate::Error::TokenNotInserted), or
/// [`Error::TokenPinRejected`](crate::Error::TokenPinRejected) so that callers can distinguish
/// retry-able conditions from hard failures.
pub trait TokenDriver: Send + Sync {
    /// Exports the PEM-encoded public key of the token with the given serial number.
    fn export_public_key(&self, serial: &str) -> Result<String>;

    /// Signs a payload on the token, unlocking it with the given PIN. The signature scheme is
    /// the one declared in the key record being signed for.
    fn sign(&self, serial: &str, payload: &[u8], pin: &str, scheme: RsaScheme) -> Result<Vec<u8>>;

    /// Whether a token is currently inserted.
    fn is_inserted(&self) -> Result<bool>;

    /// Serial numbers of all currently reachable tokens.
    fn serials(&self) -> Result<Vec<String>>;

    /// Generates a fresh keypair on the token and returns its public key record.
    fn setup_new(&self, serial: &str, scheme: RsaScheme, key_size: u32) -> Result<Key>;

    /// Writes the token key's X.509 certificate into `dir` as `<keyid>.cert` and returns the
    /// written path.
    fn export_cert(&self, dir: &Path, serial: &str) -> Result<PathBuf>;
}
