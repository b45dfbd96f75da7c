// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provides the `Sign` trait which abstracts over the method of signing with different key
//! types: software keys loaded from a keystore file, and keys held on a hardware token.

use crate::error::{self, Result};
use crate::schema::decoded::{Decoded, Hex};
use crate::schema::key::{Key, RsaScheme};
use crate::token::TokenDriver;
use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::signature::RsaKeyPair;
use pkcs8::der::Decode;
use snafu::{ensure, OptionExt, ResultExt};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A signing capability: one operation that produces a raw signature over a payload, plus
/// access to the public key record so callers can derive the key ID.
pub trait Sign: Send + Sync {
    /// Returns the public key record for this signer.
    fn public_key(&self) -> &Key;

    /// Signs the supplied message.
    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>>;

    /// The key ID of this signer's public key.
    fn key_id(&self) -> Result<Decoded<Hex>> {
        self.public_key().key_id()
    }
}

impl<T: Sign + ?Sized> Sign for Arc<T> {
    fn public_key(&self) -> &Key {
        (**self).public_key()
    }

    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>> {
        (**self).sign(msg)
    }
}

/// A signer that owns an RSA private key and signs locally.
pub struct SoftwareSigner {
    key_pair: RsaKeyPair,
    key: Key,
}

impl fmt::Debug for SoftwareSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareSigner")
            .field("key", &self.key)
            .finish()
    }
}

impl SoftwareSigner {
    /// Creates a signer from a PEM-encoded private key and its PEM-encoded public key. If a
    /// password is given, the private key is treated as an encrypted PKCS#8 document.
    pub fn from_pem(
        private_pem: &[u8],
        public_pem: &str,
        scheme: RsaScheme,
        password: Option<&str>,
    ) -> Result<Self> {
        let key_pair = parse_keypair(private_pem, password)?;
        Ok(SoftwareSigner {
            key_pair,
            key: Key::from_rsa_pem(public_pem, scheme),
        })
    }

    /// Creates a signer from a keystore directory holding `<name>` (the private key PEM) and
    /// `<name>.pub` (the public key PEM).
    pub fn from_keystore<P>(
        keystore: P,
        name: &str,
        scheme: RsaScheme,
        password: Option<&str>,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let keystore = keystore.as_ref();
        let private_path = keystore.join(name);
        let public_path = keystore.join(format!("{}.pub", name));
        let private_pem = std::fs::read(&private_path).context(error::KeystoreReadSnafu {
            path: &private_path,
        })?;
        let public_pem = std::fs::read_to_string(&public_path)
            .context(error::KeystoreReadSnafu { path: &public_path })?;
        Self::from_pem(&private_pem, &public_pem, scheme, password)
    }
}

impl Sign for SoftwareSigner {
    fn public_key(&self) -> &Key {
        &self.key
    }

    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>> {
        let padding: &'static dyn aws_lc_rs::signature::RsaEncoding = match self.key.scheme() {
            RsaScheme::RsassaPssSha256 => &aws_lc_rs::signature::RSA_PSS_SHA256,
            RsaScheme::RsaPkcs1v15Sha256 => &aws_lc_rs::signature::RSA_PKCS1_SHA256,
        };
        let rng = SystemRandom::new();
        let mut signature = vec![0; self.key_pair.public_modulus_len()];
        self.key_pair
            .sign(padding, &rng, msg, &mut signature)
            .context(error::SignSnafu)?;
        Ok(signature)
    }
}

/// Decrypts an encrypted PKCS#8 private key document using the given password, returning the
/// plain PKCS#8 DER.
pub fn decrypt_key(encrypted_der: &[u8], password: &str) -> Result<Vec<u8>> {
    let encrypted = pkcs8::EncryptedPrivateKeyInfo::from_der(encrypted_der)
        .map_err(|_| error::KeyDecryptSnafu.build())?;
    let decrypted = encrypted
        .decrypt(password.as_bytes())
        .map_err(|_| error::KeyDecryptSnafu.build())?;
    Ok(decrypted.as_bytes().to_vec())
}

/// Parses a PEM-encoded RSA private key, decrypting it first when a password is supplied.
/// Accepted forms: PKCS#8 (`PRIVATE KEY`), encrypted PKCS#8 (`ENCRYPTED PRIVATE KEY`), and
/// PKCS#1 (`RSA PRIVATE KEY`).
pub fn parse_keypair(key: &[u8], password: Option<&str>) -> Result<RsaKeyPair> {
    let pem = pem::parse(key).context(error::PemParseSnafu)?;
    match pem.tag() {
        "PRIVATE KEY" => {
            RsaKeyPair::from_pkcs8(pem.contents()).context(error::KeyRejectedSnafu)
        }
        "ENCRYPTED PRIVATE KEY" => {
            let password = password.context(error::KeyDecryptSnafu)?;
            let decrypted = decrypt_key(pem.contents(), password)?;
            RsaKeyPair::from_pkcs8(&decrypted).context(error::KeyRejectedSnafu)
        }
        "RSA PRIVATE KEY" => {
            RsaKeyPair::from_der(pem.contents()).context(error::KeyRejectedSnafu)
        }
        _ => error::KeyUnrecognizedSnafu.fail(),
    }
}

/// A callback that produces the token PIN on demand. The engine never stores PINs; the handler
/// may prompt, read an agent, or cache internally.
pub type SecretsHandler = Box<dyn Fn() -> Result<String> + Send + Sync>;

/// A signer backed by a hardware token. It holds only the public key; signing is dispatched to
/// the token driver with a PIN obtained lazily from the secrets handler on each call.
pub struct HardwareSigner {
    key: Key,
    serial_number: String,
    key_name: String,
    secrets_handler: SecretsHandler,
    driver: Arc<dyn TokenDriver>,
}

impl fmt::Debug for HardwareSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HardwareSigner")
            .field("key", &self.key)
            .field("serial_number", &self.serial_number)
            .field("key_name", &self.key_name)
            .finish()
    }
}

impl HardwareSigner {
    /// Creates a hardware signer for the token with the given serial number.
    pub fn new(
        key: Key,
        serial_number: &str,
        key_name: &str,
        secrets_handler: SecretsHandler,
        driver: Arc<dyn TokenDriver>,
    ) -> Self {
        HardwareSigner {
            key,
            serial_number: serial_number.to_string(),
            key_name: key_name.to_string(),
            secrets_handler,
            driver,
        }
    }

    /// The serial number of the backing token.
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// The keystore name assigned to this key.
    pub fn key_name(&self) -> &str {
        &self.key_name
    }
}

impl Sign for HardwareSigner {
    fn public_key(&self) -> &Key {
        &self.key
    }

    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>> {
        ensure!(self.driver.is_inserted()?, error::TokenNotInsertedSnafu);
        let pin = (self.secrets_handler)()?;
        self.driver
            .sign(&self.serial_number, msg, &pin, self.key.scheme())
    }
}
