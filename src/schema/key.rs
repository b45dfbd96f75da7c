// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Public key records as they appear in signed metadata, including the legacy key ID rule and
//! per-scheme signature verification.

use crate::error::{self, Result};
use crate::schema::decoded::{Decoded, Hex};
use aws_lc_rs::digest::{digest, SHA256};
use aws_lc_rs::signature::{UnparsedPublicKey, VerificationAlgorithm};
use olpc_cjson::CanonicalFormatter;
use pkcs8::der::Decode;
use pkcs8::spki::SubjectPublicKeyInfoRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_plain::{forward_display_to_serde, forward_from_str_to_serde};
use snafu::ResultExt;
use std::collections::HashMap;

/// A public key record. The key material is kept PEM-encoded, exactly as it appears in
/// metadata, so that key IDs computed over it are stable.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "keytype")]
pub enum Key {
    /// An RSA key.
    #[serde(rename = "rsa")]
    Rsa {
        /// The RSA key.
        keyval: RsaKey,
        /// Denotes the key's signature scheme.
        scheme: RsaScheme,
        /// Extra arguments found during deserialization; stored so the record round-trips
        /// byte-for-byte.
        #[serde(flatten)]
        _extra: HashMap<String, Value>,
    },
}

/// Signature schemes for RSA keys. Verification must use the key's declared scheme.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum RsaScheme {
    /// RSASSA-PSS with SHA-256, the default scheme.
    #[serde(rename = "rsassa-pss-sha256")]
    RsassaPssSha256,
    /// RSASSA-PKCS1-v1_5 with SHA-256, used by some hardware tokens.
    #[serde(rename = "rsa-pkcs1v15-sha256")]
    RsaPkcs1v15Sha256,
}

forward_display_to_serde!(RsaScheme);
forward_from_str_to_serde!(RsaScheme);

impl Default for RsaScheme {
    fn default() -> Self {
        RsaScheme::RsassaPssSha256
    }
}

/// Represents the `keyval` of an RSA key.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RsaKey {
    /// The public key, a PEM-encoded SubjectPublicKeyInfo document.
    pub public: String,

    /// Extra arguments found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl Key {
    /// Creates an RSA key record from a PEM-encoded public key.
    pub fn from_rsa_pem(public: &str, scheme: RsaScheme) -> Self {
        Key::Rsa {
            keyval: RsaKey {
                public: public.trim().to_string(),
                _extra: HashMap::new(),
            },
            scheme,
            _extra: HashMap::new(),
        }
    }

    /// The PEM-encoded public key of this record.
    pub fn public_pem(&self) -> &str {
        match self {
            Key::Rsa { keyval, .. } => &keyval.public,
        }
    }

    /// The signature scheme declared for this key.
    pub fn scheme(&self) -> RsaScheme {
        match self {
            Key::Rsa { scheme, .. } => *scheme,
        }
    }

    /// Calculates the key ID of this key.
    ///
    /// This is the single key ID routine for the whole crate: a SHA-256 digest over the
    /// canonical JSON form of the legacy public-key structure. Root-written key IDs and the
    /// key IDs carried on signatures must both come from here.
    pub fn key_id(&self) -> Result<Decoded<Hex>> {
        let Key::Rsa { keyval, scheme, .. } = self;
        let legacy = serde_json::json!({
            "keyid_hash_algorithms": ["sha256", "sha512"],
            "keytype": "rsa",
            "keyval": { "public": keyval.public.trim() },
            "scheme": scheme.to_string(),
        });
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, CanonicalFormatter::new());
        legacy
            .serialize(&mut ser)
            .context(error::JsonSerializationSnafu { what: "key ID" })?;
        Ok(digest(&SHA256, &buf).as_ref().to_vec().into())
    }

    /// Verifies the signature over a message using this key's declared scheme.
    pub fn verify(&self, msg: &[u8], signature: &[u8]) -> bool {
        let Key::Rsa { keyval, scheme, .. } = self;
        let der = match pkcs1_from_spki_pem(&keyval.public) {
            Ok(der) => der,
            Err(_) => return false,
        };
        let alg: &'static dyn VerificationAlgorithm = match scheme {
            RsaScheme::RsassaPssSha256 => &aws_lc_rs::signature::RSA_PSS_2048_8192_SHA256,
            RsaScheme::RsaPkcs1v15Sha256 => &aws_lc_rs::signature::RSA_PKCS1_2048_8192_SHA256,
        };
        UnparsedPublicKey::new(alg, &der).verify(msg, signature).is_ok()
    }
}

/// Extracts the PKCS#1 `RSAPublicKey` DER from a PEM-encoded SubjectPublicKeyInfo document.
pub(crate) fn pkcs1_from_spki_pem(public: &str) -> Result<Vec<u8>> {
    let pem = pem::parse(public).context(error::PemParseSnafu)?;
    snafu::ensure!(pem.tag() == "PUBLIC KEY", error::KeyUnrecognizedSnafu);
    let spki =
        SubjectPublicKeyInfoRef::from_der(pem.contents()).context(error::SpkiParseSnafu)?;
    Ok(spki.subject_public_key.raw_bytes().to_vec())
}
