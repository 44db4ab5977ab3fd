use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::key::{Algorithm, Key};

/// Content type carried by every envelope in this system.
pub const CONTENT_TYPE_JWK: &str = "jwk+json";

/// A serializable ciphertext carrier.
///
/// Envelopes hold the ciphertext together with the algorithm tag, the id of
/// the key that encrypted it, and (only on the AUK→master wrapping inside a
/// key set) the PBKDF2 salt and round count needed to re-derive the AUK.
/// All other envelopes omit `p2s`/`p2c`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Type of the wrapped content; always `jwk+json` in this system.
    #[serde(rename = "cty")]
    pub content_type: String,
    /// The ciphertext. For AES-GCM the 16-byte tag is embedded and the IV is
    /// carried separately in `iv`.
    #[serde(rename = "data")]
    pub encrypted_data: Vec<u8>,
    /// Initialization vector, present iff the algorithm is AES-GCM.
    #[serde(rename = "iv", default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<Vec<u8>>,
    /// Algorithm used to produce `encrypted_data`.
    #[serde(rename = "enc")]
    pub encryption_alg: Algorithm,
    /// Hint at which key was used to encrypt this envelope.
    #[serde(rename = "kid")]
    pub key_id: String,
    /// PBKDF2 salt header (16 bytes when present).
    #[serde(rename = "p2s", default, skip_serializing_if = "Option::is_none")]
    pub p2s: Option<Vec<u8>>,
    /// PBKDF2 round count header.
    #[serde(rename = "p2c", default, skip_serializing_if = "Option::is_none")]
    pub p2c: Option<u32>,
}

impl Envelope {
    /// Decrypt this envelope with `unwrapping_key` and parse the plaintext
    /// as a JWK, returning the reconstructed [`Key`].
    ///
    /// Fails with *key cleared* on a zeroized unwrapping key, *unsupported
    /// algorithm* on unusable unwrap material, *decryption failure* on tag
    /// or padding rejection, and *format error* on an unparseable JWK.
    pub fn unwrap_key(&self, unwrapping_key: &Key) -> Result<Key> {
        let data = zeroize::Zeroizing::new(unwrapping_key.decrypt(self)?);
        Key::from_jwk_bytes(&data)
    }
}
