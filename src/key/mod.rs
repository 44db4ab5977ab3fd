//! The polymorphic key handle.
//!
//! A [`Key`] is a uniform handle over symmetric bytes, RSA keypair halves,
//! and ECDSA keypair halves. Encrypt/decrypt/wrap/unwrap dispatch over the
//! material; construction derives the algorithm tag from the material shape.
//!
//! Lifecycle: a key is created by generation or by unwrapping, and enters a
//! terminal *cleared* state when [`Key::clear`] zeroizes it. Cleared keys
//! reject every cryptographic operation.

mod jwk;
mod material;

pub use material::{Algorithm, AES_NONCE_LEN};

use rand::rngs::OsRng;
use rand::RngCore;
use rsa::RsaPrivateKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::envelope::{Envelope, CONTENT_TYPE_JWK};
use crate::error::{Error, Result};
use jwk::Jwk;
use material::KeyMaterial;

/// Reserved key id for Account Unlock Keys.
pub const ACCOUNT_UNLOCK_KEY_ID: &str = "auk";

/// Length (bytes) of generated symmetric keys (master and vault keys).
pub const SYMMETRIC_KEY_LEN: usize = 32;

/// Modulus size (bits) of generated RSA encryption keypairs.
pub const RSA_BITS: usize = 2048;

/// Intended use of a key, carried in its JWK `use` member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUse {
    Encryption,
    Signature,
}

impl KeyUse {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyUse::Encryption => "enc",
            KeyUse::Signature => "sig",
        }
    }
}

impl fmt::Display for KeyUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key handle: identifier, use, algorithm tag, and the material itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub(crate) id: String,
    pub(crate) key_use: KeyUse,
    pub(crate) algorithm: Algorithm,
    pub(crate) material: KeyMaterial,
    pub(crate) cleared: bool,
}

impl Key {
    fn new(id: impl Into<String>, key_use: KeyUse, material: KeyMaterial) -> Result<Self> {
        let algorithm = material.algorithm()?;
        Ok(Self {
            id: id.into(),
            key_use,
            algorithm,
            material,
            cleared: false,
        })
    }

    /// Build a key from raw symmetric bytes (16, 24, or 32 of them).
    pub fn from_symmetric(
        id: impl Into<String>,
        bytes: Vec<u8>,
        key_use: KeyUse,
    ) -> Result<Self> {
        Self::new(id, key_use, KeyMaterial::symmetric(bytes)?)
    }

    /// Generate a random 32-byte symmetric key with a fresh uuid id.
    pub fn generate_symmetric() -> Result<Self> {
        let mut bytes = vec![0u8; SYMMETRIC_KEY_LEN];
        OsRng.try_fill_bytes(&mut bytes).map_err(|err| {
            Error::RandomSource(format!("failed to read random key bytes: {err}"))
        })?;
        Self::from_symmetric(Uuid::new_v4().to_string(), bytes, KeyUse::Encryption)
    }

    /// Generate an RSA-2048 encryption keypair as `(private, public)`.
    ///
    /// Both halves share one key id so an unwrapper can match them up.
    pub fn generate_rsa_pair() -> Result<(Self, Self)> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_BITS)
            .map_err(|err| Error::RandomSource(format!("failed to generate RSA key: {err}")))?;
        let public = private.to_public_key();
        let id = Uuid::new_v4().to_string();
        Ok((
            Self::new(id.clone(), KeyUse::Encryption, KeyMaterial::RsaPrivate(private))?,
            Self::new(id, KeyUse::Encryption, KeyMaterial::RsaPublic(public))?,
        ))
    }

    /// Generate a P-521 ECDSA keypair as `(private, public)`.
    ///
    /// Signing flows are reserved; the pair is generated and stored only.
    pub fn generate_ecdsa_pair() -> Result<(Self, Self)> {
        let private = p521::SecretKey::random(&mut OsRng);
        let public = private.public_key();
        let id = Uuid::new_v4().to_string();
        Ok((
            Self::new(id.clone(), KeyUse::Signature, KeyMaterial::EcdsaPrivate(private))?,
            Self::new(id, KeyUse::Signature, KeyMaterial::EcdsaPublic(public))?,
        ))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key_use(&self) -> KeyUse {
        self.key_use
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Whether this key holds private material (symmetric bytes count).
    pub fn is_private(&self) -> bool {
        self.material.is_private()
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// The raw symmetric bytes, if this is a symmetric key.
    pub fn symmetric_material(&self) -> Option<&[u8]> {
        match &self.material {
            KeyMaterial::Symmetric(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Zeroize the private portions of this key and mark it cleared.
    ///
    /// Symmetric bytes are overwritten with zeros; RSA and ECDSA private
    /// halves drop their secret scalars. For public keys this is a no-op that
    /// still marks the handle cleared. Cleared keys reject all further
    /// cryptographic operations and must be disposed of.
    pub fn clear(&mut self) {
        self.material.zeroize_private();
        self.cleared = true;
    }

    /// Encrypt `data` under this key.
    ///
    /// Symmetric keys seal with AES-GCM under a fresh random 12-byte nonce,
    /// returned in the envelope `iv` with the tagged ciphertext in `data`.
    /// RSA public keys encrypt with OAEP (SHA-256, no label) and carry no IV.
    /// Any other material fails with an unsupported-algorithm error.
    pub fn encrypt(&self, data: &[u8]) -> Result<Envelope> {
        if self.cleared {
            return Err(Error::KeyCleared);
        }
        match &self.material {
            KeyMaterial::Symmetric(key_bytes) => {
                let nonce = material::random_nonce()?;
                let sealed = material::aes_seal(key_bytes, &nonce, data)?;
                Ok(Envelope {
                    content_type: CONTENT_TYPE_JWK.into(),
                    encrypted_data: sealed,
                    iv: Some(nonce.to_vec()),
                    encryption_alg: self.algorithm,
                    key_id: self.id.clone(),
                    p2s: None,
                    p2c: None,
                })
            }
            KeyMaterial::RsaPublic(public) => {
                let encrypted = material::rsa_encrypt(public, data)?;
                Ok(Envelope {
                    content_type: CONTENT_TYPE_JWK.into(),
                    encrypted_data: encrypted,
                    iv: None,
                    encryption_alg: Algorithm::RsaOaep,
                    key_id: self.id.clone(),
                    p2s: None,
                    p2c: None,
                })
            }
            _ => Err(Error::UnsupportedAlgorithm(format!(
                "cannot use algorithm {:?} for encrypting",
                self.algorithm.as_str()
            ))),
        }
    }

    /// Serialize `value` as JSON and encrypt the bytes under this key.
    pub fn encrypt_json<T: Serialize>(&self, value: &T) -> Result<Envelope> {
        if self.cleared {
            return Err(Error::KeyCleared);
        }
        let data = Zeroizing::new(
            serde_json::to_vec(value)
                .map_err(|err| Error::Format(format!("failed to encode payload: {err}")))?,
        );
        self.encrypt(&data)
    }

    /// Decrypt an envelope produced by [`Key::encrypt`].
    ///
    /// Only the matching material shape succeeds: symmetric keys open
    /// AES-GCM envelopes (reconstituting `iv || data`), RSA private keys
    /// open OAEP envelopes. Authentication or padding failure surfaces as a
    /// decryption failure.
    pub fn decrypt(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        if self.cleared {
            return Err(Error::KeyCleared);
        }
        match &self.material {
            KeyMaterial::Symmetric(key_bytes) => {
                let iv = envelope
                    .iv
                    .as_deref()
                    .ok_or_else(|| Error::Format("AES-GCM envelope has no iv".into()))?;
                let nonce: [u8; AES_NONCE_LEN] = iv.try_into().map_err(|_| {
                    Error::Format(format!(
                        "AES-GCM iv must be {AES_NONCE_LEN} bytes, got {}",
                        iv.len()
                    ))
                })?;
                material::aes_open(key_bytes, &nonce, &envelope.encrypted_data)
            }
            KeyMaterial::RsaPrivate(private) => {
                material::rsa_decrypt(private, &envelope.encrypted_data)
            }
            _ => Err(Error::UnsupportedAlgorithm(format!(
                "cannot use algorithm {:?} for decrypting",
                self.algorithm.as_str()
            ))),
        }
    }

    /// Decrypt an envelope and parse the plaintext as JSON.
    pub fn decrypt_json<T: DeserializeOwned>(&self, envelope: &Envelope) -> Result<T> {
        let data = Zeroizing::new(self.decrypt(envelope)?);
        serde_json::from_slice(&data)
            .map_err(|err| Error::Format(format!("failed to decode payload: {err}")))
    }

    /// Wrap this key under `wrapping_key`.
    ///
    /// The canonical JWK form of this key is encrypted with the encrypt
    /// rules above; the envelope's key id is the *wrapping* key's id so a
    /// holder of many keys can route to the right one without trial
    /// decryption.
    pub fn wrap(&self, wrapping_key: &Key) -> Result<Envelope> {
        if self.cleared {
            return Err(Error::KeyCleared);
        }
        let jwk = Jwk::from_key(self)?;
        let blob = Zeroizing::new(
            serde_json::to_vec(&jwk)
                .map_err(|err| Error::Format(format!("failed to encode JWK: {err}")))?,
        );
        wrapping_key.encrypt(&blob)
    }

    pub(crate) fn from_jwk_bytes(data: &[u8]) -> Result<Self> {
        let jwk: Jwk = serde_json::from_slice(data)
            .map_err(|err| Error::Format(format!("failed to parse JWK: {err}")))?;
        jwk.into_key()
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let jwk = Jwk::from_key(self).map_err(serde::ser::Error::custom)?;
        jwk.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let jwk = Jwk::deserialize(deserializer)?;
        jwk.into_key().map_err(serde::de::Error::custom)
    }
}
