//! Key material variants and the primitive cipher bindings.
//!
//! The algorithm tag of a key is derived strictly from the shape of its
//! material: symmetric bytes map onto the AES-GCM family by length, RSA
//! halves onto RSA-OAEP, and P-521 halves onto ECDH-ES. Anything else is
//! rejected at construction time.

use aes_gcm::aead::generic_array::typenum::U12;
use aes_gcm::aead::Aead;
use aes_gcm::{AesGcm, KeyInit, Nonce};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Error, Result};

type Aes192Gcm = AesGcm<aes_gcm::aes::Aes192, U12>;

/// Standard GCM nonce length (bytes).
pub const AES_NONCE_LEN: usize = 12;

/// Encryption algorithm tag carried on keys and envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    A128Gcm,
    A192Gcm,
    A256Gcm,
    RsaOaep,
    EcdhEs,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::A128Gcm => "A128GCM",
            Algorithm::A192Gcm => "A192GCM",
            Algorithm::A256Gcm => "A256GCM",
            Algorithm::RsaOaep => "RSA-OAEP",
            Algorithm::EcdhEs => "ECDH-ES",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "A128GCM" => Ok(Algorithm::A128Gcm),
            "A192GCM" => Ok(Algorithm::A192Gcm),
            "A256GCM" => Ok(Algorithm::A256Gcm),
            "RSA-OAEP" => Ok(Algorithm::RsaOaep),
            "ECDH-ES" => Ok(Algorithm::EcdhEs),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The underlying material of a [`crate::Key`].
#[derive(Clone)]
pub(crate) enum KeyMaterial {
    Symmetric(Zeroizing<Vec<u8>>),
    RsaPublic(RsaPublicKey),
    RsaPrivate(RsaPrivateKey),
    EcdsaPublic(p521::PublicKey),
    EcdsaPrivate(p521::SecretKey),
}

impl KeyMaterial {
    pub(crate) fn symmetric(bytes: Vec<u8>) -> Result<Self> {
        symmetric_algorithm(bytes.len())?;
        Ok(KeyMaterial::Symmetric(Zeroizing::new(bytes)))
    }

    /// Algorithm tag implied by the material shape.
    pub(crate) fn algorithm(&self) -> Result<Algorithm> {
        match self {
            KeyMaterial::Symmetric(bytes) => symmetric_algorithm(bytes.len()),
            KeyMaterial::RsaPublic(_) | KeyMaterial::RsaPrivate(_) => Ok(Algorithm::RsaOaep),
            KeyMaterial::EcdsaPublic(_) | KeyMaterial::EcdsaPrivate(_) => Ok(Algorithm::EcdhEs),
        }
    }

    pub(crate) fn is_private(&self) -> bool {
        matches!(
            self,
            KeyMaterial::Symmetric(_)
                | KeyMaterial::RsaPrivate(_)
                | KeyMaterial::EcdsaPrivate(_)
        )
    }

    /// Zeroize the private portion of this material in place.
    ///
    /// Symmetric bytes are overwritten. Asymmetric private halves are
    /// replaced with their public half; the dropped private values zeroize
    /// their scalars on drop. Public material is left untouched.
    pub(crate) fn zeroize_private(&mut self) {
        match self {
            KeyMaterial::Symmetric(bytes) => bytes.zeroize(),
            KeyMaterial::RsaPrivate(private) => {
                let public = private.to_public_key();
                *self = KeyMaterial::RsaPublic(public);
            }
            KeyMaterial::EcdsaPrivate(private) => {
                let public = private.public_key();
                *self = KeyMaterial::EcdsaPublic(public);
            }
            KeyMaterial::RsaPublic(_) | KeyMaterial::EcdsaPublic(_) => {}
        }
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (KeyMaterial::Symmetric(a), KeyMaterial::Symmetric(b)) => a == b,
            (KeyMaterial::RsaPublic(a), KeyMaterial::RsaPublic(b)) => a == b,
            (KeyMaterial::RsaPrivate(a), KeyMaterial::RsaPrivate(b)) => a == b,
            (KeyMaterial::EcdsaPublic(a), KeyMaterial::EcdsaPublic(b)) => a == b,
            (KeyMaterial::EcdsaPrivate(a), KeyMaterial::EcdsaPrivate(b)) => {
                a.to_bytes() == b.to_bytes()
            }
            _ => false,
        }
    }
}

impl Eq for KeyMaterial {}

impl fmt::Debug for KeyMaterial {
    /// Never prints key material.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyMaterial::Symmetric(bytes) => return write!(f, "Symmetric({} bytes)", bytes.len()),
            KeyMaterial::RsaPublic(_) => "RsaPublic",
            KeyMaterial::RsaPrivate(_) => "RsaPrivate",
            KeyMaterial::EcdsaPublic(_) => "EcdsaPublic",
            KeyMaterial::EcdsaPrivate(_) => "EcdsaPrivate",
        };
        f.write_str(name)
    }
}

pub(crate) fn symmetric_algorithm(len: usize) -> Result<Algorithm> {
    match len {
        16 => Ok(Algorithm::A128Gcm),
        24 => Ok(Algorithm::A192Gcm),
        32 => Ok(Algorithm::A256Gcm),
        other => Err(Error::UnsupportedAlgorithm(format!(
            "unsupported symmetric key length {other}"
        ))),
    }
}

pub(crate) fn random_nonce() -> Result<[u8; AES_NONCE_LEN]> {
    let mut nonce = [0u8; AES_NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|err| Error::RandomSource(format!("failed to generate nonce: {err}")))?;
    Ok(nonce)
}

/// AES-GCM seal with the cipher variant selected by key length.
///
/// The returned ciphertext carries the 16-byte authentication tag at the end.
pub(crate) fn aes_seal(
    key: &[u8],
    nonce: &[u8; AES_NONCE_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let nonce = Nonce::from_slice(nonce);
    let sealed = match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .map_err(|err| Error::UnsupportedAlgorithm(err.to_string()))?
            .encrypt(nonce, plaintext),
        24 => Aes192Gcm::new_from_slice(key)
            .map_err(|err| Error::UnsupportedAlgorithm(err.to_string()))?
            .encrypt(nonce, plaintext),
        32 => Aes256Gcm::new_from_slice(key)
            .map_err(|err| Error::UnsupportedAlgorithm(err.to_string()))?
            .encrypt(nonce, plaintext),
        other => {
            return Err(Error::UnsupportedAlgorithm(format!(
                "unsupported symmetric key length {other}"
            )))
        }
    };
    sealed.map_err(|_| Error::Validation("AES-GCM encryption failed".into()))
}

/// AES-GCM open; tag rejection surfaces as a decryption failure.
pub(crate) fn aes_open(
    key: &[u8],
    nonce: &[u8; AES_NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let nonce = Nonce::from_slice(nonce);
    let opened = match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .map_err(|err| Error::UnsupportedAlgorithm(err.to_string()))?
            .decrypt(nonce, ciphertext),
        24 => Aes192Gcm::new_from_slice(key)
            .map_err(|err| Error::UnsupportedAlgorithm(err.to_string()))?
            .decrypt(nonce, ciphertext),
        32 => Aes256Gcm::new_from_slice(key)
            .map_err(|err| Error::UnsupportedAlgorithm(err.to_string()))?
            .decrypt(nonce, ciphertext),
        other => {
            return Err(Error::UnsupportedAlgorithm(format!(
                "unsupported symmetric key length {other}"
            )))
        }
    };
    opened.map_err(|_| Error::Decryption("AES-GCM authentication failed".into()))
}

/// RSA-OAEP (SHA-256, no label) encryption under a public key.
pub(crate) fn rsa_encrypt(key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    key.encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
        .map_err(|err| Error::Validation(format!("RSA-OAEP encryption failed: {err}")))
}

/// RSA-OAEP (SHA-256, no label) decryption; padding rejection surfaces as a
/// decryption failure.
pub(crate) fn rsa_decrypt(key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    key.decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map_err(|_| Error::Decryption("RSA-OAEP decryption failed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_lengths_map_to_gcm_variants() {
        assert_eq!(symmetric_algorithm(16).unwrap(), Algorithm::A128Gcm);
        assert_eq!(symmetric_algorithm(24).unwrap(), Algorithm::A192Gcm);
        assert_eq!(symmetric_algorithm(32).unwrap(), Algorithm::A256Gcm);
        assert!(matches!(
            symmetric_algorithm(20),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn algorithm_tags_roundtrip_as_strings() {
        for alg in [
            Algorithm::A128Gcm,
            Algorithm::A192Gcm,
            Algorithm::A256Gcm,
            Algorithm::RsaOaep,
            Algorithm::EcdhEs,
        ] {
            assert_eq!(alg.as_str().parse::<Algorithm>().unwrap(), alg);
        }
        assert!("A512GCM".parse::<Algorithm>().is_err());
    }

    #[test]
    fn aes_seal_open_roundtrip_all_lengths() {
        for len in [16usize, 24, 32] {
            let key = vec![0x42u8; len];
            let nonce = random_nonce().unwrap();
            let sealed = aes_seal(&key, &nonce, b"plaintext").unwrap();
            assert_eq!(sealed.len(), b"plaintext".len() + 16);
            let opened = aes_open(&key, &nonce, &sealed).unwrap();
            assert_eq!(opened, b"plaintext");
        }
    }

    #[test]
    fn aes_open_rejects_tampering() {
        let key = vec![7u8; 32];
        let nonce = random_nonce().unwrap();
        let mut sealed = aes_seal(&key, &nonce, b"data").unwrap();
        sealed[0] ^= 0x01;
        assert!(matches!(
            aes_open(&key, &nonce, &sealed),
            Err(Error::Decryption(_))
        ));
    }

    #[test]
    fn zeroize_private_keeps_public_material() {
        let mut symmetric = KeyMaterial::symmetric(vec![9u8; 32]).unwrap();
        symmetric.zeroize_private();
        match &symmetric {
            KeyMaterial::Symmetric(bytes) => assert!(bytes.iter().all(|b| *b == 0)),
            _ => panic!("symmetric material changed shape"),
        }

        let mut ec_private = KeyMaterial::EcdsaPrivate(p521::SecretKey::random(&mut OsRng));
        ec_private.zeroize_private();
        assert!(matches!(ec_private, KeyMaterial::EcdsaPublic(_)));
    }
}
