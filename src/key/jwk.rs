//! Canonical JWK (JSON Web Key) representation.
//!
//! Wrap/unwrap round-trips serialize keys through this form, so it must stay
//! stable: `kty`, `use`, `alg`, `kid` plus the algorithm-specific members
//! (`k` for symmetric, `n`/`e`/`d`/`p`/`q`/`dp`/`dq`/`qi` for RSA,
//! `crv`/`x`/`y`/`d` for ECDSA), every binary member base64url-encoded
//! without padding. On ingest the algorithm is inferred from the material
//! shape, not trusted from `alg`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p521::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::material::KeyMaterial;
use super::{Key, KeyUse};
use crate::error::{Error, Result};

/// P-521 field element width (bytes) for the `x`/`y`/`d` members.
const P521_FIELD_LEN: usize = 66;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Jwk {
    kty: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alg: Option<String>,
    #[serde(default)]
    kid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    k: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    e: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    p: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dq: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    qi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y: Option<String>,
}

fn b64(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn b64_decode(field: &str, value: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|err| Error::Format(format!("bad base64url in JWK member {field:?}: {err}")))
}

fn b64_uint(field: &str, value: &Option<String>) -> Result<BigUint> {
    let value = value
        .as_deref()
        .ok_or_else(|| Error::Format(format!("JWK is missing member {field:?}")))?;
    Ok(BigUint::from_bytes_be(&b64_decode(field, value)?))
}

fn required<'a>(field: &str, value: &'a Option<String>) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| Error::Format(format!("JWK is missing member {field:?}")))
}

impl Jwk {
    pub(crate) fn from_key(key: &Key) -> Result<Self> {
        if key.cleared {
            return Err(Error::KeyCleared);
        }

        let mut jwk = Jwk {
            kty: String::new(),
            key_use: Some(key.key_use.as_str().to_string()),
            alg: Some(key.algorithm.as_str().to_string()),
            kid: key.id.clone(),
            k: None,
            n: None,
            e: None,
            d: None,
            p: None,
            q: None,
            dp: None,
            dq: None,
            qi: None,
            crv: None,
            x: None,
            y: None,
        };

        match &key.material {
            KeyMaterial::Symmetric(bytes) => {
                jwk.kty = "oct".into();
                jwk.k = Some(b64(bytes));
            }
            KeyMaterial::RsaPublic(public) => {
                jwk.kty = "RSA".into();
                fill_rsa_public(&mut jwk, public);
            }
            KeyMaterial::RsaPrivate(private) => {
                jwk.kty = "RSA".into();
                fill_rsa_public(&mut jwk, &private.to_public_key());
                jwk.d = Some(b64(private.d().to_bytes_be()));
                let primes = private.primes();
                if primes.len() != 2 {
                    return Err(Error::Format(format!(
                        "unsupported multi-prime RSA key ({} primes)",
                        primes.len()
                    )));
                }
                jwk.p = Some(b64(primes[0].to_bytes_be()));
                jwk.q = Some(b64(primes[1].to_bytes_be()));
                fill_rsa_crt(&mut jwk, private)?;
            }
            KeyMaterial::EcdsaPublic(public) => {
                jwk.kty = "EC".into();
                fill_ec_public(&mut jwk, public)?;
            }
            KeyMaterial::EcdsaPrivate(private) => {
                jwk.kty = "EC".into();
                fill_ec_public(&mut jwk, &private.public_key())?;
                jwk.d = Some(b64(private.to_bytes()));
            }
        }

        Ok(jwk)
    }

    pub(crate) fn into_key(self) -> Result<Key> {
        let material = match self.kty.as_str() {
            "oct" => {
                let bytes = Zeroizing::new(b64_decode("k", required("k", &self.k)?)?);
                KeyMaterial::symmetric(bytes.to_vec())?
            }
            "RSA" => {
                let n = b64_uint("n", &self.n)?;
                let e = b64_uint("e", &self.e)?;
                if self.d.is_some() {
                    let d = b64_uint("d", &self.d)?;
                    let p = b64_uint("p", &self.p)?;
                    let q = b64_uint("q", &self.q)?;
                    // The transported dp/dq/qi members are accepted but not
                    // trusted: from_components re-derives the CRT parameters
                    // from the validated factors.
                    let private = RsaPrivateKey::from_components(n, e, d, vec![p, q])
                        .map_err(|err| Error::Format(format!("invalid RSA JWK: {err}")))?;
                    KeyMaterial::RsaPrivate(private)
                } else {
                    let public = RsaPublicKey::new(n, e)
                        .map_err(|err| Error::Format(format!("invalid RSA JWK: {err}")))?;
                    KeyMaterial::RsaPublic(public)
                }
            }
            "EC" => {
                let crv = required("crv", &self.crv)?;
                if crv != "P-521" {
                    return Err(Error::UnsupportedAlgorithm(format!(
                        "unsupported JWK curve {crv:?}"
                    )));
                }
                if let Some(d) = &self.d {
                    let scalar = Zeroizing::new(b64_decode("d", d)?);
                    let private = p521::SecretKey::from_slice(&scalar)
                        .map_err(|_| Error::Format("invalid P-521 private scalar".into()))?;
                    KeyMaterial::EcdsaPrivate(private)
                } else {
                    let x = field_element("x", &self.x)?;
                    let y = field_element("y", &self.y)?;
                    let point = p521::EncodedPoint::from_affine_coordinates(
                        p521::FieldBytes::from_slice(&x),
                        p521::FieldBytes::from_slice(&y),
                        false,
                    );
                    let public = Option::<p521::PublicKey>::from(
                        p521::PublicKey::from_encoded_point(&point),
                    )
                    .ok_or_else(|| Error::Format("invalid P-521 public key".into()))?;
                    KeyMaterial::EcdsaPublic(public)
                }
            }
            other => {
                return Err(Error::UnsupportedAlgorithm(format!(
                    "unsupported JWK key type {other:?}"
                )))
            }
        };

        // The algorithm tag is re-derived from the material, never trusted
        // from the serialized form.
        let algorithm = material.algorithm()?;
        let key_use = match self.key_use.as_deref() {
            Some("sig") => KeyUse::Signature,
            _ => KeyUse::Encryption,
        };

        Ok(Key {
            id: self.kid,
            key_use,
            algorithm,
            material,
            cleared: false,
        })
    }
}

fn fill_rsa_public(jwk: &mut Jwk, public: &RsaPublicKey) {
    jwk.n = Some(b64(public.n().to_bytes_be()));
    jwk.e = Some(b64(public.e().to_bytes_be()));
}

/// Emit the CRT members (`dp`, `dq`, `qi`) of the canonical RSA private JWK.
fn fill_rsa_crt(jwk: &mut Jwk, private: &RsaPrivateKey) -> Result<()> {
    let mut precomputed = private.clone();
    precomputed
        .precompute()
        .map_err(|err| Error::Format(format!("invalid RSA private key: {err}")))?;

    let dp = precomputed
        .dp()
        .ok_or_else(|| Error::Format("RSA private key has no dp value".into()))?;
    let dq = precomputed
        .dq()
        .ok_or_else(|| Error::Format("RSA private key has no dq value".into()))?;
    let qinv = precomputed
        .qinv()
        .ok_or_else(|| Error::Format("RSA private key has no CRT coefficient".into()))?;
    // The CRT coefficient is stored signed; lift a negative representative
    // into [0, p) for the unsigned JWK member.
    let qi = qinv.to_biguint().unwrap_or_else(|| {
        let magnitude = BigUint::from_bytes_be(&qinv.to_bytes_be().1);
        private.primes()[0].clone() - magnitude
    });

    jwk.dp = Some(b64(dp.to_bytes_be()));
    jwk.dq = Some(b64(dq.to_bytes_be()));
    jwk.qi = Some(b64(qi.to_bytes_be()));
    Ok(())
}

fn fill_ec_public(jwk: &mut Jwk, public: &p521::PublicKey) -> Result<()> {
    let point = public.to_encoded_point(false);
    let x = point
        .x()
        .ok_or_else(|| Error::Format("P-521 public key has no affine x coordinate".into()))?;
    let y = point
        .y()
        .ok_or_else(|| Error::Format("P-521 public key has no affine y coordinate".into()))?;
    jwk.crv = Some("P-521".into());
    jwk.x = Some(b64(x));
    jwk.y = Some(b64(y));
    Ok(())
}

fn field_element(field: &str, value: &Option<String>) -> Result<[u8; P521_FIELD_LEN]> {
    let bytes = b64_decode(field, required(field, value)?)?;
    bytes.as_slice().try_into().map_err(|_| {
        Error::Format(format!(
            "JWK member {field:?} must be {P521_FIELD_LEN} bytes, got {}",
            bytes.len()
        ))
    })
}
