//! Account Unlock Key derivation.
//!
//! The pipeline is deterministic: the same inputs must yield the same
//! 32-byte key forever, because the result is what unwraps the key set's
//! master key. The salt expansion and slow hash mirror the published
//! PBES2g-HS256 design; the secret-key binding ensures a stolen password
//! alone cannot unlock.

use email_address::EmailAddress;
use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::key::{Key, KeyUse, ACCOUNT_UNLOCK_KEY_ID};
use crate::salt::Salt;
use crate::secret_key::SecretKey;

/// HKDF info string binding the salt expansion to the AUK scheme.
const AUK_ALGORITHM: &str = "PBES2g-HS256";

const AUK_LEN: usize = 32;

/// Inputs to AUK derivation.
pub struct AukParams<'a> {
    pub email: &'a str,
    pub password: &'a SecretString,
    pub salt: &'a Salt,
    pub secret: &'a SecretKey,
    pub rounds: u32,
}

/// Derive the Account Unlock Key from email, password, salt, and secret key.
///
/// Returns a symmetric [`Key`] with the reserved id `auk` and algorithm
/// `A256GCM`. All validation happens before any hashing runs.
pub fn derive_auk(params: &AukParams<'_>) -> Result<Key> {
    validate_params(params)?;

    let lower_email = params.email.to_ascii_lowercase();

    // Password preprocessing: strip leading/trailing whitespace only, then
    // NFKD-normalize what remains.
    let stripped = params.password.expose_secret().trim();
    let normalized: Zeroizing<String> = Zeroizing::new(stripped.nfkd().collect());

    // Salt preparation: bind the raw salt to the lowercased email.
    let salted = Hkdf::<Sha256>::new(Some(lower_email.as_bytes()), params.salt.as_bytes());
    let mut expanded_salt = Zeroizing::new([0u8; AUK_LEN]);
    salted
        .expand(AUK_ALGORITHM.as_bytes(), expanded_salt.as_mut())
        .map_err(|_| Error::Validation("failed to expand salt with HKDF".into()))?;

    // Slow hashing.
    let mut p_key = Zeroizing::new([0u8; AUK_LEN]);
    pbkdf2_hmac::<Sha256>(
        normalized.as_bytes(),
        expanded_salt.as_ref(),
        params.rounds,
        p_key.as_mut(),
    );

    // Secret key binding: the machine-held secret salted with the account id
    // and expanded under the version bytes.
    let salted_secret = Hkdf::<Sha256>::new(Some(&params.secret.account_id), &params.secret.secret);
    let mut s_key = Zeroizing::new([0u8; AUK_LEN]);
    salted_secret
        .expand(params.secret.version.as_bytes(), s_key.as_mut())
        .map_err(|_| Error::Validation("failed to expand secret with HKDF".into()))?;

    // Combine. XOR keeps the combination commutative for rotation scenarios.
    let mut auk_bytes = vec![0u8; AUK_LEN];
    for (i, byte) in auk_bytes.iter_mut().enumerate() {
        *byte = p_key[i] ^ s_key[i];
    }

    Key::from_symmetric(ACCOUNT_UNLOCK_KEY_ID, auk_bytes, KeyUse::Encryption)
}

fn validate_params(params: &AukParams<'_>) -> Result<()> {
    if params.rounds == 0 {
        return Err(Error::Validation("rounds must be greater than zero".into()));
    }
    if params.email.parse::<EmailAddress>().is_err() {
        return Err(Error::Validation(format!(
            "invalid email address {:?}",
            params.email
        )));
    }
    if params.password.expose_secret().is_empty() {
        return Err(Error::Validation("password cannot be empty".into()));
    }
    Ok(())
}
