//! Per-account key hierarchy.
//!
//! A key set wraps a random master key under the AUK, then wraps the RSA
//! private key and the ECDSA private key under that master. Public halves
//! stay in the clear. The AUK's PBKDF2 salt and round count ride along as
//! `p2s`/`p2c` headers on the master envelope so a later unlock can recover
//! the derivation parameters without a side channel.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::key::{Key, ACCOUNT_UNLOCK_KEY_ID};
use crate::salt::Salt;

/// The triple-wrapped key hierarchy for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySet {
    /// Unique identifier for the key set.
    pub id: String,
    /// Master key wrapped with the AUK; carries the AUK `p2s`/`p2c` headers.
    pub enc_sym_key: Envelope,
    /// Public encryption key (wraps vault keys).
    pub pub_key: Key,
    /// Private encryption key wrapped with the master key.
    pub enc_pri_key: Envelope,
    /// Public signing key (reserved).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_sign_key: Option<Key>,
    /// Private signing key wrapped with the master key (reserved).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc_sign_key: Option<Envelope>,
}

impl KeySet {
    /// Generate a fresh key set rooted at the given AUK.
    ///
    /// `auk_salt` and `auk_rounds` must be the parameters the AUK was
    /// derived with; they are recorded on the master envelope.
    pub fn generate(auk: &Key, auk_salt: &Salt, auk_rounds: u32) -> Result<Self> {
        let mut master = Key::generate_symmetric()?;
        let (mut rsa_private, rsa_public) = Key::generate_rsa_pair()?;
        let (mut ecdsa_private, ecdsa_public) = Key::generate_ecdsa_pair()?;

        let key_set = Self::assemble(
            auk,
            auk_salt,
            auk_rounds,
            &master,
            &rsa_private,
            rsa_public,
            &ecdsa_private,
            ecdsa_public,
        );

        master.clear();
        rsa_private.clear();
        ecdsa_private.clear();

        if let Ok(key_set) = &key_set {
            debug!(key_set_id = %key_set.id, "generated key set");
        }
        key_set
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        auk: &Key,
        auk_salt: &Salt,
        auk_rounds: u32,
        master: &Key,
        rsa_private: &Key,
        rsa_public: Key,
        ecdsa_private: &Key,
        ecdsa_public: Key,
    ) -> Result<Self> {
        let mut enc_sym_key = master.wrap(auk)?;
        enc_sym_key.p2s = Some(auk_salt.as_bytes().to_vec());
        enc_sym_key.p2c = Some(auk_rounds);

        let enc_pri_key = rsa_private.wrap(master)?;
        let enc_sign_key = ecdsa_private.wrap(master)?;

        Ok(KeySet {
            id: Uuid::new_v4().to_string(),
            enc_sym_key,
            pub_key: rsa_public,
            enc_pri_key,
            pub_sign_key: Some(ecdsa_public),
            enc_sign_key: Some(enc_sign_key),
        })
    }

    /// Unwrap the master symmetric key using the account unlock key.
    ///
    /// The master key encrypts/decrypts the private and signing keys.
    pub fn symmetric_key(&self, account_unlock_key: &Key) -> Result<Key> {
        if account_unlock_key.id() != ACCOUNT_UNLOCK_KEY_ID {
            return Err(Error::InvalidAuk(format!(
                "key id {:?} is not the AUK id",
                account_unlock_key.id()
            )));
        }
        self.enc_sym_key.unwrap_key(account_unlock_key)
    }

    /// Unwrap the private encryption key using the account unlock key.
    ///
    /// The private key decrypts vault keys. The intermediate master key is
    /// zeroized before this returns.
    pub fn private_key(&self, account_unlock_key: &Key) -> Result<Key> {
        let mut master = self.enc_sym_key.unwrap_key(account_unlock_key)?;
        let private = self.enc_pri_key.unwrap_key(&master);
        master.clear();
        private
    }

    /// Unwrap the private signing key using the account unlock key.
    ///
    /// Reserved: signing keys are stored but signing flows are not exposed.
    pub fn signing_key(&self, account_unlock_key: &Key) -> Result<Key> {
        let enc_sign_key = self
            .enc_sign_key
            .as_ref()
            .ok_or_else(|| Error::Format("key set has no signing key".into()))?;
        let mut master = self.enc_sym_key.unwrap_key(account_unlock_key)?;
        let signing = enc_sign_key.unwrap_key(&master);
        master.clear();
        signing
    }
}
