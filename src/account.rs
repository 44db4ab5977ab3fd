use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::derive::{derive_auk, AukParams};
use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::salt::Salt;
use crate::secret_key::SecretKey;

/// An account record: identity plus the user-held secret key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(rename = "user_email")]
    pub email: String,
    #[serde(rename = "user_first_name")]
    pub first_name: String,
    #[serde(rename = "user_last_name")]
    pub last_name: String,
    pub secret_key: SecretKey,
}

impl Account {
    /// Attempt to unlock this account with a candidate password.
    ///
    /// `enc_sym_key` must be the key set's master envelope and must carry the
    /// `p2s`/`p2c` headers recorded at key set creation. The AUK is re-derived
    /// from them and verified by unwrapping the envelope: the GCM tag is the
    /// password verifier. On success the recovered master key is zeroized and
    /// the AUK returned; a tag rejection surfaces as a decryption failure,
    /// which callers treat as "wrong password".
    pub fn try_unlock(&self, password: &SecretString, enc_sym_key: &Envelope) -> Result<Key> {
        let p2s = enc_sym_key.p2s.as_deref().ok_or(Error::MissingKdfParams)?;
        let rounds = enc_sym_key.p2c.ok_or(Error::MissingKdfParams)?;
        let salt = Salt::from_bytes(p2s)?;

        let mut auk = derive_auk(&AukParams {
            email: &self.email,
            password,
            salt: &salt,
            secret: &self.secret_key,
            rounds,
        })?;

        match enc_sym_key.unwrap_key(&auk) {
            Ok(mut master) => {
                master.clear();
                trace!(account_id = %self.id, "account unlocked");
                Ok(auk)
            }
            Err(err) => {
                auk.clear();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyset::KeySet;
    use crate::secret_key::SecretKeyVersion;

    fn pw(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    fn account() -> Account {
        Account {
            id: "acct-1".into(),
            email: "user@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            secret_key: SecretKey {
                version: SecretKeyVersion::LATEST,
                account_id: *b"ABCDEF",
                secret: *b"GHJKLMNPQRSTVWXYZ234567892",
            },
        }
    }

    fn unlockable_envelope(account: &Account, password: &SecretString) -> Envelope {
        let salt = Salt::random().unwrap();
        let rounds = 1000;
        let auk = derive_auk(&AukParams {
            email: &account.email,
            password,
            salt: &salt,
            secret: &account.secret_key,
            rounds,
        })
        .unwrap();
        let ks = KeySet::generate(&auk, &salt, rounds).unwrap();
        ks.enc_sym_key
    }

    #[test]
    fn unlock_roundtrip_with_correct_password() {
        let account = account();
        let password = pw("correct horse battery staple");
        let envelope = unlockable_envelope(&account, &password);

        let auk = account.try_unlock(&password, &envelope).unwrap();
        assert_eq!(auk.id(), "auk");
        assert!(!auk.is_cleared());
    }

    #[test]
    fn wrong_password_is_a_decryption_failure() {
        let account = account();
        let password = pw("correct horse battery staple");
        let envelope = unlockable_envelope(&account, &password);

        let wrong = pw("correct horse battery stapl3");
        assert!(matches!(
            account.try_unlock(&wrong, &envelope),
            Err(Error::Decryption(_))
        ));
    }

    #[test]
    fn missing_kdf_headers_are_rejected() {
        let account = account();
        let password = pw("pw");
        let mut envelope = unlockable_envelope(&account, &password);
        envelope.p2c = None;
        assert!(matches!(
            account.try_unlock(&password, &envelope),
            Err(Error::MissingKdfParams)
        ));

        let mut envelope = unlockable_envelope(&account, &password);
        envelope.p2s = None;
        assert!(matches!(
            account.try_unlock(&password, &envelope),
            Err(Error::MissingKdfParams)
        ));
    }

    #[test]
    fn account_json_hides_the_secret_key() {
        let account = account();
        let json = serde_json::to_string(&account).unwrap();
        assert!(json.contains("user_email"));
        assert!(!json.contains("GHJKL"));
        assert!(json.contains("obfus"));
    }
}
