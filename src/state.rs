//! The unlock state machine and the collaborator store shapes.
//!
//! The stores are plain in-memory maps; persistence is owned by the
//! surrounding application, which reads and writes them opaquely. The core
//! only cares that lookups are O(1) in the live case: accounts and key sets
//! are keyed by account id, vaults by vault id, items by item id.

use secrecy::SecretString;
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::account::Account;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::keyset::KeySet;
use crate::vault::{EncryptedItemDetails, EncryptedItemOverview, Vault};

/// Accounts keyed by account id.
pub type AccountStore = HashMap<String, Account>;
/// Key sets keyed by their associated account id.
pub type KeySetStore = HashMap<String, KeySet>;
/// Vaults keyed by vault id.
pub type VaultStore = HashMap<String, Vault>;
/// Item overviews keyed by item id.
pub type ItemOverviewStore = HashMap<String, EncryptedItemOverview>;
/// Item details keyed by item id.
pub type ItemDetailsStore = HashMap<String, EncryptedItemDetails>;

/// The table of active account unlock keys.
///
/// Locked means the table is empty. Each successful [`UnlockState::try_unlock`]
/// installs one entry; [`UnlockState::lock`] zeroizes every AUK and empties
/// the table. There is no public record of which AUK belongs to which
/// account beyond the envelope itself, so unlocking is trial decryption.
#[derive(Debug, Default)]
pub struct UnlockState {
    auks: HashMap<String, Key>,
}

impl UnlockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self) -> bool {
        self.auks.is_empty()
    }

    /// The active AUK for an account, if it is unlocked.
    pub fn auk(&self, account_id: &str) -> Option<&Key> {
        self.auks.get(account_id)
    }

    pub fn is_unlocked(&self, account_id: &str) -> bool {
        self.auks.contains_key(account_id)
    }

    /// Try the candidate password against every account.
    ///
    /// Installs and reports the first account the password unlocks. A
    /// decryption failure from a candidate is a silent wrong-password
    /// signal; every other error propagates. When no account matches, the
    /// state is left unchanged.
    pub fn try_unlock(
        &mut self,
        accounts: &AccountStore,
        key_sets: &KeySetStore,
        password: &SecretString,
    ) -> Result<String> {
        for account in accounts.values() {
            let key_set = key_sets.get(&account.id).ok_or_else(|| {
                Error::Validation(format!("no key set found for account {}", account.id))
            })?;
            match account.try_unlock(password, &key_set.enc_sym_key) {
                Ok(auk) => {
                    debug!(account_id = %account.id, "unlocked account");
                    self.auks.insert(account.id.clone(), auk);
                    return Ok(account.id.clone());
                }
                Err(Error::Decryption(_)) => {
                    trace!(account_id = %account.id, "password did not match account");
                }
                Err(err) => return Err(err),
            }
        }
        Err(Error::Decryption(
            "password did not match any account".into(),
        ))
    }

    /// Zeroize every active AUK and return to the locked state.
    pub fn lock(&mut self) {
        for auk in self.auks.values_mut() {
            auk.clear();
        }
        self.auks.clear();
        debug!("locked all accounts");
    }
}

/// The full in-memory state the core operates over.
#[derive(Debug, Default)]
pub struct CoreState {
    pub accounts: AccountStore,
    pub key_sets: KeySetStore,
    pub vaults: VaultStore,
    pub item_overviews: ItemOverviewStore,
    pub item_details: ItemDetailsStore,
    pub unlock: UnlockState,
}

impl CoreState {
    /// Resolve the key set, active AUK, and vault record for a vault id.
    ///
    /// Fails when the vault is unknown, its account is locked, or the
    /// account has no key set.
    pub fn lookup_vault_crypto(&self, vault_id: &str) -> Result<(&KeySet, &Key, &Vault)> {
        let vault = self
            .vaults
            .get(vault_id)
            .ok_or_else(|| Error::Validation(format!("vault {vault_id} not found")))?;
        let auk = self.unlock.auk(&vault.account_id).ok_or_else(|| {
            Error::Validation(format!("account {} is locked", vault.account_id))
        })?;
        let key_set = self.key_sets.get(&vault.account_id).ok_or_else(|| {
            Error::Validation(format!(
                "no key set found for account {}",
                vault.account_id
            ))
        })?;
        Ok((key_set, auk, vault))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::{derive_auk, AukParams};
    use crate::salt::Salt;
    use crate::secret_key::SecretKey;

    fn pw(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    fn seeded_account(id: &str, email: &str, password: &SecretString) -> (Account, KeySet) {
        let account = Account {
            id: id.into(),
            email: email.into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            secret_key: SecretKey::generate().unwrap(),
        };
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
        let key_set = KeySet::generate(&auk, &salt, rounds).unwrap();
        (account, key_set)
    }

    fn stores(
        entries: Vec<(Account, KeySet)>,
    ) -> (AccountStore, KeySetStore) {
        let mut accounts = AccountStore::new();
        let mut key_sets = KeySetStore::new();
        for (account, key_set) in entries {
            key_sets.insert(account.id.clone(), key_set);
            accounts.insert(account.id.clone(), account);
        }
        (accounts, key_sets)
    }

    #[test]
    fn try_unlock_installs_the_matching_account() {
        let password = pw("first password");
        let other_password = pw("second password");
        let (a, ks_a) = seeded_account("acct-a", "a@example.com", &password);
        let (b, ks_b) = seeded_account("acct-b", "b@example.com", &other_password);
        let (accounts, key_sets) = stores(vec![(a, ks_a), (b, ks_b)]);

        let mut state = UnlockState::new();
        assert!(state.is_locked());

        let unlocked = state.try_unlock(&accounts, &key_sets, &password).unwrap();
        assert_eq!(unlocked, "acct-a");
        assert!(!state.is_locked());
        assert!(state.is_unlocked("acct-a"));
        assert!(!state.is_unlocked("acct-b"));

        // A second unlock extends the table.
        let unlocked = state
            .try_unlock(&accounts, &key_sets, &other_password)
            .unwrap();
        assert_eq!(unlocked, "acct-b");
        assert!(state.is_unlocked("acct-b"));
    }

    #[test]
    fn no_match_leaves_the_state_unchanged() {
        let password = pw("right");
        let (a, ks_a) = seeded_account("acct-a", "a@example.com", &password);
        let (accounts, key_sets) = stores(vec![(a, ks_a)]);

        let mut state = UnlockState::new();
        let err = state
            .try_unlock(&accounts, &key_sets, &pw("wrong"))
            .unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
        assert!(state.is_locked());
    }

    #[test]
    fn lock_clears_every_auk() {
        let password = pw("a password");
        let (a, ks_a) = seeded_account("acct-a", "a@example.com", &password);
        let (accounts, key_sets) = stores(vec![(a, ks_a)]);

        let mut state = UnlockState::new();
        state.try_unlock(&accounts, &key_sets, &password).unwrap();
        assert!(!state.is_locked());

        state.lock();
        assert!(state.is_locked());
        assert!(state.auk("acct-a").is_none());
    }

    #[test]
    fn missing_key_set_propagates_instead_of_being_swallowed() {
        let password = pw("a password");
        let (a, _) = seeded_account("acct-a", "a@example.com", &password);
        let mut accounts = AccountStore::new();
        accounts.insert(a.id.clone(), a);
        let key_sets = KeySetStore::new();

        let mut state = UnlockState::new();
        assert!(matches!(
            state.try_unlock(&accounts, &key_sets, &password),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn lookup_vault_crypto_requires_an_unlocked_account() {
        let password = pw("a password");
        let (account, key_set) = seeded_account("acct-a", "a@example.com", &password);
        let (rsa_public, account_id) = (key_set.pub_key.clone(), account.id.clone());

        let vault_key = crate::vault::generate_vault_key().unwrap();
        let metadata = crate::vault::VaultMetadata {
            account_id: account_id.clone(),
            vault_id: "vault-1".into(),
            name: "Default".into(),
            description: String::new(),
            created_at: 0,
            updated_at: 0,
        };
        let vault = Vault {
            vault_id: "vault-1".into(),
            account_id: account_id.clone(),
            encrypted_metadata: metadata.encrypt(&vault_key).unwrap(),
            encrypted_vault_key: vault_key.wrap(&rsa_public).unwrap(),
        };

        let mut state = CoreState::default();
        state.key_sets.insert(account_id.clone(), key_set);
        state.accounts.insert(account_id.clone(), account);
        state.vaults.insert(vault.vault_id.clone(), vault);

        assert!(matches!(
            state.lookup_vault_crypto("vault-1"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            state.lookup_vault_crypto("missing"),
            Err(Error::Validation(_))
        ));

        let accounts = state.accounts.clone();
        let key_sets = state.key_sets.clone();
        state
            .unlock
            .try_unlock(&accounts, &key_sets, &password)
            .unwrap();

        let (ks, auk, vault) = state.lookup_vault_crypto("vault-1").unwrap();
        let private = ks.private_key(auk).unwrap();
        let metadata = vault.decrypt_metadata(&private).unwrap();
        assert_eq!(metadata.name, "Default");
    }
}
