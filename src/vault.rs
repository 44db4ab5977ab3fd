//! Vault records and the crypto that serves them.
//!
//! Each vault owns a symmetric vault key wrapped under the key set's RSA
//! public key. Unlocking a vault means unwrapping that key with the key
//! set's private key, then decrypting the metadata and item envelopes with
//! it. Every intermediate key is zeroized before control returns.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::envelope::Envelope;
use crate::error::Result;
use crate::key::Key;

/// Generate a new random symmetric key for use as a vault key.
///
/// The vault key encrypts vault metadata and items. It should be wrapped
/// with the key set public key and stored on the vault record.
pub fn generate_vault_key() -> Result<Key> {
    Key::generate_symmetric()
}

/// A vault record: encrypted metadata plus the wrapped vault key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vault {
    pub vault_id: String,
    pub account_id: String,
    pub encrypted_metadata: Envelope,
    /// The vault key wrapped under the key set's RSA public key.
    pub encrypted_vault_key: Envelope,
}

impl Vault {
    fn vault_key(&self, private_key: &Key) -> Result<Key> {
        self.encrypted_vault_key.unwrap_key(private_key)
    }

    /// Decrypt the vault metadata using the key set private key.
    pub fn decrypt_metadata(&self, private_key: &Key) -> Result<VaultMetadata> {
        let mut vault_key = self.vault_key(private_key)?;
        let metadata = vault_key.decrypt_json(&self.encrypted_metadata);
        vault_key.clear();
        trace!(vault_id = %self.vault_id, "decrypted vault metadata");
        metadata
    }

    /// Decrypt a batch of item overviews using the key set private key.
    pub fn decrypt_item_overviews(
        &self,
        private_key: &Key,
        encrypted_overviews: &[EncryptedItemOverview],
    ) -> Result<Vec<ItemOverview>> {
        let mut vault_key = self.vault_key(private_key)?;
        let mut overviews = Vec::with_capacity(encrypted_overviews.len());
        let result = (|| {
            for encrypted in encrypted_overviews {
                overviews.push(vault_key.decrypt_json(&encrypted.encrypted_overview)?);
            }
            Ok(overviews)
        })();
        vault_key.clear();
        result
    }

    /// Decrypt one item's details using the key set private key.
    pub fn decrypt_item_details(
        &self,
        private_key: &Key,
        encrypted: &EncryptedItemDetails,
    ) -> Result<ItemDetails> {
        let mut vault_key = self.vault_key(private_key)?;
        let details = vault_key.decrypt_json(&encrypted.encrypted_details);
        vault_key.clear();
        details
    }
}

/// Clear-text vault metadata, stored encrypted under the vault key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMetadata {
    pub account_id: String,
    pub vault_id: String,
    pub name: String,
    pub description: String,
    pub created_at: u64,
    pub updated_at: u64,
}

impl VaultMetadata {
    pub fn encrypt(&self, vault_key: &Key) -> Result<Envelope> {
        vault_key.encrypt_json(self)
    }
}

/// An item overview record as stored: timestamps plus the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedItemOverview {
    pub item_id: String,
    pub vault_id: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub encrypted_overview: Envelope,
}

/// The clear-text half of an item overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOverview {
    pub title: String,
    pub url: String,
}

impl EncryptedItemOverview {
    /// Re-encrypt this overview with new contents, stamping `updated_at`.
    pub fn update(&mut self, vault_key: &Key, data: &ItemOverview, now: u64) -> Result<()> {
        self.encrypted_overview = vault_key.encrypt_json(data)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn read(&self, vault_key: &Key) -> Result<ItemOverview> {
        vault_key.decrypt_json(&self.encrypted_overview)
    }
}

/// An item details record as stored: timestamps plus the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedItemDetails {
    pub item_id: String,
    pub vault_id: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub encrypted_details: Envelope,
}

/// The clear-text half of an item's details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub username: String,
    pub password: String,
    pub notes: String,
}

impl EncryptedItemDetails {
    /// Re-encrypt these details with new contents, stamping `updated_at`.
    pub fn update(&mut self, vault_key: &Key, data: &ItemDetails, now: u64) -> Result<()> {
        self.encrypted_details = vault_key.encrypt_json(data)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn read(&self, vault_key: &Key) -> Result<ItemDetails> {
        vault_key.decrypt_json(&self.encrypted_details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use uuid::Uuid;

    fn vault_with_items() -> (Key, Key, Vault, EncryptedItemOverview, EncryptedItemDetails) {
        let (rsa_private, rsa_public) = Key::generate_rsa_pair().unwrap();
        let vault_key = generate_vault_key().unwrap();

        let vault_id = Uuid::new_v4().to_string();
        let metadata = VaultMetadata {
            account_id: "acct-1".into(),
            vault_id: vault_id.clone(),
            name: "Default".into(),
            description: "Personal vault".into(),
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
        };

        let vault = Vault {
            vault_id: vault_id.clone(),
            account_id: "acct-1".into(),
            encrypted_metadata: metadata.encrypt(&vault_key).unwrap(),
            encrypted_vault_key: vault_key.wrap(&rsa_public).unwrap(),
        };

        let mut overview = EncryptedItemOverview {
            item_id: "item-1".into(),
            vault_id: vault_id.clone(),
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
            encrypted_overview: vault_key
                .encrypt_json(&ItemOverview {
                    title: "Example".into(),
                    url: "https://example.com".into(),
                })
                .unwrap(),
        };
        overview
            .update(
                &vault_key,
                &ItemOverview {
                    title: "Example".into(),
                    url: "https://example.com".into(),
                },
                1_700_000_001,
            )
            .unwrap();

        let details = EncryptedItemDetails {
            item_id: "item-1".into(),
            vault_id,
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
            encrypted_details: vault_key
                .encrypt_json(&ItemDetails {
                    username: "user@example.com".into(),
                    password: "hunter2".into(),
                    notes: String::new(),
                })
                .unwrap(),
        };

        (rsa_private, vault_key, vault, overview, details)
    }

    #[test]
    fn metadata_roundtrip_through_the_private_key() {
        let (rsa_private, _, vault, _, _) = vault_with_items();
        let metadata = vault.decrypt_metadata(&rsa_private).unwrap();
        assert_eq!(metadata.name, "Default");
        assert_eq!(metadata.vault_id, vault.vault_id);
    }

    #[test]
    fn item_overviews_decrypt_in_batch() {
        let (rsa_private, _, vault, overview, _) = vault_with_items();
        let overviews = vault
            .decrypt_item_overviews(&rsa_private, std::slice::from_ref(&overview))
            .unwrap();
        assert_eq!(overviews.len(), 1);
        assert_eq!(overviews[0].title, "Example");
        assert_eq!(overview.updated_at, 1_700_000_001);
    }

    #[test]
    fn item_details_decrypt() {
        let (rsa_private, _, vault, _, details) = vault_with_items();
        let details = vault.decrypt_item_details(&rsa_private, &details).unwrap();
        assert_eq!(details.username, "user@example.com");
        assert_eq!(details.password, "hunter2");
    }

    #[test]
    fn item_read_uses_the_vault_key_directly() {
        let (_, vault_key, _, overview, _) = vault_with_items();
        let read = overview.read(&vault_key).unwrap();
        assert_eq!(read.url, "https://example.com");
    }

    #[test]
    fn wrong_private_key_fails_to_unwrap_the_vault_key() {
        let (_, _, vault, _, _) = vault_with_items();
        let (other_private, _) = Key::generate_rsa_pair().unwrap();
        assert!(matches!(
            vault.decrypt_metadata(&other_private),
            Err(Error::Decryption(_))
        ));
    }
}
