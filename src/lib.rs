//! Cryptographic core for a local password-manager vault.
//!
//! This crate turns a user's email, master password, and high-entropy
//! secret key into a deterministic Account Unlock Key (AUK) which unlocks a
//! hierarchy of wrapped keys protecting vault contents:
//!
//! - The AUK wraps a per-account master key ([`KeySet`]).
//! - The master key wraps an RSA-2048 private key (and a reserved P-521
//!   signing key).
//! - The RSA public key wraps per-vault symmetric keys ([`Vault`]).
//! - Vault keys encrypt metadata and item payloads.
//!
//! Design notes:
//!
//! - The core performs no I/O; the stores in [`state`] are plain maps the
//!   surrounding application persists opaquely.
//! - Envelope headers (`p2s`/`p2c`) on the master wrapping carry the AUK's
//!   PBKDF2 parameters so unlock needs no side channel. The GCM tag of that
//!   envelope is the password verifier, so unlock is trial decryption.
//! - Every private key produced by derivation, generation, or unwrapping is
//!   zeroized on every exit path; the cleared flag on a [`Key`] is the
//!   single source of truth and is checked before every operation.

pub mod account;
pub mod config;
pub mod derive;
pub mod envelope;
pub mod error;
pub mod key;
pub mod keyset;
pub mod salt;
pub mod secret_key;
pub mod state;
pub mod vault;

pub use account::Account;
pub use config::DerivationConfig;
pub use derive::{derive_auk, AukParams};
pub use envelope::{Envelope, CONTENT_TYPE_JWK};
pub use error::{Error, Result};
pub use key::{Algorithm, Key, KeyUse, ACCOUNT_UNLOCK_KEY_ID};
pub use keyset::KeySet;
pub use salt::Salt;
pub use secret_key::{SecretKey, SecretKeyVersion, SECRET_KEY_ALPHABET};
pub use state::{CoreState, UnlockState};
pub use vault::{generate_vault_key, Vault, VaultMetadata};
