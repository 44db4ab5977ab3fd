use thiserror::Error;

/// Error kinds surfaced by the vault core.
///
/// Every fallible operation in this crate reports one of these kinds with a
/// human-readable message. Kinds are preserved through propagation so callers
/// can route on them (e.g. trial unlock treats [`Error::Decryption`] as a
/// wrong-password signal while letting everything else bubble up).
#[derive(Debug, Error)]
pub enum Error {
    /// Inputs failed precondition checks before any cryptography ran.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The key/envelope combination is not in the permitted set.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// AEAD tag or OAEP padding rejected.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Operation attempted on a zeroized key handle.
    #[error("key has been cleared")]
    KeyCleared,

    /// JSON, base64, hex, dashed form, or alphabet constraint violated.
    #[error("invalid format: {0}")]
    Format(String),

    /// Secret key version not recognized.
    #[error("invalid secret key version: {0}")]
    BadVersion(String),

    /// The system CSPRNG failed. Never masked.
    #[error("random source failure: {0}")]
    RandomSource(String),

    /// Unlock attempted against an envelope without `p2s`/`p2c` headers.
    #[error("missing PBKDF2 parameters in envelope headers")]
    MissingKdfParams,

    /// Accessor invoked with a key whose id is not the AUK id.
    #[error("invalid account unlock key: {0}")]
    InvalidAuk(String),
}

pub type Result<T> = std::result::Result<T, Error>;
