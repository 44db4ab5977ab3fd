/// PBKDF2 round-count policy for AUK derivation.
///
/// The round count travels with the key set (as the `p2c` envelope header),
/// so this is policy for *fresh* accounts, not a protocol constant: existing
/// key sets re-derive with whatever count they were created under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivationConfig {
    pub rounds: u32,
}

impl DerivationConfig {
    /// Recommended parameters for new accounts (OWASP-era 2023 value).
    ///
    /// Intentionally centralized so callers don't scatter magic numbers.
    pub fn recommended() -> Self {
        Self { rounds: 650_000 }
    }

    /// Fast parameters for tests. Never use for real accounts.
    pub fn for_tests() -> Self {
        Self { rounds: 1_000 }
    }
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self::recommended()
    }
}
