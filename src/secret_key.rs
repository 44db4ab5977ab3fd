use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Alphabet for secret key characters: {2-9, A-H, J-N, P-T, V-Z}.
///
/// 31 symbols; avoids easily confusable characters (0/O, 1/I/l, U/V).
pub const SECRET_KEY_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTVWXYZ";

/// Fixed public pad used to mask the printable secret key in stored JSON.
///
/// This is storage obfuscation, not encryption: the pad is a published
/// literal, and the transform exists only so database snapshots do not
/// reveal the secret at a glance.
pub const SECRET_KEY_OBFUSCATION_PAD: &[u8] =
    b"This is an obfuscation key used to mask the secret key in the local database and nothing more. If this seems interesting to you, come work with us :)";

const OBFUSCATION_SUFFIX: &str = "obfus";

const ACCOUNT_ID_LEN: usize = 6;
const SECRET_LEN: usize = 26;

/// Two-character secret key version tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretKeyVersion(pub [u8; 2]);

impl SecretKeyVersion {
    pub const V1: SecretKeyVersion = SecretKeyVersion(*b"O1");
    pub const LATEST: SecretKeyVersion = SecretKeyVersion::V1;

    pub fn as_bytes(&self) -> &[u8; 2] {
        &self.0
    }
}

impl fmt::Display for SecretKeyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// The user-held high-entropy credential.
///
/// Never derived from the password; generated once per account and combined
/// into the AUK so a stolen password alone cannot unlock the vault.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey {
    pub version: SecretKeyVersion,
    pub account_id: [u8; ACCOUNT_ID_LEN],
    pub secret: [u8; SECRET_LEN],
}

impl fmt::Debug for SecretKey {
    /// Never prints the account id or secret.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("version", &self.version)
            .field("account_id", &"[REDACTED]")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Fill `dst` with uniform random alphabet characters.
///
/// Rejection sampling: a byte is accepted only below the largest multiple of
/// the alphabet size (31 * 8 = 248), so the modulo reduction is unbiased.
fn fill_with_alphabet(dst: &mut [u8]) -> Result<()> {
    const LIMIT: u8 = (u8::MAX / 31) * 31; // 248
    let mut pool = [0u8; 64];
    let mut filled = 0;
    while filled < dst.len() {
        OsRng.try_fill_bytes(&mut pool).map_err(|err| {
            Error::RandomSource(format!("failed to read random bytes for secret key: {err}"))
        })?;
        for byte in pool {
            if byte >= LIMIT {
                continue;
            }
            dst[filled] = SECRET_KEY_ALPHABET[(byte % 31) as usize];
            filled += 1;
            if filled == dst.len() {
                break;
            }
        }
    }
    Ok(())
}

impl SecretKey {
    /// Generate a fresh random secret key at the latest version.
    pub fn generate() -> Result<Self> {
        let mut account_id = [0u8; ACCOUNT_ID_LEN];
        fill_with_alphabet(&mut account_id)?;
        let mut secret = [0u8; SECRET_LEN];
        fill_with_alphabet(&mut secret)?;
        Ok(Self {
            version: SecretKeyVersion::LATEST,
            account_id,
            secret,
        })
    }

    /// Obfuscated storage form: printable form XOR-cycled with the fixed pad,
    /// hex-encoded, suffixed with `obfus`.
    pub fn obfuscate(&self) -> String {
        let printable = self.to_string();
        let masked: Vec<u8> = printable
            .bytes()
            .enumerate()
            .map(|(i, b)| b ^ SECRET_KEY_OBFUSCATION_PAD[i % SECRET_KEY_OBFUSCATION_PAD.len()])
            .collect();
        let mut out = hex::encode(masked);
        out.push_str(OBFUSCATION_SUFFIX);
        out
    }
}

/// Reverse [`SecretKey::obfuscate`], returning the printable form.
fn deobfuscate(obfuscated: &str) -> Result<String> {
    let hex_part = obfuscated
        .strip_suffix(OBFUSCATION_SUFFIX)
        .ok_or_else(|| Error::Format("obfuscated secret key is missing its suffix".into()))?;
    let masked = hex::decode(hex_part)
        .map_err(|err| Error::Format(format!("bad obfuscated secret key hex: {err}")))?;
    let printable: Vec<u8> = masked
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ SECRET_KEY_OBFUSCATION_PAD[i % SECRET_KEY_OBFUSCATION_PAD.len()])
        .collect();
    String::from_utf8(printable)
        .map_err(|_| Error::Format("deobfuscated secret key is not valid UTF-8".into()))
}

impl fmt::Display for SecretKey {
    /// Canonical printable form: `VV-AAAAAA-SSSSSS-SSSSS-SSSSS-SSSSS-SSSSS`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups = [
            &self.secret[0..6],
            &self.secret[6..11],
            &self.secret[11..16],
            &self.secret[16..21],
            &self.secret[21..26],
        ];
        write!(
            f,
            "{}-{}",
            self.version,
            String::from_utf8_lossy(&self.account_id)
        )?;
        for group in groups {
            write!(f, "-{}", String::from_utf8_lossy(group))?;
        }
        Ok(())
    }
}

impl FromStr for SecretKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let printable;
        let key_str = if s.ends_with(OBFUSCATION_SUFFIX) {
            printable = deobfuscate(s)?;
            printable.as_str()
        } else {
            s
        };

        let upper = key_str.to_ascii_uppercase();
        let parts: Vec<&str> = upper.split('-').collect();
        if parts.len() != 7 {
            return Err(Error::Format(
                "invalid secret key format, expected XX-YYYYYY-ZZZZZZ-ZZZZZ-ZZZZZ-ZZZZZ-ZZZZZ"
                    .into(),
            ));
        }

        let version = match parts[0].as_bytes() {
            v if v == SecretKeyVersion::V1.as_bytes() => SecretKeyVersion::V1,
            _ => return Err(Error::BadVersion(parts[0].to_string())),
        };

        let widths = [6usize, 6, 5, 5, 5, 5];
        for (part, width) in parts[1..].iter().zip(widths) {
            if part.len() != width {
                return Err(Error::Format(format!("invalid secret key part {part:?}")));
            }
        }

        let mut account_id = [0u8; ACCOUNT_ID_LEN];
        account_id.copy_from_slice(parts[1].as_bytes());

        let mut secret = [0u8; SECRET_LEN];
        secret[0..6].copy_from_slice(parts[2].as_bytes());
        for (i, part) in parts[3..7].iter().enumerate() {
            secret[6 + i * 5..11 + i * 5].copy_from_slice(part.as_bytes());
        }

        Ok(Self {
            version,
            account_id,
            secret,
        })
    }
}

impl Serialize for SecretKey {
    /// JSON form is the obfuscated string, never the printable dashed form.
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.obfuscate())
    }
}

impl<'de> Deserialize<'de> for SecretKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
