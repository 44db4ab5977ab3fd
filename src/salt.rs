use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Length (bytes) of the PBKDF2 salt carried in key set headers.
pub const SALT_LEN: usize = 16;

/// A fixed-width 16-byte random salt.
///
/// Text form is base64url without padding; parsing accepts standard base64
/// first and falls back to base64url. The JSON form is the raw byte sequence,
/// matching the other binary fields in this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    /// Generate a new random salt from the system CSPRNG.
    pub fn random() -> Result<Self> {
        let mut bytes = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|err| Error::RandomSource(format!("failed to generate salt: {err}")))?;
        Ok(Self(bytes))
    }

    /// Build a salt from raw bytes, rejecting any length other than 16.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; SALT_LEN] = bytes
            .try_into()
            .map_err(|_| Error::Format(format!("salt must be {SALT_LEN} bytes, got {}", bytes.len())))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

impl fmt::Display for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE_NO_PAD.encode(self.0))
    }
}

impl FromStr for Salt {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = match STANDARD.decode(s) {
            Ok(bytes) => bytes,
            Err(_) => URL_SAFE_NO_PAD
                .decode(s)
                .map_err(|err| Error::Format(format!("failed to decode salt: {err}")))?,
        };
        Self::from_bytes(&bytes)
    }
}

impl Serialize for Salt {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        Salt::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_salts_differ() {
        let a = Salt::random().unwrap();
        let b = Salt::random().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn text_roundtrip_is_base64url_no_pad() {
        let salt = Salt::from_bytes(&[0xAB; SALT_LEN]).unwrap();
        let text = salt.to_string();
        assert!(!text.contains('='));
        assert_eq!(text.parse::<Salt>().unwrap(), salt);
    }

    #[test]
    fn parse_accepts_standard_base64() {
        let salt = Salt::from_bytes(&[0x01; SALT_LEN]).unwrap();
        let standard = STANDARD.encode(salt.as_bytes());
        assert_eq!(standard.parse::<Salt>().unwrap(), salt);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(matches!(Salt::from_bytes(&[0u8; 8]), Err(Error::Format(_))));
        assert!(matches!(Salt::from_bytes(&[0u8; 32]), Err(Error::Format(_))));
    }

    #[test]
    fn json_form_is_byte_sequence() {
        let salt = Salt::from_bytes(&[3u8; SALT_LEN]).unwrap();
        let json = serde_json::to_string(&salt).unwrap();
        assert_eq!(json, format!("[{}]", ["3"; SALT_LEN].join(",")));
        let back: Salt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, salt);
    }

    #[test]
    fn json_wrong_length_is_rejected() {
        assert!(serde_json::from_str::<Salt>("[1,2,3]").is_err());
    }
}
