use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::{LockError, Result};

pub const DIGEST_LEN: usize = 32;

/// Unsalted SHA-256 of a PIN string. No key stretching.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PinDigest([u8; DIGEST_LEN]);

impl PinDigest {
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Compares without short-circuiting on the first differing byte.
    pub fn ct_matches(&self, other: &PinDigest) -> bool {
        self.0.ct_eq(&other.0).into()
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| LockError::StorageUnavailable(format!("Invalid digest encoding: {e}")))?;
        let arr: [u8; DIGEST_LEN] = bytes
            .try_into()
            .map_err(|_| LockError::StorageUnavailable("Stored digest has invalid length".into()))?;
        Ok(Self(arr))
    }
}

// Never print digest bytes.
impl std::fmt::Debug for PinDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PinDigest(..)")
    }
}

pub fn digest(pin: &str) -> PinDigest {
    let mut hasher = Sha256::new();
    hasher.update(pin.as_bytes());
    let mut out: [u8; DIGEST_LEN] = hasher.finalize().into();
    let result = PinDigest(out);
    out.zeroize();
    result
}

/// `^\d{4,8}$`, ASCII digits only.
pub fn is_valid_pin(pin: &str) -> bool {
    (4..=8).contains(&pin.len()) && pin.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        assert!(digest("1234").ct_matches(&digest("1234")));
        assert!(!digest("1234").ct_matches(&digest("12345")));
    }

    #[test]
    fn digest_matches_known_sha256() {
        // sha256("1234")
        let expected = "03ac674216f3e15c761ee1a5e255f067953623c8b388b4459e13f978d7c846f4";
        let hex: String = digest("1234")
            .as_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        assert_eq!(hex, expected);
    }

    #[test]
    fn base64_roundtrip_and_bad_input() {
        let d = digest("87654321");
        let back = PinDigest::from_base64(&d.to_base64()).unwrap();
        assert_eq!(d, back);
        assert!(PinDigest::from_base64("AAAA").is_err());
        assert!(PinDigest::from_base64("not base64!").is_err());
    }

    #[test]
    fn pin_format() {
        assert!(is_valid_pin("1234"));
        assert!(is_valid_pin("12345678"));
        assert!(!is_valid_pin("123"));
        assert!(!is_valid_pin("123456789"));
        assert!(!is_valid_pin("12a4"));
        assert!(!is_valid_pin("١٢٣٤"));
        assert!(!is_valid_pin(""));
    }

    #[test]
    fn debug_hides_bytes() {
        assert_eq!(format!("{:?}", digest("1234")), "PinDigest(..)");
    }
}
