//! One-time passcodes and opaque token digests
//!
//! OTPs are six decimal digits drawn from the OS RNG. Only their SHA-256 hex
//! digest is persisted, the same digest used for refresh tokens.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Number of digits in a passcode
pub const OTP_DIGITS: usize = 6;

const OTP_SPACE: u32 = 1_000_000;

/// Generate a uniformly distributed 6-digit passcode, zero padded
pub fn generate_otp() -> String {
    // Reject the tail of the u32 range so every code is equally likely
    let zone = u32::MAX - (u32::MAX % OTP_SPACE);
    loop {
        let value = OsRng.next_u32();
        if value < zone {
            return format!("{:06}", value % OTP_SPACE);
        }
    }
}

/// SHA-256 hex digest of a secret value
pub fn sha256_hex(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    data_encoding::HEXLOWER.encode(&digest)
}

/// Check a submitted passcode against a stored digest and expiry
pub fn otp_matches(submitted: &str, stored_hash: Option<&str>, expires_at: Option<DateTime<Utc>>) -> bool {
    let (Some(stored_hash), Some(expires_at)) = (stored_hash, expires_at) else {
        return false;
    };
    if expires_at <= Utc::now() {
        return false;
    }
    let submitted = submitted.trim();
    if submitted.len() != OTP_DIGITS || !submitted.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    constant_time_eq(sha256_hex(submitted).as_bytes(), stored_hash.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_otp_matches() {
        let code = generate_otp();
        let hash = sha256_hex(&code);
        let future = Some(Utc::now() + Duration::minutes(10));
        let past = Some(Utc::now() - Duration::seconds(1));

        assert!(otp_matches(&code, Some(&hash), future));
        assert!(otp_matches(&format!(" {} ", code), Some(&hash), future));
        assert!(!otp_matches(&code, Some(&hash), past));
        assert!(!otp_matches(&code, None, future));
        assert!(!otp_matches(&code, Some(&hash), None));

        let other = if code == "000000" { "000001" } else { "000000" };
        assert!(!otp_matches(other, Some(&hash), future));
    }

    #[test]
    fn test_otp_rejects_malformed_input() {
        let hash = sha256_hex("12345");
        let future = Some(Utc::now() + Duration::minutes(1));
        assert!(!otp_matches("12345", Some(&hash), future));
        assert!(!otp_matches("abcdef", Some(&sha256_hex("abcdef")), future));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn generated_otp_is_six_digits(_seed in any::<u8>()) {
            let code = generate_otp();
            prop_assert_eq!(code.len(), OTP_DIGITS);
            prop_assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }

        #[test]
        fn digest_is_64_lowercase_hex(value in ".{0,64}") {
            let digest = sha256_hex(&value);
            prop_assert_eq!(digest.len(), 64);
            prop_assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }
}
