//! Salted, key-stretched password hashes (PBKDF2-HMAC-SHA256, one block).
//!
//! Stored form: `pbkdf2-sha256$<rounds>$<salt b64>$<hash b64>`.

use crate::error::{ConsultifyError, Result};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "pbkdf2-sha256";
pub const DEFAULT_ROUNDS: u32 = 10_000;
const SALT_LEN: usize = 16;

pub fn hash_password(password: &str) -> Result<String> {
    hash_with_rounds(password, DEFAULT_ROUNDS)
}

pub fn hash_with_rounds(password: &str, rounds: u32) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = derive(password.as_bytes(), &salt, rounds)?;
    Ok(format!(
        "{SCHEME}${rounds}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(digest)
    ))
}

/// Check `password` against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(rounds), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let Ok(rounds) = rounds.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (STANDARD_NO_PAD.decode(salt), STANDARD_NO_PAD.decode(hash))
    else {
        return false;
    };
    match derive(password.as_bytes(), &salt, rounds) {
        Ok(actual) => constant_time_eq(&actual, &expected),
        Err(_) => false,
    }
}

fn derive(password: &[u8], salt: &[u8], rounds: u32) -> Result<[u8; 32]> {
    if rounds == 0 {
        return Err(ConsultifyError::validation("password hash rounds must be positive"));
    }
    let keyed = <HmacSha256 as Mac>::new_from_slice(password)
        .map_err(|_| ConsultifyError::validation("invalid password key length"))?;

    let mut first = keyed.clone();
    first.update(salt);
    first.update(&1u32.to_be_bytes());
    let mut u = [0u8; 32];
    u.copy_from_slice(&first.finalize().into_bytes());

    let mut out = u;
    for _ in 1..rounds {
        let mut mac = keyed.clone();
        mac.update(&u);
        u.copy_from_slice(&mac.finalize().into_bytes());
        for (o, b) in out.iter_mut().zip(u.iter()) {
            *o ^= b;
        }
    }
    Ok(out)
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

    #[test]
    fn hash_then_verify() {
        let stored = hash_with_rounds("correct horse", 50).unwrap();
        assert!(stored.starts_with("pbkdf2-sha256$50$"));
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("battery staple", &stored));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = hash_with_rounds("same", 10).unwrap();
        let b = hash_with_rounds("same", 10).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$abc"));
        assert!(!verify_password("x", "pbkdf2-sha256$zero$AA$AA"));
        assert!(!verify_password("x", "pbkdf2-sha256$0$AAAA$AAAA"));
    }

    #[test]
    fn matches_rfc7914_pbkdf2_vector() {
        let digest = derive(b"passwd", b"salt", 1).unwrap();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(
            hex,
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }
}
