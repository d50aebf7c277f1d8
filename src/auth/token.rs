//! Opaque bearer tokens of the form `taskhive_<lookup>_<secret>`. The lookup
//! segment is stored in the clear and indexed; only the argon2id hash of the
//! full token ever reaches the database.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;

use crate::error::{Error, Result};

const TOKEN_PREFIX: &str = "taskhive";
const LOOKUP_LENGTH: usize = 8;
const SECRET_LENGTH: usize = 24;
const SECRET_BYTES: usize = SECRET_LENGTH / 2;

const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

pub struct TokenGenerator {
    argon2: Argon2<'static>,
}

impl TokenGenerator {
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(
            ARGON2_MEMORY_KIB,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .expect("invalid argon2 params");

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Mints a fresh token. Returns (raw_token, lookup, hash); the raw token
    /// is shown to the caller once and never stored.
    pub fn generate(&self) -> Result<(String, String, String)> {
        let lookup = random_lookup();
        let raw_token = format!("{TOKEN_PREFIX}_{lookup}_{}", random_secret());
        let hash = self.hash(&raw_token)?;
        Ok((raw_token, lookup, hash))
    }

    pub fn hash(&self, token: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(token.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| Error::Config(format!("failed to hash token: {e}")))
    }

    /// Constant-time comparison of a presented token against a stored hash.
    pub fn verify(&self, token: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| Error::Config(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(token.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Config(format!("failed to verify token: {e}"))),
        }
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// The lookup only needs to be unique, not secret; the leading hex of a v4
// UUID is enough, and the unique index catches the rare collision.
fn random_lookup() -> String {
    uuid::Uuid::new_v4().to_string()[..LOOKUP_LENGTH].to_string()
}

fn random_secret() -> String {
    use std::fmt::Write;

    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill(&mut bytes);

    bytes.iter().fold(
        String::with_capacity(SECRET_LENGTH),
        |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        },
    )
}

/// Splits a raw token into (lookup, secret), rejecting anything that does not
/// match the expected shape exactly.
pub fn parse_token(token: &str) -> Result<(String, String)> {
    let rest = token
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or(Error::InvalidTokenFormat)?;

    let (lookup, secret) = rest.split_once('_').ok_or(Error::InvalidTokenFormat)?;

    if lookup.len() != LOOKUP_LENGTH
        || secret.len() != SECRET_LENGTH
        || secret.contains('_')
    {
        return Err(Error::InvalidTokenFormat);
    }

    Ok((lookup.to_string(), secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_have_the_expected_shape() {
        let generator = TokenGenerator::new();
        let (token, lookup, hash) = generator.generate().unwrap();

        assert!(token.starts_with("taskhive_"));
        assert_eq!(lookup.len(), LOOKUP_LENGTH);
        assert!(hash.starts_with("$argon2id$"));

        let (parsed_lookup, parsed_secret) = parse_token(&token).unwrap();
        assert_eq!(parsed_lookup, lookup);
        assert_eq!(parsed_secret.len(), SECRET_LENGTH);
    }

    #[test]
    fn verify_accepts_the_original_and_rejects_a_tampered_token() {
        let generator = TokenGenerator::new();
        let (token, _, hash) = generator.generate().unwrap();

        assert!(generator.verify(&token, &hash).unwrap());

        let mut tampered = token.clone();
        tampered.pop();
        tampered.push('x');
        assert!(!generator.verify(&tampered, &hash).unwrap());
    }

    #[test]
    fn parse_rejects_wrong_prefix() {
        assert!(parse_token("other_12345678_123456789012345678901234").is_err());
    }

    #[test]
    fn parse_rejects_missing_or_short_segments() {
        assert!(parse_token("taskhive_12345678").is_err());
        assert!(parse_token("taskhive_1234_123456789012345678901234").is_err());
        assert!(parse_token("taskhive_12345678_short").is_err());
    }

    #[test]
    fn parse_accepts_a_well_formed_token() {
        let (lookup, secret) = parse_token("taskhive_12345678_123456789012345678901234").unwrap();
        assert_eq!(lookup, "12345678");
        assert_eq!(secret, "123456789012345678901234");
    }
}
