use std::sync::Arc;

use chrono::Utc;

use super::{TokenGenerator, parse_token};
use crate::server::AppState;
use crate::types::{Token, User};

#[derive(Debug)]
pub enum TokenValidationError {
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    InternalError,
}

pub struct ValidatedToken {
    pub token: Token,
    pub user: Option<User>,
}

/// Pulls the raw token out of an Authorization header. `Bearer <token>` is
/// the primary scheme; `Basic base64(x-token:<token>)` is accepted for
/// clients that can only speak basic auth. No header at all is `Ok(None)`.
pub fn extract_token_from_header(
    auth_header: Option<&str>,
) -> Result<Option<String>, TokenValidationError> {
    let Some(header) = auth_header else {
        return Ok(None);
    };

    if let Some(bearer) = header.strip_prefix("Bearer ") {
        return Ok(Some(bearer.to_string()));
    }

    if let Some(encoded) = header.strip_prefix("Basic ") {
        return decode_basic_credentials(encoded)
            .map(Some)
            .ok_or(TokenValidationError::InvalidToken);
    }

    Err(TokenValidationError::InvalidScheme)
}

fn decode_basic_credentials(encoded: &str) -> Option<String> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let decoded = STANDARD.decode(encoded).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (username, password) = credentials.split_once(':')?;

    (username == "x-token").then(|| password.to_string())
}

/// Resolves a raw token against the store: lookup by prefix, argon2 verify,
/// expiry check, then the owning user for user-bound tokens. Touches
/// `last_used_at` on success.
pub fn validate_token(
    state: &Arc<AppState>,
    raw_token: &str,
) -> Result<ValidatedToken, TokenValidationError> {
    let (lookup, _) = parse_token(raw_token).map_err(|_| TokenValidationError::InvalidToken)?;

    let token = state
        .store
        .get_token_by_lookup(&lookup)
        .map_err(|_| TokenValidationError::InternalError)?
        .ok_or(TokenValidationError::InvalidToken)?;

    let verified = TokenGenerator::new()
        .verify(raw_token, &token.token_hash)
        .map_err(|_| TokenValidationError::InternalError)?;
    if !verified {
        return Err(TokenValidationError::InvalidToken);
    }

    if token.expires_at.is_some_and(|at| at < Utc::now()) {
        return Err(TokenValidationError::TokenExpired);
    }

    let user = match &token.user_id {
        Some(user_id) => state
            .store
            .get_user(user_id)
            .map_err(|_| TokenValidationError::InternalError)?,
        None => None,
    };

    if let Err(e) = state.store.update_token_last_used(&token.id) {
        tracing::warn!("failed to touch token last_used_at: {e}");
    }

    Ok(ValidatedToken { token, user })
}
