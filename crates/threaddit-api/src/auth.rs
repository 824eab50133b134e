use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use threaddit_types::api::Claims;

/// Lifetime of tokens minted by [`issue_token`].
const TOKEN_TTL_DAYS: i64 = 30;

/// Mint an HS256 bearer token for a user.
///
/// Login lives in the auth service; this exists for tooling and tests that
/// need a token signed with the shared secret.
pub fn issue_token(secret: &str, user_id: i64, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}
