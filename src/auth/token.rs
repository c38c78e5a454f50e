use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// JWT claims embedded in issued tokens.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Subject (user id).
    sub: String,
    /// Issued at (seconds since epoch).
    iat: u64,
    /// Expiry (seconds since epoch).
    exp: u64,
}

/// Issues and validates HS256 bearer tokens.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: u64,
}

impl TokenIssuer {
    /// Sign with `secret`; tokens expire after `ttl_days`.
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        let ttl_days = u64::try_from(ttl_days).unwrap_or(0).max(1);
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: ttl_days * 24 * 60 * 60,
        }
    }

    /// Issue a token whose subject is `user_id`.
    pub fn issue(&self, user_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let iat = jsonwebtoken::get_current_timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat,
            exp: iat + self.ttl_secs,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// Check signature and expiry and return the subject.
    pub fn verify(&self, token: &str) -> Result<String, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims.sub)
    }
}
