use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};

use crate::{
    auth::claims::Claims,
    errors::{AppError, AppResult},
    models::domain::user::User,
};

/// Outcome of verifying a presented access token. Expired and malformed
/// tokens are expected inputs, not errors; callers decide per endpoint
/// whether an invalid token means anonymous access or a hard reject.
#[derive(Debug, Clone)]
pub enum TokenVerification {
    Valid(Claims),
    Expired,
    Malformed,
}

impl TokenVerification {
    pub fn is_valid(&self) -> bool {
        matches!(self, TokenVerification::Valid(_))
    }
}

/// HMAC-SHA256 codec for access-token claims. The signing key is loaded
/// from configuration at startup and shared read-only across workers.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiration_hours: i64,
}

impl JwtService {
    pub fn new(secret: &SecretString, expiration_hours: i64) -> Self {
        let secret_bytes = secret.expose_secret().as_bytes();

        Self {
            encoding_key: EncodingKey::from_secret(secret_bytes),
            decoding_key: DecodingKey::from_secret(secret_bytes),
            validation: Validation::default(),
            expiration_hours,
        }
    }

    pub fn create_token(&self, user: &User) -> AppResult<String> {
        let claims = Claims::new(user, self.expiration_hours);

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(format!("Failed to create JWT: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> TokenVerification {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => TokenVerification::Valid(data.claims),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    log::warn!("JWT token is expired");
                    TokenVerification::Expired
                }
                _ => {
                    log::warn!("Invalid JWT token: {}", e);
                    TokenVerification::Malformed
                }
            },
        }
    }
}
