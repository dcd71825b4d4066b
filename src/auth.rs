use actix_web::{dev::Payload, Error, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use std::future::{ready, Ready};

use crate::models::Principal;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Caller principal.
    pub sub: String,
    pub exp: usize,
}

fn secret() -> Option<String> {
    env::var("JWT_SECRET").ok().filter(|s| !s.is_empty())
}

/// Validate a JWT and return its claims.
fn decode_jwt(token: &str) -> Option<Claims> {
    let secret = secret()?;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .ok()
}

/// Extractor yielding validated `Claims`. Use `Option<Auth>` where anonymous
/// callers are allowed.
pub struct Auth(pub Claims);

impl Auth {
    pub fn principal(&self) -> Principal {
        Principal(self.0.sub.clone())
    }
}

impl FromRequest for Auth {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        // Delegate to BearerAuth to parse the header.
        if let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() {
            return match decode_jwt(bearer.token()) {
                Some(claims) => ready(Ok(Auth(claims))),
                None => ready(Err(actix_web::error::ErrorUnauthorized("Invalid JWT"))),
            };
        }
        ready(Err(actix_web::error::ErrorUnauthorized("Authorization required")))
    }
}

/// Issue a 24h token for `principal`.
pub fn create_jwt(principal: &Principal) -> Result<String, jsonwebtoken::errors::Error> {
    let secret = secret().ok_or_else(|| jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidKeyFormat))?;
    let expiration = (chrono::Utc::now() + chrono::Duration::hours(24)).timestamp() as usize;
    let claims = Claims { sub: principal.0.clone(), exp: expiration };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}
