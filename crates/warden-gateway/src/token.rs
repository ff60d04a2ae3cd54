//! Self-issued access tokens handed out by the token exchange.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use warden_core::{AuthError, Clock, TokenIssuer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub iss: String,
    /// Client (owner app) the token was issued to.
    pub sub: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 tokens signed with a server secret.
pub struct JwtTokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl JwtTokenIssuer {
    pub fn new(secret: &[u8], issuer: impl Into<String>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            ttl,
            clock,
        }
    }

    pub fn decode(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;
        // Expiry is checked against the injected clock below.
        validation.validate_exp = false;

        let claims = decode::<AccessTokenClaims>(token, &self.decoding, &validation)
            .map_err(|e| AuthError::InvalidAccessToken {
                reason: e.to_string(),
            })?
            .claims;

        if claims.exp <= self.clock.unix() {
            return Err(AuthError::InvalidAccessToken {
                reason: "token expired".into(),
            });
        }
        Ok(claims)
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue(&self, client_id: &str) -> Result<String, AuthError> {
        let now = self.clock.unix();
        let claims = AccessTokenClaims {
            iss: self.issuer.clone(),
            sub: client_id.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenIssuance(e.to_string()))
    }

    fn verify(&self, token: &str) -> Result<(), AuthError> {
        self.decode(token).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::ManualClock;

    fn issuer(clock: Arc<ManualClock>) -> JwtTokenIssuer {
        JwtTokenIssuer::new(b"test-secret", "warden", Duration::from_secs(3600), clock)
    }

    #[test]
    fn issued_token_verifies_and_names_the_client() {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let issuer = issuer(clock);

        let token = issuer.issue("planner").unwrap();
        issuer.verify(&token).unwrap();
        let claims = issuer.decode(&token).unwrap();
        assert_eq!(claims.sub, "planner");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_ne!(issuer.issue("planner").unwrap(), token);
    }

    #[test]
    fn expired_token_is_invalid() {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let issuer = issuer(clock.clone());
        let token = issuer.issue("planner").unwrap();

        clock.advance(chrono::Duration::hours(2));
        assert!(matches!(
            issuer.verify(&token),
            Err(AuthError::InvalidAccessToken { .. })
        ));
    }

    #[test]
    fn foreign_signature_or_issuer_is_invalid() {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let ours = issuer(clock.clone());
        let theirs = JwtTokenIssuer::new(b"other", "warden", Duration::from_secs(60), clock.clone());
        let other_iss = JwtTokenIssuer::new(b"test-secret", "elsewhere", Duration::from_secs(60), clock);

        assert!(ours.verify(&theirs.issue("x").unwrap()).is_err());
        assert!(ours.verify(&other_iss.issue("x").unwrap()).is_err());
        assert!(ours.verify("garbage").is_err());
    }
}
