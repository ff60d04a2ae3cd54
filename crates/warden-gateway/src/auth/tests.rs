use super::config::{AuthConfig, AuthMode};
use super::validation::TokenValidator;
use super::verifier::{IdentityVerifier, StandaloneVerifier};
use super::hash_api_key;
use crate::interceptor::{CallContext, Metadata};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use warden_core::{ApiKeyEntry, AuthError, Catalog};

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn valid_claims() -> serde_json::Value {
    json!({
        "sub": "user-123",
        "username": "alice@example.com",
        "iss": "https://idp.example.com",
        "aud": "warden",
        "exp": now() + 3600,
        "iat": now(),
    })
}

fn strict() -> AuthConfig {
    AuthConfig {
        mode: AuthMode::Strict,
        ..Default::default()
    }
}

/// `<header>.e30.sig`: a token whose header parses but whose signature is junk.
fn forged(header_json: &str) -> String {
    format!("{}.e30.sig", URL_SAFE_NO_PAD.encode(header_json))
}

struct RsaKeys {
    private_pem: String,
    public_pem: String,
}

fn rsa_keys() -> RsaKeys {
    use rsa::{pkcs8::EncodePrivateKey, pkcs8::EncodePublicKey, RsaPrivateKey};
    let mut rng = rand::thread_rng();
    let private = RsaPrivateKey::new(&mut rng, 2048).expect("failed to generate key");
    RsaKeys {
        private_pem: private
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .unwrap()
            .to_string(),
        public_pem: private
            .to_public_key()
            .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
            .unwrap(),
    }
}

fn sign_rs256(keys: &RsaKeys, typ: Option<&str>, claims: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.typ = typ.map(str::to_string);
    encode(
        &header,
        claims,
        &EncodingKey::from_rsa_pem(keys.private_pem.as_bytes()).unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_hs256_is_rejected_in_every_mode() {
    let token = encode(
        &Header::new(Algorithm::HS256),
        &valid_claims(),
        &EncodingKey::from_secret(b"shared"),
    )
    .unwrap();

    for mode in [AuthMode::Strict, AuthMode::Permissive] {
        let validator = TokenValidator::new(
            AuthConfig {
                mode,
                ..Default::default()
            },
            None,
        );
        let err = validator.validate(&token).await.unwrap_err();
        assert!(err.to_string().contains("Algorithm HS256 not allowed"), "{err}");
    }
}

#[tokio::test]
async fn test_typ_discipline_strict() {
    let validator = TokenValidator::new(strict(), None);

    let err = validator
        .validate(&forged(r#"{"alg":"RS256"}"#))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Missing 'typ' header"));

    let err = validator
        .validate(&forged(r#"{"alg":"RS256","typ":"text"}"#))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Token type 'text' not accepted"));
}

#[tokio::test]
async fn test_header_hardening() {
    let validator = TokenValidator::new(strict(), None);

    let err = validator
        .validate(&forged(
            r#"{"alg":"RS256","typ":"JWT","jku":"https://evil.example/keys"}"#,
        ))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("dangerous headers"));

    let err = validator
        .validate(&forged(r#"{"alg":"RS256","typ":"JWT","crit":["exp"]}"#))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("critical extensions"));
}

#[tokio::test]
async fn test_malformed_and_unconfigured() {
    let validator = TokenValidator::new(strict(), None);
    let err = validator.validate("only.two").await.unwrap_err();
    assert!(err.to_string().contains("Invalid JWT format"));

    let err = validator
        .validate(&forged(r#"{"alg":"RS256","typ":"JWT"}"#))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Auth not configured"));
}

#[tokio::test]
async fn test_rs256_full_path_and_audience() {
    let keys = rsa_keys();
    let config = AuthConfig {
        audience: vec!["warden".to_string()],
        issuer: Some("https://idp.example.com".to_string()),
        ..strict()
    };
    let validator =
        TokenValidator::with_static_key(config.clone(), keys.public_pem.as_bytes()).unwrap();

    let token = sign_rs256(&keys, Some("JWT"), &valid_claims());
    let claims = validator.validate(&token).await.unwrap();
    assert_eq!(claims.sub, "user-123");
    assert_eq!(claims.user_id(), "alice@example.com");

    let mut wrong_aud = valid_claims();
    wrong_aud["aud"] = json!("someone-else");
    let err = validator
        .validate(&sign_rs256(&keys, Some("JWT"), &wrong_aud))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("JWT validation failed"));

    let mut expired = valid_claims();
    expired["exp"] = json!(now() - 3600);
    assert!(validator
        .validate(&sign_rs256(&keys, Some("JWT"), &expired))
        .await
        .is_err());
}

#[tokio::test]
async fn test_permissive_mode_tolerates_missing_typ() {
    let keys = rsa_keys();
    let validator = TokenValidator::with_static_key(
        AuthConfig {
            mode: AuthMode::Permissive,
            ..Default::default()
        },
        keys.public_pem.as_bytes(),
    )
    .unwrap();

    let token = sign_rs256(&keys, None, &valid_claims());
    assert!(validator.validate(&token).await.is_ok());
}

fn catalog_with_keys() -> Arc<Catalog> {
    Arc::new(Catalog {
        api_keys: vec![
            ApiKeyEntry {
                digest: hash_api_key("app-key"),
                app_id: Some("planner".into()),
                name: Some("planner".into()),
                user_id: None,
            },
            ApiKeyEntry {
                digest: hash_api_key("user-key"),
                app_id: None,
                name: Some("alice laptop".into()),
                user_id: Some("alice".into()),
            },
        ],
        ..Default::default()
    })
}

fn standalone(validator: TokenValidator) -> StandaloneVerifier {
    StandaloneVerifier::new(validator, catalog_with_keys(), "acme", "standalone")
}

fn ctx() -> CallContext {
    CallContext::new(Metadata::new())
}

#[tokio::test]
async fn test_api_key_scoping() {
    let verifier = standalone(TokenValidator::new(strict(), None));

    let out = verifier.auth_api_key(ctx(), "app-key", true).await.unwrap();
    let principal = out.principal().unwrap();
    assert_eq!(principal.app_id(), Some("planner"));
    assert_eq!(principal.tenant_id.as_deref(), Some("standalone"));
    assert_eq!(principal.organization_id.as_deref(), Some("acme"));

    let out = verifier.auth_api_key(ctx(), "user-key", false).await.unwrap();
    assert_eq!(out.principal().unwrap().user_id(), Some("alice"));

    for (key, for_apps) in [("app-key", false), ("user-key", true), ("nope", true)] {
        let err = verifier.auth_api_key(ctx(), key, for_apps).await.unwrap_err();
        assert!(
            matches!(err, AuthError::InvalidCredential { .. }),
            "{key}/{for_apps}: {err:?}"
        );
    }
}

#[tokio::test]
async fn test_jwt_requires_bearer_scheme() {
    let keys = rsa_keys();
    let verifier = standalone(
        TokenValidator::with_static_key(strict(), keys.public_pem.as_bytes()).unwrap(),
    );
    let token = sign_rs256(&keys, Some("at+jwt"), &valid_claims());

    let out = verifier
        .auth_jwt(ctx(), &format!("Bearer {token}"))
        .await
        .unwrap();
    assert_eq!(out.principal().unwrap().user_id(), Some("alice@example.com"));

    for raw in [token.clone(), format!("Basic {token}"), "Bearer ".to_string()] {
        let err = verifier.auth_jwt(ctx(), &raw).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential { .. }));
    }
}
