use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::json;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;
use warden_core::{Catalog, StatusCode};
use warden_gateway::auth::{AuthConfig, AuthMode, StandaloneVerifier, TokenValidator};
use warden_gateway::{AuthInterceptor, CallContext, Metadata};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Idp {
    server: MockServer,
    private_pem: String,
}

impl Idp {
    async fn start(kid: &str) -> Self {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let public = private.to_public_key();
        let jwks = json!({
            "keys": [
                {
                    "kid": "enc-only",
                    "kty": "RSA",
                    "use": "enc",
                    "n": URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
                    "e": URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
                },
                {
                    "kid": kid,
                    "kty": "RSA",
                    "use": "sig",
                    "n": URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
                    "e": URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
                }
            ]
        });

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .mount(&server)
            .await;

        Self {
            server,
            private_pem: private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string(),
        }
    }

    fn config(&self) -> AuthConfig {
        AuthConfig {
            mode: AuthMode::Strict,
            jwks_uri: Some(Url::parse(&format!("{}/.well-known/jwks.json", self.server.uri())).unwrap()),
            issuer: Some("https://idp.example.com".into()),
            audience: vec!["warden".into()],
            allow_private_jwks: true,
            ..Default::default()
        }
    }

    fn sign(&self, kid: &str, sub: &str) -> String {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        header.typ = Some("JWT".into());
        encode(
            &header,
            &json!({
                "sub": sub,
                "iss": "https://idp.example.com",
                "aud": "warden",
                "iat": now,
                "exp": now + 600,
            }),
            &EncodingKey::from_rsa_pem(self.private_pem.as_bytes()).unwrap(),
        )
        .unwrap()
    }
}

#[tokio::test]
async fn validates_against_served_jwks() {
    let idp = Idp::start("key-1").await;
    let validator = TokenValidator::from_config(idp.config()).unwrap();

    let claims = validator.validate(&idp.sign("key-1", "user-7")).await.unwrap();
    assert_eq!(claims.sub, "user-7");

    // Second validation is served from the key cache.
    validator.validate(&idp.sign("key-1", "user-8")).await.unwrap();
    let fetches = idp.server.received_requests().await.unwrap().len();
    assert_eq!(fetches, 1);
}

#[tokio::test]
async fn unknown_or_encryption_kid_is_rejected() {
    let idp = Idp::start("key-1").await;
    let validator = TokenValidator::from_config(idp.config()).unwrap();

    for kid in ["key-2", "enc-only"] {
        let err = validator.validate(&idp.sign(kid, "user-7")).await.unwrap_err();
        assert!(format!("{err:#}").contains("Public key not found"), "{kid}: {err:#}");
    }
}

#[tokio::test]
async fn loopback_jwks_needs_explicit_opt_in() {
    let idp = Idp::start("key-1").await;
    let config = AuthConfig {
        allow_private_jwks: false,
        ..idp.config()
    };
    assert!(TokenValidator::from_config(config).is_err());
}

#[tokio::test]
async fn interceptor_authenticates_user_call_end_to_end() {
    let idp = Idp::start("key-1").await;
    let verifier = StandaloneVerifier::new(
        TokenValidator::from_config(idp.config()).unwrap(),
        Arc::new(Catalog::default()),
        "acme",
        "standalone",
    );
    let gate = AuthInterceptor::new(Arc::new(verifier));
    let method = "/warden.v1.DeviceService/ListDevices";

    let ok = CallContext::new(
        Metadata::new().with("authorization", format!("Bearer {}", idp.sign("key-1", "user-7"))),
    );
    let user = gate
        .intercept(method, ok, |ctx| async move {
            Ok(ctx.principal().and_then(|p| p.user_id()).map(str::to_string))
        })
        .await
        .unwrap();
    assert_eq!(user.as_deref(), Some("user-7"));

    let forged = CallContext::new(
        Metadata::new().with("authorization", format!("Bearer {}", idp.sign("key-9", "user-7"))),
    );
    let err = gate
        .intercept(method, forged, |_| async { Ok(()) })
        .await
        .unwrap_err();
    assert_eq!(err.code, StatusCode::Unauthenticated);
    assert_eq!(err.message, "the request could not be authenticated");
}
