//! End-to-end walk through the OIDC login lifecycle: authorization
//! round trip, nonce handoff, session registration, and back-channel
//! logout.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use serde_json::json;
use sha2::{Digest, Sha256};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use oxidc_auth::federation::{JwksCache, JwksCacheConfig, TokenVerifierConfig};
use oxidc_auth::session::SessionRegistry;
use oxidc_auth::{
    BackChannelLogoutHandler, EphemeralCredentialStore, LoginType, MemoryCache, RelayState,
    TokenVerifier, validate_redirect_url,
};

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as i64
}

/// Mints an RS256 token and the JWKS document that verifies it.
fn signed_token_and_jwks(key: &RsaPrivateKey, payload: serde_json::Value) -> (String, serde_json::Value) {
    let header_b64 = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","kid":"flow-key"}"#);
    let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
    let signing_input = format!("{header_b64}.{payload_b64}");

    let signature = key
        .sign(
            Pkcs1v15Sign::new::<Sha256>(),
            &Sha256::digest(signing_input.as_bytes()),
        )
        .unwrap();
    let token = format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature));

    let public_key = key.to_public_key();
    let jwks = json!({
        "keys": [{
            "kty": "RSA",
            "kid": "flow-key",
            "use": "sig",
            "alg": "RS256",
            "n": URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        }]
    });
    (token, jwks)
}

#[tokio::test]
async fn customer_login_round_trip() {
    let cache = Arc::new(MemoryCache::new());
    let store = EphemeralCredentialStore::new(cache.clone());
    let own_base = Url::parse("https://shop.example.com").unwrap();

    // Outbound: mint a CSRF token bound to the anonymous session and pack
    // everything into the OAuth state parameter.
    let state_token = store.create_state_token("anon-session-1").await.unwrap();
    let relay = RelayState::new(
        "/account/orders",
        "anon-session-1",
        "Storefront",
        LoginType::Customer,
        &state_token,
    )
    .with_provider_id(3);
    let blob = relay.encode();

    // Inbound: the provider redirects back with the blob untouched.
    let decoded = RelayState::decode(&blob).expect("blob survives the round trip");
    assert_eq!(decoded.login_type, LoginType::Customer);
    assert_eq!(decoded.provider_id, 3);

    // The CSRF token validates exactly once for the originating session.
    assert!(
        store
            .validate_state_token(&decoded.session_id, &decoded.state_token)
            .await
            .unwrap()
    );
    assert!(
        !store
            .validate_state_token(&decoded.session_id, &decoded.state_token)
            .await
            .unwrap()
    );

    // The stored redirect target is safe to follow.
    assert_eq!(
        validate_redirect_url(&decoded.relay_url, "/", &own_base),
        "/account/orders"
    );

    // Handoff to the storefront: a customer nonce carries the identity
    // and relay state across the domain boundary, single-use.
    let nonce = store
        .create_customer_login_nonce("user@example.com", &blob)
        .await
        .unwrap();
    let payload = store
        .redeem_customer_login_nonce(&nonce)
        .await
        .unwrap()
        .expect("first redemption succeeds");
    assert_eq!(payload.email, "user@example.com");
    assert_eq!(payload.relay_state, blob);
    assert!(
        store
            .redeem_customer_login_nonce(&nonce)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn admin_login_handoff() {
    let store = EphemeralCredentialStore::new(Arc::new(MemoryCache::new()));

    // After IdP verification, the admin flow mints a nonce and redirects
    // the browser to the backend carrying it.
    let nonce = store
        .create_admin_login_nonce("admin@example.com")
        .await
        .unwrap();

    // The backend redeems it exactly once.
    assert_eq!(
        store.redeem_admin_login_nonce(&nonce).await.unwrap(),
        Some("admin@example.com".to_string())
    );
    assert_eq!(store.redeem_admin_login_nonce(&nonce).await.unwrap(), None);

    // Tampered and fabricated nonces never resolve.
    assert_eq!(
        store
            .redeem_admin_login_nonce("0000not-hex-at-all-000000000000")
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn verified_login_then_backchannel_logout() {
    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();

    // ID token issued at login.
    let (id_token, jwks) = signed_token_and_jwks(
        &key,
        json!({
            "iss": "https://idp.example.com",
            "aud": "shop-client",
            "sub": "user-42",
            "sid": "idp-session-9",
            "exp": unix_now() + 300,
        }),
    );

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
        .mount(&server)
        .await;
    let jwks_url = Url::parse(&format!("{}/jwks", server.uri())).unwrap();

    let verifier = Arc::new(TokenVerifier::new(
        Arc::new(JwksCache::new(
            JwksCacheConfig::default().with_allow_http(true),
        )),
        TokenVerifierConfig::default(),
    ));

    // Verify the ID token and register the local session it establishes.
    let claims = verifier
        .verify_and_decode(
            &id_token,
            &jwks_url,
            Some("https://idp.example.com"),
            Some("shop-client"),
        )
        .await
        .unwrap();
    let sub = claims.subject().unwrap();
    let sid = claims.session_id().unwrap();

    let registry = Arc::new(SessionRegistry::new(Arc::new(MemoryCache::new())));
    registry
        .register(sub, sid, "local-session-7", None)
        .await
        .unwrap();

    // Later, the provider pushes a logout token for the same sub/sid.
    let (logout_token, _) = signed_token_and_jwks(
        &key,
        json!({
            "iss": "https://idp.example.com",
            "aud": "shop-client",
            "sub": "user-42",
            "sid": "idp-session-9",
            "exp": unix_now() + 120,
            "events": { "http://schemas.openid.net/event/backchannel-logout": {} },
        }),
    );

    let handler = BackChannelLogoutHandler::new(verifier, registry.clone());
    let revoked = handler
        .handle_logout_token(
            &logout_token,
            &jwks_url,
            "https://idp.example.com",
            "shop-client",
        )
        .await
        .unwrap();
    assert_eq!(revoked, Some("local-session-7".to_string()));

    // The registration is gone afterwards.
    assert_eq!(registry.resolve("user-42", "idp-session-9").await.unwrap(), None);
}
