use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use codec::{
    Code, Dictionary, Packet,
    attribute::{Attribute, PROXY_STATE, VENDOR_NONE},
    packet::access::AccessRequest,
};
use radius_server_service::{
    Handler, RequestCtx, Router, RouterOptions, SecretProvider,
    handlers::{CredentialStore, DefaultHandler},
};

const SECRET: &str = "testing123";

#[derive(Clone)]
struct AnySecret;

impl SecretProvider for AnySecret {
    async fn secret(&self, _: &SocketAddr) -> Option<String> {
        Some(SECRET.to_string())
    }
}

struct CountingStore {
    users: HashMap<String, String>,
    lookups: Arc<AtomicUsize>,
}

impl CredentialStore for CountingStore {
    async fn password(&self, user: &str) -> Option<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.users.get(user).cloned()
    }
}

fn dict() -> Arc<Dictionary> {
    Arc::new(Dictionary::default())
}

fn source() -> SocketAddr {
    ([127, 0, 0, 1], 40000).into()
}

fn router(
    dict: &Arc<Dictionary>,
    users: &[(&str, &str)],
) -> (Router<AnySecret, DefaultHandler<CountingStore>>, Arc<AtomicUsize>) {
    let lookups = Arc::new(AtomicUsize::new(0));
    let store = CountingStore {
        users: users
            .iter()
            .map(|(user, password)| (user.to_string(), password.to_string()))
            .collect(),
        lookups: lookups.clone(),
    };

    let router = Router::new(
        dict.clone(),
        AnySecret,
        DefaultHandler::new(store),
        RouterOptions::default(),
    );

    (router, lookups)
}

#[tokio::test]
async fn pap_accept_carries_a_welcome() -> Result<()> {
    let dict = dict();
    let (router, _) = router(&dict, &[("test", "password")]);

    let request = AccessRequest::new(dict.clone(), 42)
        .with_pap("test", "password")
        .into_packet()
        .encode_request(SECRET)?;
    let request_auth = *request.authenticator().unwrap();
    let bytes = request.to_bytes()?;

    let (reply, target) = router.route(&bytes, source()).await.unwrap();
    assert_eq!(target, source());

    let response = Packet::decode_response(&reply, dict, SECRET, &request_auth)?;
    assert_eq!(response.code(), Code::AccessAccept);
    assert_eq!(response.identifier(), 42);
    assert_eq!(
        response.attribute_text("Reply-Message").as_deref(),
        Some("Welcome test!")
    );
    Ok(())
}

#[tokio::test]
async fn chap_reject_copies_proxy_state() -> Result<()> {
    let dict = dict();
    let (router, _) = router(&dict, &[("test", "right")]);

    let request = AccessRequest::new(dict.clone(), 7)
        .with_chap("test", "wrong")
        .into_packet()
        .with_attribute(Attribute::octets(PROXY_STATE, b"state-1".to_vec()))
        .encode_request(SECRET)?;
    let request_auth = *request.authenticator().unwrap();
    let bytes = request.to_bytes()?;

    let (reply, _) = router.route(&bytes, source()).await.unwrap();
    let response = Packet::decode_response(&reply, dict, SECRET, &request_auth)?;

    assert_eq!(response.code(), Code::AccessReject);
    assert_eq!(response.identifier(), 7);

    let states = response.find_all(VENDOR_NONE, PROXY_STATE);
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].value(), b"state-1");
    Ok(())
}

#[tokio::test]
async fn unknown_user_is_rejected() -> Result<()> {
    let dict = dict();
    let (router, _) = router(&dict, &[]);

    let bytes = AccessRequest::new(dict.clone(), 1)
        .with_pap("ghost", "password")
        .into_packet()
        .encode_request(SECRET)?
        .to_bytes()?;

    let (reply, _) = router.route(&bytes, source()).await.unwrap();
    let response = Packet::decode(&reply, dict)?;
    assert_eq!(response.code(), Code::AccessReject);
    Ok(())
}

#[tokio::test]
async fn identical_retransmits_run_the_handler_once() -> Result<()> {
    let dict = dict();
    let (router, lookups) = router(&dict, &[("test", "password")]);

    let bytes = AccessRequest::new(dict.clone(), 5)
        .with_pap("test", "password")
        .into_packet()
        .encode_request(SECRET)?
        .to_bytes()?;

    let (first, _) = router.route(&bytes, source()).await.unwrap();
    let (second, _) = router.route(&bytes, source()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(lookups.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn a_fresh_authenticator_is_a_fresh_request() -> Result<()> {
    let dict = dict();
    let (router, lookups) = router(&dict, &[("test", "password")]);

    // Same identifier and source, two different authenticators.
    for _ in 0..2 {
        let bytes = AccessRequest::new(dict.clone(), 5)
            .with_pap("test", "password")
            .into_packet()
            .encode_request(SECRET)?
            .to_bytes()?;
        router.route(&bytes, source()).await.unwrap();
    }

    assert_eq!(lookups.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn accounting_is_acknowledged_with_proxy_state() -> Result<()> {
    let dict = dict();
    let (router, _) = router(&dict, &[]);

    let request = Packet::new(dict.clone(), Code::AccountingRequest, 9)
        .with_attribute(dict.attribute("Acct-Status-Type", "Start")?)
        .with_attribute(dict.attribute("Acct-Session-Id", "abc")?)
        .with_attribute(Attribute::octets(PROXY_STATE, b"ps".to_vec()))
        .encode_request(SECRET)?;
    let request_auth = *request.authenticator().unwrap();
    let bytes = request.to_bytes()?;

    let (reply, _) = router.route(&bytes, source()).await.unwrap();
    let response = Packet::decode_response(&reply, dict, SECRET, &request_auth)?;

    assert_eq!(response.code(), Code::AccountingResponse);
    assert_eq!(
        response.find_all(VENDOR_NONE, PROXY_STATE)[0].value(),
        b"ps"
    );
    Ok(())
}

#[tokio::test]
async fn malformed_and_unverified_datagrams_are_dropped() -> Result<()> {
    let dict = dict();
    let (router, lookups) = router(&dict, &[("test", "password")]);

    // Not even a header.
    assert!(router.route(&[0x01, 0x02], source()).await.is_none());

    // A well formed accounting request under the wrong secret.
    let bytes = Packet::new(dict.clone(), Code::AccountingRequest, 1)
        .with_attribute(dict.attribute("Acct-Session-Id", "x")?)
        .encode_request("wrong-secret")?
        .to_bytes()?;
    assert!(router.route(&bytes, source()).await.is_none());

    assert_eq!(lookups.load(Ordering::SeqCst), 0);
    Ok(())
}

struct NoSecret;

impl SecretProvider for NoSecret {
    async fn secret(&self, _: &SocketAddr) -> Option<String> {
        None
    }
}

#[tokio::test]
async fn unknown_peers_are_dropped_before_parsing() -> Result<()> {
    let dict = dict();
    let router = Router::new(
        dict.clone(),
        NoSecret,
        DefaultHandler::new(HashMap::new()),
        RouterOptions::default(),
    );

    let bytes = AccessRequest::new(dict, 1)
        .with_pap("test", "password")
        .into_packet()
        .encode_request(SECRET)?
        .to_bytes()?;

    assert!(router.route(&bytes, source()).await.is_none());
    Ok(())
}

struct StallingHandler;

impl Handler for StallingHandler {
    async fn handle(&self, _: &RequestCtx) -> Result<Option<Packet>, radius_server_service::Error> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(None)
    }
}

#[tokio::test(start_paused = true)]
async fn handler_budget_is_enforced() -> Result<()> {
    let dict = dict();
    let router = Router::new(
        dict.clone(),
        AnySecret,
        StallingHandler,
        RouterOptions {
            handler_budget: Duration::from_millis(100),
            ..RouterOptions::default()
        },
    );

    let bytes = AccessRequest::new(dict, 1)
        .with_pap("test", "password")
        .into_packet()
        .encode_request(SECRET)?
        .to_bytes()?;

    // The budget fails the handler future; the request is dropped and
    // the dedup marker cleared for the next retransmit.
    assert!(router.route(&bytes, source()).await.is_none());
    assert!(router.cache().is_empty());
    Ok(())
}
