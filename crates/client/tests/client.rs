use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use codec::{
    Code, Dictionary, Endpoint, Packet,
    attribute::{Attribute, PROXY_STATE, VENDOR_NONE},
};
use radius_server_client::{Error, RadiusClient, correlator::Strategy};
use tokio::net::UdpSocket;

/// A one-task server that accepts everything it can verify, echoing
/// Proxy-State attributes the way a conforming server must.
async fn spawn_server(secret: &'static str) -> Result<SocketAddr> {
    let socket = UdpSocket::bind("127.0.0.1:0").await?;
    let addr = socket.local_addr()?;
    let dict = Arc::new(Dictionary::default());

    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let Ok((size, source)) = socket.recv_from(&mut buf).await else {
                break;
            };

            let Ok(request) = Packet::decode_request(&buf[..size], dict.clone(), secret) else {
                continue;
            };

            let auth = *request.authenticator().unwrap();
            let states: Vec<Vec<u8>> = request
                .find_all(VENDOR_NONE, PROXY_STATE)
                .into_iter()
                .map(|state| state.value().to_vec())
                .collect();

            let mut response = request.response(Code::AccessAccept);
            for state in states {
                response = response.with_attribute(Attribute::octets(PROXY_STATE, state));
            }

            let Ok(encoded) = response.encode_response(secret, &auth) else {
                continue;
            };
            let _ = socket
                .send_to(&encoded.to_bytes().unwrap(), source)
                .await;
        }
    });

    Ok(addr)
}

#[tokio::test]
async fn authenticate_round_trip() -> Result<()> {
    let addr = spawn_server("testing123").await?;
    let client = RadiusClient::builder().build().await?;
    let endpoint = Endpoint::new(addr, "testing123");

    let response = client.authenticate(&endpoint, "test", "password").await?;
    assert_eq!(response.code(), Code::AccessAccept);
    assert_eq!(client.outstanding(), 0);
    Ok(())
}

#[tokio::test]
async fn proxy_state_survives_and_is_stripped() -> Result<()> {
    let addr = spawn_server("testing123").await?;
    let client = RadiusClient::builder()
        .with_strategy(Strategy::ProxyState)
        .build()
        .await?;
    let endpoint = Endpoint::new(addr, "testing123");

    let dict = client.dictionary().clone();
    let request = Packet::new(dict.clone(), Code::AccessRequest, 99)
        .with_attribute(dict.attribute("User-Name", "test")?);

    let response = client.send(request, &endpoint).await?;

    // The identifier survived the hop and the correlator's own
    // Proxy-State is gone from the delivered response.
    assert_eq!(response.identifier(), 99);
    assert!(response.find_all(VENDOR_NONE, PROXY_STATE).is_empty());
    assert_eq!(client.outstanding(), 0);
    Ok(())
}

#[tokio::test]
async fn exhausted_attempts_time_out_and_evict() -> Result<()> {
    // Bound but never answered.
    let silent = UdpSocket::bind("127.0.0.1:0").await?;
    let endpoint = Endpoint::new(silent.local_addr()?, "testing123");

    let client = RadiusClient::builder()
        .with_retry(2, Duration::from_millis(50))
        .build()
        .await?;

    let outcome = client.authenticate(&endpoint, "test", "password").await;
    assert!(matches!(outcome, Err(Error::Timeout(2))));
    assert_eq!(client.outstanding(), 0);
    Ok(())
}

#[tokio::test]
async fn responses_under_the_wrong_secret_never_complete() -> Result<()> {
    let addr = spawn_server("other-secret").await?;
    let endpoint = Endpoint::new(addr, "testing123");

    let client = RadiusClient::builder()
        .with_retry(1, Duration::from_millis(100))
        .build()
        .await?;

    let outcome = client.authenticate(&endpoint, "test", "password").await;
    assert!(matches!(outcome, Err(Error::Timeout(1))));
    assert_eq!(client.outstanding(), 0);
    Ok(())
}

#[tokio::test]
async fn cancellation_evicts_the_correlator_entry() -> Result<()> {
    let silent = UdpSocket::bind("127.0.0.1:0").await?;
    let endpoint = Endpoint::new(silent.local_addr()?, "testing123");

    let client = RadiusClient::builder()
        .with_retry(3, Duration::from_secs(60))
        .build()
        .await?;

    let mut future = Box::pin(client.authenticate(&endpoint, "test", "password"));

    // Poll long enough for the request to register, then drop it.
    let _ = tokio::time::timeout(Duration::from_millis(50), &mut future).await;
    assert_eq!(client.outstanding(), 1);
    drop(future);

    assert_eq!(client.outstanding(), 0);
    Ok(())
}
