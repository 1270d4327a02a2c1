//! ## RADIUS client
//!
//! Sends requests over a single UDP socket and matches inbound
//! datagrams back to their callers, with fixed-attempt retransmission.
//! Correlation runs in one of two strategies, see
//! [`correlator::Strategy`]: by packet identifier and peer address, or
//! by an appended Proxy-State attribute as a proxy chain requires.
//!
//! ```no_run
//! use codec::Endpoint;
//! use radius_server_client::RadiusClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RadiusClient::builder().build().await?;
//!     let endpoint = Endpoint::new("127.0.0.1:1812".parse()?, "testing123");
//!
//!     let response = client.authenticate(&endpoint, "test", "password").await?;
//!     println!("{:?}", response.code());
//!     Ok(())
//! }
//! ```

pub mod correlator;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use codec::{Code, Dictionary, Endpoint, Packet};
use thiserror::Error;
use tokio::{net::UdpSocket, task::JoinHandle, time::timeout};

use crate::correlator::{Correlator, Key, Strategy};

/// Error types returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Every attempt elapsed without a matching response.
    #[error("request timed out after {0} attempts")]
    Timeout(usize),

    /// All 256 identifiers toward this peer are in flight. The new
    /// send is rejected; the outstanding requests keep their slots.
    #[error("identifier space toward {0} is exhausted")]
    IdentifierCollision(SocketAddr),

    /// An inbound datagram matched no outstanding request.
    #[error("no matching request for inbound response")]
    CorrelationMiss,

    /// The client socket reader went away.
    #[error("client closed")]
    Closed,

    #[error(transparent)]
    Codec(#[from] codec::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct RadiusClientBuilder {
    bind: SocketAddr,
    dictionary: Arc<Dictionary>,
    strategy: Strategy,
    max_attempts: usize,
    timeout: Duration,
}

impl Default for RadiusClientBuilder {
    fn default() -> Self {
        Self {
            bind: ([0, 0, 0, 0], 0).into(),
            dictionary: Arc::new(Dictionary::default()),
            strategy: Strategy::default(),
            max_attempts: 3,
            timeout: Duration::from_millis(6000),
        }
    }
}

impl RadiusClientBuilder {
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn with_dictionary(mut self, dictionary: Arc<Dictionary>) -> Self {
        self.dictionary = dictionary;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Attempts per request, each with its own timeout. At least one.
    pub fn with_retry(mut self, max_attempts: usize, timeout: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.timeout = timeout;
        self
    }

    pub async fn build(self) -> Result<RadiusClient, Error> {
        let socket = Arc::new(UdpSocket::bind(self.bind).await?);
        let correlator = Arc::new(Correlator::new(self.strategy));

        let reader = tokio::spawn(read_responses(
            socket.clone(),
            correlator.clone(),
            self.dictionary.clone(),
        ));

        Ok(RadiusClient {
            socket,
            correlator,
            dictionary: self.dictionary,
            max_attempts: self.max_attempts,
            timeout: self.timeout,
            reader,
        })
    }
}

/// An async RADIUS client over one UDP socket.
///
/// The socket lives as long as the client value; dropping the client
/// stops the reader task and releases it.
pub struct RadiusClient {
    socket: Arc<UdpSocket>,
    correlator: Arc<Correlator>,
    dictionary: Arc<Dictionary>,
    max_attempts: usize,
    timeout: Duration,
    reader: JoinHandle<()>,
}

impl Drop for RadiusClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl RadiusClient {
    pub fn builder() -> RadiusClientBuilder {
        RadiusClientBuilder::default()
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }

    pub fn strategy(&self) -> Strategy {
        self.correlator.strategy()
    }

    /// Outstanding request count, for diagnostics and tests.
    pub fn outstanding(&self) -> usize {
        self.correlator.outstanding()
    }

    /// Send a request and await its verified response.
    ///
    /// The request is encoded once; every retransmission resends the
    /// same octets, so the authenticator and the correlation key are
    /// stable across attempts. Cancelling the returned future evicts
    /// the correlator entry.
    pub async fn send(&self, packet: Packet, endpoint: &Endpoint) -> Result<Packet, Error> {
        let (key, bytes, mut receiver) = self.correlator.register(packet, endpoint)?;
        let guard = EvictGuard {
            correlator: &self.correlator,
            key: Some(key),
        };

        for attempt in 1..=self.max_attempts {
            self.socket.send_to(&bytes, endpoint.addr).await?;
            log::trace!(
                "request sent: peer={:?}, attempt={}/{}",
                endpoint.addr,
                attempt,
                self.max_attempts
            );

            match timeout(self.timeout, &mut receiver).await {
                Ok(Ok(response)) => {
                    guard.disarm();
                    return Ok(response);
                }
                Ok(Err(_)) => return Err(Error::Closed),
                Err(_) => log::warn!(
                    "request attempt timed out: peer={:?}, attempt={}/{}",
                    endpoint.addr,
                    attempt,
                    self.max_attempts
                ),
            }
        }

        Err(Error::Timeout(self.max_attempts))
    }

    /// PAP authentication round trip: build an Access-Request with
    /// User-Name and User-Password and await the server verdict.
    pub async fn authenticate(
        &self,
        endpoint: &Endpoint,
        user: &str,
        password: &str,
    ) -> Result<Packet, Error> {
        let request =
            codec::packet::access::AccessRequest::new(self.dictionary.clone(), correlator::next_identifier())
                .with_pap(user, password)
                .into_packet();

        self.send(request, endpoint).await
    }

    /// Accounting round trip with the given Acct-Status-Type, by name
    /// (`Start`, `Stop`, ...) or number.
    pub async fn account(
        &self,
        endpoint: &Endpoint,
        user: &str,
        session_id: &str,
        status: &str,
    ) -> Result<Packet, Error> {
        let request = Packet::new(
            self.dictionary.clone(),
            Code::AccountingRequest,
            correlator::next_identifier(),
        )
        .with_attribute(self.dictionary.attribute("User-Name", user)?)
        .with_attribute(self.dictionary.attribute("Acct-Session-Id", session_id)?)
        .with_attribute(self.dictionary.attribute("Acct-Status-Type", status)?);

        self.send(request, endpoint).await
    }
}

/// Removes the correlator entry unless the request completed, covering
/// timeouts, send failures and cancelled callers alike.
struct EvictGuard<'a> {
    correlator: &'a Correlator,
    key: Option<Key>,
}

impl EvictGuard<'_> {
    fn disarm(mut self) {
        self.key = None;
    }
}

impl Drop for EvictGuard<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.correlator.evict(&key);
        }
    }
}

async fn read_responses(
    socket: Arc<UdpSocket>,
    correlator: Arc<Correlator>,
    dictionary: Arc<Dictionary>,
) {
    let mut buf = vec![0u8; 4096];

    loop {
        let (size, source) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                log::warn!("client socket receive error: {:?}", e);
                continue;
            }
        };

        match correlator.complete(&buf[..size], source, &dictionary) {
            Ok(()) => {}
            Err(Error::CorrelationMiss) => {
                log::info!("unmatched response dropped: source={:?}", source)
            }
            Err(e) => log::warn!("response dropped: source={:?}, error={:?}", source, e),
        }
    }
}
