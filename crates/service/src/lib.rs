//! ## RADIUS server pipeline
//!
//! One inbound datagram runs through four stages: shared secret lookup
//! for the sender, decode and verification, retransmit absorption
//! against the response cache, then the handler. The handler's packet
//! is encoded against the request authenticator and cached so an
//! identical retransmit gets identical octets back.
//!
//! The pipeline is transport free: [`Router::route`] takes bytes and a
//! source address and returns the bytes to send back, if any. The
//! server binary owns the sockets.

pub mod dedup;
pub mod handlers;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use bytes::Bytes;
use codec::{Dictionary, Packet};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::dedup::{Begin, CacheKey, ResponseCache};

/// Error types returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The secret provider knows nothing about this peer.
    #[error("no shared secret for {0}")]
    UnknownSecret(SocketAddr),

    /// The per-packet handler budget elapsed.
    #[error("handler budget elapsed")]
    Timeout,

    #[error(transparent)]
    Codec(#[from] codec::Error),

    #[error(transparent)]
    Client(#[from] client::Error),
}

/// A verified inbound request and where it came from.
pub struct RequestCtx {
    pub request: Packet,
    pub source: SocketAddr,
    pub secret: String,
}

/// Shared secret lookup, keyed by the sender socket address. Returning
/// `None` drops the datagram before any parsing happens.
pub trait SecretProvider: Send + Sync + 'static {
    fn secret(&self, addr: &SocketAddr) -> impl Future<Output = Option<String>> + Send;
}

/// Exact address matching over a static table.
impl SecretProvider for std::collections::HashMap<SocketAddr, String> {
    async fn secret(&self, addr: &SocketAddr) -> Option<String> {
        self.get(addr).cloned()
    }
}

/// Produces the response for one verified request. `Ok(None)` means
/// drop: no datagram goes back. Errors are logged by the pipeline and
/// the request is dropped as well.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, ctx: &RequestCtx)
    -> impl Future<Output = Result<Option<Packet>, Error>> + Send;
}

#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// How long absorbed responses stay replayable.
    pub dedup_ttl: Duration,
    /// Upper bound on cached entries; the oldest entry yields first.
    pub dedup_capacity: usize,
    /// Hard per-packet budget for the handler.
    pub handler_budget: Duration,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            dedup_ttl: Duration::from_millis(30_000),
            dedup_capacity: 4096,
            handler_budget: Duration::from_secs(10),
        }
    }
}

/// The per-socket pipeline: secret lookup, decode, dedup, handler,
/// encode.
pub struct Router<S, H> {
    dictionary: Arc<Dictionary>,
    secrets: S,
    handler: H,
    cache: Arc<ResponseCache>,
    budget: Duration,
}

impl<S: SecretProvider, H: Handler> Router<S, H> {
    pub fn new(dictionary: Arc<Dictionary>, secrets: S, handler: H, options: RouterOptions) -> Self {
        Self {
            dictionary,
            secrets,
            handler,
            cache: Arc::new(ResponseCache::new(options.dedup_ttl, options.dedup_capacity)),
            budget: options.handler_budget,
        }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Background eviction of expired cache entries.
    pub fn spawn_evictor(&self) -> JoinHandle<()> {
        self.cache.clone().spawn_evictor()
    }

    /// Run one datagram through the pipeline. `None` means nothing is
    /// sent back; wire level failures are logged and never escape.
    pub async fn route(&self, bytes: &[u8], source: SocketAddr) -> Option<(Bytes, SocketAddr)> {
        let Some(secret) = self.secrets.secret(&source).await else {
            log::warn!("{}", Error::UnknownSecret(source));
            return None;
        };

        let request = match Packet::decode_request(bytes, self.dictionary.clone(), &secret) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("request dropped: source={:?}, error={}", source, e);
                return None;
            }
        };

        log::debug!("request: source={:?}, packet={}", source, request.describe());

        let request_auth = *request
            .authenticator()
            .expect("decode sets the authenticator");
        let key = CacheKey::new(request.identifier(), source, request_auth);

        match self.cache.begin(key.clone()) {
            Begin::Replay(cached) => {
                log::debug!(
                    "retransmit absorbed: source={:?}, id={}",
                    source,
                    request.identifier()
                );
                return Some((cached, source));
            }
            Begin::InFlight => {
                log::debug!(
                    "retransmit while handling dropped: source={:?}, id={}",
                    source,
                    request.identifier()
                );
                return None;
            }
            Begin::New => {}
        }

        let ctx = RequestCtx {
            request,
            source,
            secret,
        };

        let outcome = match tokio::time::timeout(self.budget, self.handler.handle(&ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout),
        };

        match outcome {
            Ok(Some(response)) => {
                let encoded = response
                    .encode_response(&ctx.secret, &request_auth)
                    .and_then(|packet| packet.to_bytes());

                match encoded {
                    Ok(bytes) => {
                        self.cache.store(&key, bytes.clone());
                        Some((bytes, source))
                    }
                    Err(e) => {
                        log::error!("response encoding failed: source={:?}, error={}", source, e);
                        self.cache.forget(&key);
                        None
                    }
                }
            }
            Ok(None) => {
                self.cache.forget(&key);
                None
            }
            Err(e) => {
                log::error!("handler failed: source={:?}, error={}", source, e);
                self.cache.forget(&key);
                None
            }
        }
    }
}
