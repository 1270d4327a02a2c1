use std::{
    net::SocketAddr,
    sync::atomic::{AtomicU32, Ordering},
};

use bytes::Bytes;
use codec::{
    Dictionary, Endpoint, Packet,
    attribute::{Attribute, PROXY_STATE, VENDOR_NONE},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::Error;

// Process wide counters. Both wrap around; the identifier space is a
// single octet anyway and Proxy-State keys stay unique for 2^32
// outstanding requests, far beyond any real in-flight window.
static NEXT_IDENTIFIER: AtomicU32 = AtomicU32::new(0);
static NEXT_PROXY_STATE: AtomicU32 = AtomicU32::new(0);

pub(crate) fn next_identifier() -> u8 {
    (NEXT_IDENTIFIER.fetch_add(1, Ordering::Relaxed) % 256) as u8
}

/// How outstanding requests are matched to inbound datagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Key on `(remote address, packet identifier)`. The identifier is
    /// drawn from a process wide counter, so at most 256 requests per
    /// peer can be in flight; a collision rejects the new send.
    #[default]
    Identifier,

    /// Key on a Proxy-State attribute (33) appended before sending and
    /// stripped from the response. No identifier bottleneck; required
    /// for proxy chains, where the downstream identifier must survive
    /// the hop.
    ProxyState,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Key {
    Identifier(SocketAddr, u8),
    ProxyState(u32),
}

struct Pending {
    endpoint: Endpoint,
    request_auth: [u8; 16],
    slot: oneshot::Sender<Packet>,
}

/// The outstanding request table. Entries are removed on completion,
/// timeout and cancellation, so the table is bounded by the number of
/// requests actually in flight.
pub struct Correlator {
    strategy: Strategy,
    pending: Mutex<HashMap<Key, Pending>>,
}

impl Correlator {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Outstanding request count, for diagnostics and tests.
    pub fn outstanding(&self) -> usize {
        self.pending.lock().len()
    }

    /// Prepare an outbound request: assign its correlation key, encode
    /// it, and register the completion slot. The returned bytes are
    /// what every retransmission attempt sends, so retries keep the
    /// authenticator and the Proxy-State key.
    pub(crate) fn register(
        &self,
        packet: Packet,
        endpoint: &Endpoint,
    ) -> Result<(Key, Bytes, oneshot::Receiver<Packet>), Error> {
        let (key, packet) = match self.strategy {
            Strategy::Identifier => {
                let identifier = next_identifier();
                let key = Key::Identifier(endpoint.addr, identifier);
                if self.pending.lock().contains_key(&key) {
                    return Err(Error::IdentifierCollision(endpoint.addr));
                }

                (key, packet.with_identifier(identifier))
            }
            Strategy::ProxyState => {
                let sequence = NEXT_PROXY_STATE.fetch_add(1, Ordering::Relaxed);
                let state = Attribute::octets(PROXY_STATE, sequence.to_string().into_bytes());
                (Key::ProxyState(sequence), packet.with_attribute(state))
            }
        };

        let encoded = packet.encode_request(&endpoint.secret)?;
        let request_auth = *encoded
            .authenticator()
            .expect("encode_request sets the authenticator");
        let bytes = encoded.to_bytes()?;

        let (slot, receiver) = oneshot::channel();
        self.pending.lock().insert(
            key.clone(),
            Pending {
                endpoint: endpoint.clone(),
                request_auth,
                slot,
            },
        );

        Ok((key, bytes, receiver))
    }

    /// Drop an outstanding entry, after a timeout or a cancelled
    /// caller.
    pub(crate) fn evict(&self, key: &Key) {
        self.pending.lock().remove(key);
    }

    /// Match an inbound datagram to an outstanding request, verify the
    /// response authenticator and the sender, and fulfill the slot.
    /// Verification failures put the entry back so a later legitimate
    /// datagram can still complete it.
    pub(crate) fn complete(
        &self,
        bytes: &[u8],
        source: SocketAddr,
        dictionary: &Arc<Dictionary>,
    ) -> Result<(), Error> {
        let peeked = Packet::decode(bytes, dictionary.clone())?;

        let key = match self.strategy {
            Strategy::Identifier => Key::Identifier(source, peeked.identifier()),
            Strategy::ProxyState => {
                // The last Proxy-State is the one this client appended.
                let states = peeked.find_all(VENDOR_NONE, PROXY_STATE);
                let state = states.last().ok_or(Error::CorrelationMiss)?;
                let sequence = std::str::from_utf8(state.value())
                    .ok()
                    .and_then(|text| text.parse().ok())
                    .ok_or(Error::CorrelationMiss)?;

                Key::ProxyState(sequence)
            }
        };

        let pending = self
            .pending
            .lock()
            .remove(&key)
            .ok_or(Error::CorrelationMiss)?;

        if pending.endpoint.addr != source {
            log::warn!(
                "response from unexpected sender: expected={:?}, got={:?}",
                pending.endpoint.addr,
                source
            );
            self.pending.lock().insert(key, pending);
            return Err(Error::CorrelationMiss);
        }

        match Packet::decode_response(
            bytes,
            dictionary.clone(),
            &pending.endpoint.secret,
            &pending.request_auth,
        ) {
            Ok(response) => {
                let response = match self.strategy {
                    Strategy::Identifier => response,
                    Strategy::ProxyState => {
                        response.without_last_attribute(VENDOR_NONE, PROXY_STATE)
                    }
                };

                // A dropped receiver means the caller gave up; the
                // entry is gone either way.
                let _ = pending.slot.send(response);
                Ok(())
            }
            Err(e) => {
                self.pending.lock().insert(key, pending);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::Code;

    fn dict() -> Arc<Dictionary> {
        Arc::new(Dictionary::default())
    }

    fn request(dict: &Arc<Dictionary>) -> Packet {
        Packet::new(dict.clone(), Code::AccessRequest, 0)
            .with_attribute(dict.attribute("User-Name", "test").unwrap())
    }

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::new(([127, 0, 0, 1], port).into(), "testing123")
    }

    #[test]
    fn identifier_strategy_completes() {
        let dict = dict();
        let correlator = Correlator::new(Strategy::Identifier);
        let endpoint = endpoint(1812);

        let (_, bytes, mut receiver) = correlator.register(request(&dict), &endpoint).unwrap();
        assert_eq!(correlator.outstanding(), 1);

        let sent = Packet::decode(&bytes, dict.clone()).unwrap();
        let reply = sent
            .response(Code::AccessAccept)
            .encode_response("testing123", sent.authenticator().unwrap())
            .unwrap()
            .to_bytes()
            .unwrap();

        correlator.complete(&reply, endpoint.addr, &dict).unwrap();
        assert_eq!(correlator.outstanding(), 0);
        assert_eq!(
            receiver.try_recv().unwrap().code(),
            Code::AccessAccept
        );
    }

    #[test]
    fn proxy_state_strategy_appends_and_strips() {
        let dict = dict();
        let correlator = Correlator::new(Strategy::ProxyState);
        let endpoint = endpoint(1813);

        let (_, bytes, mut receiver) = correlator.register(request(&dict), &endpoint).unwrap();

        // The identifier chosen by the caller survives, the Proxy-State
        // attribute was appended last.
        let sent = Packet::decode(&bytes, dict.clone()).unwrap();
        assert_eq!(sent.identifier(), 0);
        let states = sent.find_all(VENDOR_NONE, PROXY_STATE);
        assert_eq!(states.len(), 1);

        // A conforming server echoes Proxy-State into the response.
        let reply = sent
            .response(Code::AccessAccept)
            .with_attribute(Attribute::octets(PROXY_STATE, states[0].value().to_vec()))
            .encode_response("testing123", sent.authenticator().unwrap())
            .unwrap()
            .to_bytes()
            .unwrap();

        correlator.complete(&reply, endpoint.addr, &dict).unwrap();
        let response = receiver.try_recv().unwrap();
        assert!(response.find_all(VENDOR_NONE, PROXY_STATE).is_empty());
    }

    #[test]
    fn wrong_sender_is_ignored() {
        let dict = dict();
        let correlator = Correlator::new(Strategy::Identifier);
        let endpoint = endpoint(1814);

        let (_, bytes, _receiver) = correlator.register(request(&dict), &endpoint).unwrap();
        let sent = Packet::decode(&bytes, dict.clone()).unwrap();
        let reply = sent
            .response(Code::AccessAccept)
            .encode_response("testing123", sent.authenticator().unwrap())
            .unwrap()
            .to_bytes()
            .unwrap();

        let outcome = correlator.complete(&reply, ([10, 0, 0, 1], 1812).into(), &dict);
        assert!(matches!(outcome, Err(Error::CorrelationMiss)));
        assert_eq!(correlator.outstanding(), 1);
    }

    #[test]
    fn bad_authenticator_keeps_the_entry() {
        let dict = dict();
        let correlator = Correlator::new(Strategy::Identifier);
        let endpoint = endpoint(1815);

        let (_, bytes, _receiver) = correlator.register(request(&dict), &endpoint).unwrap();
        let sent = Packet::decode(&bytes, dict.clone()).unwrap();
        let mut reply = sent
            .response(Code::AccessAccept)
            .encode_response("another-secret", sent.authenticator().unwrap())
            .unwrap()
            .to_bytes()
            .unwrap()
            .to_vec();
        reply[1] = sent.identifier();

        let outcome = correlator.complete(&reply, endpoint.addr, &dict);
        assert!(matches!(
            outcome,
            Err(Error::Codec(codec::Error::AuthenticatorInvalid))
        ));
        assert_eq!(correlator.outstanding(), 1);
    }

    #[test]
    fn eviction_empties_the_table() {
        let dict = dict();
        let correlator = Correlator::new(Strategy::ProxyState);

        let (key, _, _receiver) = correlator.register(request(&dict), &endpoint(1816)).unwrap();
        assert_eq!(correlator.outstanding(), 1);
        correlator.evict(&key);
        assert_eq!(correlator.outstanding(), 0);
    }

    #[test]
    fn identifier_space_is_bounded_per_peer() {
        let dict = dict();
        let correlator = Correlator::new(Strategy::Identifier);
        let endpoint = endpoint(1817);

        // The one octet identifier admits at most 256 outstanding
        // requests per peer; by the 257th registration a collision is
        // guaranteed and the new send is rejected.
        let mut receivers = Vec::new();
        let mut collided = false;
        for _ in 0..257 {
            match correlator.register(request(&dict), &endpoint) {
                Ok((_, _, receiver)) => receivers.push(receiver),
                Err(Error::IdentifierCollision(_)) => {
                    collided = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        }

        assert!(collided);
    }
}
