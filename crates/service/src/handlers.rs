//! Bundled request handlers: password authentication, accounting and
//! session control against a credential store, and the forwarding
//! proxy.

use std::{net::SocketAddr, sync::Arc};

use client::{RadiusClient, correlator::Strategy};
use codec::{
    Code, Endpoint, Packet,
    attribute::{Attribute, PROXY_STATE, VENDOR_NONE},
    packet::access::AccessRequest,
};

use crate::{Error, Handler, RequestCtx};

/// Plaintext password lookup by user name.
pub trait CredentialStore: Send + Sync + 'static {
    fn password(&self, user: &str) -> impl Future<Output = Option<String>> + Send;
}

impl CredentialStore for std::collections::HashMap<String, String> {
    async fn password(&self, user: &str) -> Option<String> {
        self.get(user).cloned()
    }
}

/// The stock server behavior: Access-Requests are verified against the
/// credential store, accounting is acknowledged, CoA and Disconnect
/// are acknowledged. Proxy-State attributes are echoed into every
/// response, as RFC 2865 requires.
pub struct DefaultHandler<C> {
    credentials: C,
}

impl<C: CredentialStore> DefaultHandler<C> {
    pub fn new(credentials: C) -> Self {
        Self { credentials }
    }

    async fn access(&self, ctx: &RequestCtx) -> Result<Option<Packet>, Error> {
        let access = AccessRequest::from_packet(ctx.request.clone())?;

        let verdict = match access.user_name() {
            None => false,
            Some(user) => match self.credentials.password(&user).await {
                None => false,
                Some(password) => match access.verify_password(&password) {
                    Ok(verdict) => verdict,
                    Err(codec::Error::UnsupportedAuth(mechanism)) => {
                        log::warn!(
                            "unsupported mechanism rejected: source={:?}, mechanism={}",
                            ctx.source,
                            mechanism
                        );
                        false
                    }
                    Err(e) => return Err(e.into()),
                },
            },
        };

        let response = if verdict {
            let user = access.user_name().unwrap_or_default();
            let welcome = ctx
                .request
                .dictionary()
                .attribute("Reply-Message", &format!("Welcome {}!", user))?;
            ctx.request.response(Code::AccessAccept).with_attribute(welcome)
        } else {
            ctx.request.response(Code::AccessReject)
        };

        Ok(Some(echo_proxy_state(&ctx.request, response)))
    }
}

impl<C: CredentialStore> Handler for DefaultHandler<C> {
    async fn handle(&self, ctx: &RequestCtx) -> Result<Option<Packet>, Error> {
        match ctx.request.code() {
            Code::AccessRequest => self.access(ctx).await,
            Code::StatusServer => {
                let response = ctx.request.response(Code::AccessAccept);
                Ok(Some(echo_proxy_state(&ctx.request, response)))
            }
            Code::AccountingRequest => {
                let response = ctx.request.response(Code::AccountingResponse);
                Ok(Some(echo_proxy_state(&ctx.request, response)))
            }
            Code::CoaRequest => {
                let response = ctx.request.response(Code::CoaAck);
                Ok(Some(echo_proxy_state(&ctx.request, response)))
            }
            Code::DisconnectRequest => {
                let response = ctx.request.response(Code::DisconnectAck);
                Ok(Some(echo_proxy_state(&ctx.request, response)))
            }
            code => {
                log::warn!("no handler for {:?}, dropping", code);
                Ok(None)
            }
        }
    }
}

/// Copy every Proxy-State attribute of the request into the response,
/// preserving order.
pub fn echo_proxy_state(request: &Packet, response: Packet) -> Packet {
    request
        .find_all(VENDOR_NONE, PROXY_STATE)
        .into_iter()
        .fold(response, |response, state| {
            response.with_attribute(Attribute::octets(PROXY_STATE, state.value().to_vec()))
        })
}

/// Upstream selection for the proxy: the verified request and its
/// sender, to the endpoint it should be forwarded to. `None` drops.
pub trait ProxyPolicy: Send + Sync + 'static {
    fn upstream(&self, request: &Packet, source: SocketAddr) -> Option<Endpoint>;
}

impl<F> ProxyPolicy for F
where
    F: Fn(&Packet, SocketAddr) -> Option<Endpoint> + Send + Sync + 'static,
{
    fn upstream(&self, request: &Packet, source: SocketAddr) -> Option<Endpoint> {
        self(request, source)
    }
}

/// Forwards requests upstream through the client and mirrors the
/// upstream answer back to the original peer.
///
/// The client must correlate by Proxy-State: the downstream identifier
/// has to survive the hop, and the correlator strips its own
/// Proxy-State from the upstream response before it gets here. The
/// response is re-encoded downstream against the original request
/// authenticator by the pipeline, so passwords and the
/// Message-Authenticator are rewritten for the downstream secret.
pub struct ProxyHandler<P> {
    client: Arc<RadiusClient>,
    policy: P,
}

impl<P: ProxyPolicy> ProxyHandler<P> {
    pub fn new(client: Arc<RadiusClient>, policy: P) -> Self {
        debug_assert!(
            matches!(client.strategy(), Strategy::ProxyState),
            "proxy forwarding requires the Proxy-State correlator"
        );

        Self { client, policy }
    }
}

impl<P: ProxyPolicy> Handler for ProxyHandler<P> {
    async fn handle(&self, ctx: &RequestCtx) -> Result<Option<Packet>, Error> {
        let Some(upstream) = self.policy.upstream(&ctx.request, ctx.source) else {
            log::warn!("no upstream for request: source={:?}", ctx.source);
            return Ok(None);
        };

        log::debug!(
            "forwarding: source={:?}, upstream={:?}, id={}",
            ctx.source,
            upstream.addr,
            ctx.request.identifier()
        );

        let response = self.client.send(ctx.request.clone(), &upstream).await?;

        // Mirror code, identifier and attributes toward the original
        // peer. The identifier survived the hop, so responding off the
        // original request keeps them aligned.
        let mirrored = ctx
            .request
            .response(response.code())
            .with_attributes(response.attributes().iter().cloned());

        Ok(Some(mirrored))
    }
}
