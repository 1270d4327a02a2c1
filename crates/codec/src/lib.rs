//! ## Remote Authentication Dial In User Service (RADIUS)
//!
//! [RFC2865]: https://tools.ietf.org/html/rfc2865
//! [RFC2866]: https://tools.ietf.org/html/rfc2866
//! [RFC2868]: https://tools.ietf.org/html/rfc2868
//! [RFC2869]: https://tools.ietf.org/html/rfc2869
//!
//! RADIUS is a UDP based AAA protocol. A packet is a fixed 20 octet
//! header (code, identifier, length, a 16 octet authenticator) followed
//! by a stream of type-length-value attributes, see [RFC2865]. Attribute
//! type 26 nests vendor specific sub-attributes under a 4 octet vendor
//! id, and some vendors use wider type or length fields than the
//! standard single octet, see [RFC2865] section 5.26.
//!
//! This crate implements the wire codec only: the dictionary that names
//! attributes, the attribute model with its per-attribute encryption
//! shells, and the packet codec with the authenticator and
//! Message-Authenticator rules of [RFC2866] and [RFC2869]. Sockets,
//! retransmission and server pipelines live in the sibling crates.

pub mod attribute;
pub mod crypto;
pub mod dict;
pub mod packet;

use std::net::SocketAddr;

pub use attribute::Attribute;
pub use dict::Dictionary;
pub use packet::{Code, Packet};

use thiserror::Error;

/// Error types returned by this crate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The buffer does not hold a syntactically valid RADIUS packet:
    /// header shorter than 20 octets, declared length out of the
    /// [20, 4096] range, or an attribute overrunning its container.
    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),

    /// A response or accounting authenticator did not match the value
    /// recomputed with the shared secret, or a Message-Authenticator
    /// check failed.
    #[error("authenticator verification failed")]
    AuthenticatorInvalid,

    /// The dictionary holds no attribute under this name.
    #[error("unknown attribute name {0:?}")]
    UnknownAttributeName(String),

    /// The requested mechanism is carried structurally but its
    /// cryptographic interior is not implemented.
    #[error("unsupported authentication mechanism: {0}")]
    UnsupportedAuth(&'static str),

    /// A dictionary resource could not be loaded.
    #[error("dictionary line {line}: {reason}")]
    Dictionary { line: usize, reason: String },

    /// An attribute value does not fit its declared data type, or the
    /// encoded form would not fit in a single attribute.
    #[error("invalid attribute value: {0}")]
    InvalidValue(String),
}

/// A RADIUS peer: where to send datagrams and which shared secret
/// authenticates them. The secret never appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub addr: SocketAddr,
    pub secret: String,
}

impl Endpoint {
    pub fn new(addr: SocketAddr, secret: impl Into<String>) -> Self {
        Self {
            addr,
            secret: secret.into(),
        }
    }
}
