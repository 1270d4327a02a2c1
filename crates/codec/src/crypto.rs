use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use rand::Rng;

/// MD5 digest over a list of buffers.
///
/// # Test
///
/// ```
/// let digest = radius_server_codec::crypto::md5(&[b"abc"]);
///
/// assert_eq!(
///     digest,
///     [
///         0x90, 0x01, 0x50, 0x98, 0x3c, 0xd2, 0x4f, 0xb0, 0xd6, 0x96, 0x3f,
///         0x7d, 0x28, 0xe1, 0x7f, 0x72,
///     ]
/// );
/// ```
pub fn md5(source: &[&[u8]]) -> [u8; 16] {
    let mut hasher = Md5::new();
    for buf in source {
        hasher.update(buf);
    }

    hasher.finalize().into()
}

/// HMAC-MD5 digest keyed by the shared secret, used for the
/// Message-Authenticator attribute.
///
/// # Test
///
/// ```
/// // RFC 2202 test case 2.
/// let digest = radius_server_codec::crypto::hmac_md5(
///     b"Jefe",
///     &[b"what do ya want for nothing?"],
/// );
///
/// assert_eq!(
///     digest,
///     [
///         0x75, 0x0c, 0x78, 0x3e, 0x6a, 0xb0, 0xb5, 0x03, 0xea, 0xa8, 0x6e,
///         0x31, 0x0a, 0x5d, 0xb7, 0x38,
///     ]
/// );
/// ```
pub fn hmac_md5(secret: &[u8], source: &[&[u8]]) -> [u8; 16] {
    // Hmac accepts keys of any length, so construction cannot fail.
    let mut mac = Hmac::<Md5>::new_from_slice(secret).expect("hmac accepts any key length");

    for buf in source {
        mac.update(buf);
    }

    mac.finalize().into_bytes().into()
}

/// 16 random octets for an Access-Request authenticator.
pub fn random_authenticator() -> [u8; 16] {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    bytes
}
