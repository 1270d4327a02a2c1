use crate::{Error, crypto};

/// Per-attribute encryption schemes. A dictionary template selects one
/// of these; the packet codec runs it against the request authenticator
/// and the shared secret when a packet is encoded or decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cipher {
    #[default]
    None,

    /// [RFC2865] section 5.2, the User-Password scheme. The plaintext
    /// is padded to a 16 octet multiple and each block is XORed with an
    /// MD5 chain seeded by the request authenticator.
    ///
    /// [RFC2865]: https://tools.ietf.org/html/rfc2865#section-5.2
    UserPassword,

    /// [RFC2868] section 3.5, the Tunnel-Password scheme. A one octet
    /// salt with the high bit set joins the chain seed, and the
    /// plaintext length travels inside the encrypted region.
    ///
    /// [RFC2868]: https://tools.ietf.org/html/rfc2868#section-3.5
    TunnelPassword,

    /// The Ascend-Send-Secret scheme: a single 16 octet block XORed
    /// with `md5(secret | request authenticator)`.
    AscendSendSecret,
}

impl Cipher {
    /// Cipher from an `encrypt=N` dictionary flag.
    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            1 => Some(Self::UserPassword),
            2 => Some(Self::TunnelPassword),
            3 => Some(Self::AscendSendSecret),
            _ => None,
        }
    }

    /// Encrypt a plaintext value into its wire form.
    pub fn seal(self, value: &[u8], secret: &str, auth: &[u8; 16]) -> Result<Vec<u8>, Error> {
        match self {
            Self::None => Ok(value.to_vec()),
            Self::UserPassword => user_password_seal(value, secret, auth),
            Self::TunnelPassword => {
                let salt = 0x80 | (rand::random::<u8>() & 0x7f);
                tunnel_password_seal(value, secret, auth, salt)
            }
            Self::AscendSendSecret => ascend_seal(value, secret, auth),
        }
    }

    /// Invert [`Cipher::seal`].
    pub fn open(self, value: &[u8], secret: &str, auth: &[u8; 16]) -> Result<Vec<u8>, Error> {
        match self {
            Self::None => Ok(value.to_vec()),
            Self::UserPassword => user_password_open(value, secret, auth),
            Self::TunnelPassword => tunnel_password_open(value, secret, auth),
            Self::AscendSendSecret => ascend_open(value, secret, auth),
        }
    }
}

// c_0 = md5(secret | authenticator) xor p_0
// c_i = md5(secret | c_{i-1})      xor p_i
fn user_password_seal(value: &[u8], secret: &str, auth: &[u8; 16]) -> Result<Vec<u8>, Error> {
    if value.is_empty() {
        return Err(Error::InvalidValue("empty password".to_string()));
    }

    let blocks = value.len().div_ceil(16);
    let mut out = Vec::with_capacity(blocks * 16);
    let mut prev: [u8; 16] = *auth;

    for i in 0..blocks {
        let chunk = &value[i * 16..value.len().min((i + 1) * 16)];

        let mut block = [0u8; 16];
        block[..chunk.len()].copy_from_slice(chunk);

        let mask = crypto::md5(&[secret.as_bytes(), &prev]);
        for (b, m) in block.iter_mut().zip(mask) {
            *b ^= m;
        }

        out.extend_from_slice(&block);
        prev = block;
    }

    Ok(out)
}

// The chain input for block i is the previous ciphertext block, so the
// decoder walks the ciphertext rather than the recovered plaintext.
fn user_password_open(value: &[u8], secret: &str, auth: &[u8; 16]) -> Result<Vec<u8>, Error> {
    if value.is_empty() || value.len() % 16 != 0 {
        return Err(Error::MalformedPacket("encrypted value is not a 16 octet multiple"));
    }

    let mut out = Vec::with_capacity(value.len());
    let mut prev: &[u8] = auth;

    for chunk in value.chunks_exact(16) {
        let mask = crypto::md5(&[secret.as_bytes(), prev]);
        out.extend(chunk.iter().zip(mask).map(|(c, m)| c ^ m));
        prev = chunk;
    }

    while out.last() == Some(&0) {
        out.pop();
    }

    Ok(out)
}

fn tunnel_password_seal(
    value: &[u8],
    secret: &str,
    auth: &[u8; 16],
    salt: u8,
) -> Result<Vec<u8>, Error> {
    if value.is_empty() || value.len() > 255 {
        return Err(Error::InvalidValue("tunnel password length out of range".to_string()));
    }

    // The plaintext length rides inside the first encrypted block.
    let mut data = Vec::with_capacity(1 + value.len());
    data.push(value.len() as u8);
    data.extend_from_slice(value);

    let blocks = data.len().div_ceil(16);
    let mut out = Vec::with_capacity(1 + blocks * 16);
    out.push(salt);

    let mut mask = crypto::md5(&[secret.as_bytes(), auth, &[salt]]);
    for i in 0..blocks {
        let chunk = &data[i * 16..data.len().min((i + 1) * 16)];

        let mut block = [0u8; 16];
        block[..chunk.len()].copy_from_slice(chunk);
        for (b, m) in block.iter_mut().zip(mask) {
            *b ^= m;
        }

        out.extend_from_slice(&block);
        mask = crypto::md5(&[secret.as_bytes(), &block]);
    }

    Ok(out)
}

fn tunnel_password_open(value: &[u8], secret: &str, auth: &[u8; 16]) -> Result<Vec<u8>, Error> {
    if value.len() < 17 || (value.len() - 1) % 16 != 0 {
        return Err(Error::MalformedPacket("tunnel password framing"));
    }

    let salt = value[0];
    let mut data = Vec::with_capacity(value.len() - 1);
    let mut mask = crypto::md5(&[secret.as_bytes(), auth, &[salt]]);

    for chunk in value[1..].chunks_exact(16) {
        data.extend(chunk.iter().zip(mask).map(|(c, m)| c ^ m));
        mask = crypto::md5(&[secret.as_bytes(), chunk]);
    }

    let len = data[0] as usize;
    if len > data.len() - 1 {
        return Err(Error::MalformedPacket("tunnel password length prefix"));
    }

    Ok(data[1..1 + len].to_vec())
}

fn ascend_seal(value: &[u8], secret: &str, auth: &[u8; 16]) -> Result<Vec<u8>, Error> {
    if value.is_empty() || value.len() > 16 {
        return Err(Error::InvalidValue("send secret longer than one block".to_string()));
    }

    let mut block = [0u8; 16];
    block[..value.len()].copy_from_slice(value);

    let mask = crypto::md5(&[secret.as_bytes(), auth]);
    for (b, m) in block.iter_mut().zip(mask) {
        *b ^= m;
    }

    Ok(block.to_vec())
}

fn ascend_open(value: &[u8], secret: &str, auth: &[u8; 16]) -> Result<Vec<u8>, Error> {
    if value.len() != 16 {
        return Err(Error::MalformedPacket("send secret is not one block"));
    }

    let mask = crypto::md5(&[secret.as_bytes(), auth]);
    let mut out: Vec<u8> = value.iter().zip(mask).map(|(c, m)| c ^ m).collect();
    while out.last() == Some(&0) {
        out.pop();
    }

    Ok(out)
}
