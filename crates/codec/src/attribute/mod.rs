pub mod cipher;
pub mod value;

use bytes::{BufMut, BytesMut};

use crate::{Error, dict::Dictionary};

/// Pseudo vendor id for top level attributes.
pub const VENDOR_NONE: i32 = -1;

/// Well known standard attribute types the codec itself dispatches on.
pub const USER_NAME: u32 = 1;
pub const USER_PASSWORD: u32 = 2;
pub const CHAP_PASSWORD: u32 = 3;
pub const REPLY_MESSAGE: u32 = 18;
pub const VENDOR_SPECIFIC: u32 = 26;
pub const PROXY_STATE: u32 = 33;
pub const CHAP_CHALLENGE: u32 = 60;
pub const ARAP_PASSWORD: u32 = 70;
pub const EAP_MESSAGE: u32 = 79;
pub const MESSAGE_AUTHENTICATOR: u32 = 80;

/// A single attribute of a packet.
///
/// The two shapes mirror the wire: a plain `type | length | [tag] |
/// value` entry, or a Vendor-Specific container (type 26) holding sub
/// attributes under one vendor id. Nesting stops there; sub attributes
/// are always plain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Plain(Plain),
    Vendor(VendorSpecific),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plain {
    pub(crate) vendor_id: i32,
    pub(crate) kind: u32,
    pub(crate) tag: Option<u8>,
    pub(crate) value: Vec<u8>,
    /// Whether `value` is in wire (encrypted) form. Attributes without
    /// an encryption scheme keep this false forever; for the rest the
    /// packet codec flips it when sealing or opening, which is what
    /// makes repeated encodes idempotent.
    pub(crate) encoded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorSpecific {
    pub(crate) vendor_id: u32,
    pub(crate) children: Vec<Attribute>,
}

impl Attribute {
    /// Top level attribute from raw octets.
    pub fn octets(kind: u32, value: impl Into<Vec<u8>>) -> Self {
        Self::Plain(Plain {
            vendor_id: VENDOR_NONE,
            kind,
            tag: None,
            value: value.into(),
            encoded: false,
        })
    }

    /// Top level tagged attribute, see [RFC2868].
    ///
    /// [RFC2868]: https://tools.ietf.org/html/rfc2868
    pub fn tagged(kind: u32, tag: u8, value: impl Into<Vec<u8>>) -> Self {
        Self::Plain(Plain {
            vendor_id: VENDOR_NONE,
            kind,
            tag: Some(tag),
            value: value.into(),
            encoded: false,
        })
    }

    /// Sub attribute for a Vendor-Specific container.
    pub fn sub(vendor_id: u32, kind: u32, value: impl Into<Vec<u8>>) -> Self {
        Self::Plain(Plain {
            vendor_id: vendor_id as i32,
            kind,
            tag: None,
            value: value.into(),
            encoded: false,
        })
    }

    /// Vendor-Specific container. Every child must already carry the
    /// same vendor id.
    pub fn vendor(vendor_id: u32, children: Vec<Attribute>) -> Result<Self, Error> {
        if children
            .iter()
            .any(|child| child.vendor_id() != vendor_id as i32)
        {
            return Err(Error::InvalidValue(format!(
                "sub attribute vendor id does not match container vendor {}",
                vendor_id
            )));
        }

        Ok(Self::Vendor(VendorSpecific {
            vendor_id,
            children,
        }))
    }

    pub fn vendor_id(&self) -> i32 {
        match self {
            Self::Plain(plain) => plain.vendor_id,
            Self::Vendor(vsa) => vsa.vendor_id as i32,
        }
    }

    /// Attribute type code. A Vendor-Specific container reports 26.
    pub fn kind(&self) -> u32 {
        match self {
            Self::Plain(plain) => plain.kind,
            Self::Vendor(_) => VENDOR_SPECIFIC,
        }
    }

    pub fn tag(&self) -> Option<u8> {
        match self {
            Self::Plain(plain) => plain.tag,
            Self::Vendor(_) => None,
        }
    }

    /// Raw value octets. Empty for a Vendor-Specific container; use
    /// [`Attribute::children`] there.
    pub fn value(&self) -> &[u8] {
        match self {
            Self::Plain(plain) => &plain.value,
            Self::Vendor(_) => &[],
        }
    }

    pub fn children(&self) -> Option<&[Attribute]> {
        match self {
            Self::Plain(_) => None,
            Self::Vendor(vsa) => Some(&vsa.children),
        }
    }

    pub fn is_encoded(&self) -> bool {
        match self {
            Self::Plain(plain) => plain.encoded,
            Self::Vendor(_) => false,
        }
    }

    /// Dictionary name of this attribute, if it has one.
    pub fn name<'a>(&self, dict: &'a Dictionary) -> Option<&'a str> {
        match self {
            Self::Plain(plain) => dict
                .template(plain.vendor_id, plain.kind)
                .map(|template| template.name.as_str()),
            Self::Vendor(_) => Some("Vendor-Specific"),
        }
    }

    /// Serialize into `bytes`, consulting the dictionary for vendor
    /// header sizes.
    pub(crate) fn encode_into(&self, bytes: &mut BytesMut, dict: &Dictionary) -> Result<(), Error> {
        match self {
            Self::Plain(plain) => plain.encode_top_level(bytes),
            Self::Vendor(vsa) => vsa.encode_into(bytes, dict),
        }
    }

    /// Parse a top level attribute stream until `bytes` is exhausted.
    pub(crate) fn decode_all(bytes: &[u8], dict: &Dictionary) -> Result<Vec<Attribute>, Error> {
        let mut attributes = Vec::new();
        let mut offset = 0;

        while offset < bytes.len() {
            if bytes.len() - offset < 2 {
                return Err(Error::MalformedPacket("truncated attribute header"));
            }

            let kind = bytes[offset] as u32;
            let length = bytes[offset + 1] as usize;
            if length < 2 || offset + length > bytes.len() {
                return Err(Error::MalformedPacket("attribute length out of bounds"));
            }

            let value = &bytes[offset + 2..offset + length];
            if kind == VENDOR_SPECIFIC {
                attributes.push(VendorSpecific::decode(value, dict)?);
            } else {
                attributes.push(Plain::decode_top_level(kind, value, dict));
            }

            offset += length;
        }

        Ok(attributes)
    }

    /// Encrypt the value in place if the dictionary assigns this
    /// attribute an encryption scheme. Already sealed values are left
    /// untouched.
    pub(crate) fn seal(
        &mut self,
        dict: &Dictionary,
        secret: &str,
        auth: &[u8; 16],
    ) -> Result<(), Error> {
        match self {
            Self::Plain(plain) => plain.run_cipher(dict, secret, auth, true),
            Self::Vendor(vsa) => {
                for child in &mut vsa.children {
                    child.seal(dict, secret, auth)?;
                }

                Ok(())
            }
        }
    }

    /// Invert [`Attribute::seal`].
    pub(crate) fn open(
        &mut self,
        dict: &Dictionary,
        secret: &str,
        auth: &[u8; 16],
    ) -> Result<(), Error> {
        match self {
            Self::Plain(plain) => plain.run_cipher(dict, secret, auth, false),
            Self::Vendor(vsa) => {
                for child in &mut vsa.children {
                    child.open(dict, secret, auth)?;
                }

                Ok(())
            }
        }
    }

    pub(crate) fn value_mut(&mut self) -> &mut Vec<u8> {
        match self {
            Self::Plain(plain) => &mut plain.value,
            Self::Vendor(_) => unreachable!("vendor containers have no direct value"),
        }
    }
}

impl Plain {
    fn encode_top_level(&self, bytes: &mut BytesMut) -> Result<(), Error> {
        if self.kind > 255 {
            return Err(Error::InvalidValue(format!(
                "attribute type {} does not fit one octet",
                self.kind
            )));
        }

        let tag_len = usize::from(self.tag.is_some());
        let total = 2 + tag_len + self.value.len();
        if total > 255 {
            return Err(Error::InvalidValue(format!(
                "attribute {} exceeds 255 octets",
                self.kind
            )));
        }

        bytes.put_u8(self.kind as u8);
        bytes.put_u8(total as u8);
        if let Some(tag) = self.tag {
            bytes.put_u8(tag);
        }

        bytes.put(self.value.as_slice());
        Ok(())
    }

    fn encode_sub(&self, bytes: &mut BytesMut, type_size: usize, length_size: usize) -> Result<(), Error> {
        let kind_max = match type_size {
            1 => 0xff,
            2 => 0xffff,
            _ => u32::MAX,
        };
        if self.kind > kind_max {
            return Err(Error::InvalidValue(format!(
                "sub attribute type {} does not fit {} octets",
                self.kind, type_size
            )));
        }

        let tag_len = usize::from(self.tag.is_some());
        let total = type_size + length_size + tag_len + self.value.len();

        let max = match length_size {
            0 => usize::MAX,
            1 => 255,
            _ => 65535,
        };
        if total > max {
            return Err(Error::InvalidValue(format!(
                "sub attribute {} exceeds its length field",
                self.kind
            )));
        }

        match type_size {
            1 => bytes.put_u8(self.kind as u8),
            2 => bytes.put_u16(self.kind as u16),
            _ => bytes.put_u32(self.kind),
        }

        match length_size {
            0 => {}
            1 => bytes.put_u8(total as u8),
            _ => bytes.put_u16(total as u16),
        }

        if let Some(tag) = self.tag {
            bytes.put_u8(tag);
        }

        bytes.put(self.value.as_slice());
        Ok(())
    }

    fn decode_top_level(kind: u32, value: &[u8], dict: &Dictionary) -> Attribute {
        let template = dict.template(VENDOR_NONE, kind);
        let tagged = template.is_some_and(|t| t.tagged);
        let encoded = template.is_some_and(|t| t.cipher != cipher::Cipher::None);

        let (tag, value) = match (tagged, value) {
            (true, [tag, rest @ ..]) => (Some(*tag), rest),
            _ => (None, value),
        };

        Attribute::Plain(Plain {
            vendor_id: VENDOR_NONE,
            kind,
            tag,
            value: value.to_vec(),
            encoded,
        })
    }

    fn run_cipher(
        &mut self,
        dict: &Dictionary,
        secret: &str,
        auth: &[u8; 16],
        seal: bool,
    ) -> Result<(), Error> {
        let Some(template) = dict.template(self.vendor_id, self.kind) else {
            return Ok(());
        };

        if template.cipher == cipher::Cipher::None || self.encoded == seal {
            return Ok(());
        }

        self.value = if seal {
            template.cipher.seal(&self.value, secret, auth)?
        } else {
            template.cipher.open(&self.value, secret, auth)?
        };

        self.encoded = seal;
        Ok(())
    }
}

impl VendorSpecific {
    fn encode_into(&self, bytes: &mut BytesMut, dict: &Dictionary) -> Result<(), Error> {
        let (type_size, length_size) = dict.vendor_header(self.vendor_id);

        let start = bytes.len();
        bytes.put_u8(VENDOR_SPECIFIC as u8);
        bytes.put_u8(0);
        bytes.put_u32(self.vendor_id);

        for child in &self.children {
            match child {
                Attribute::Plain(plain) => plain.encode_sub(bytes, type_size, length_size)?,
                Attribute::Vendor(_) => {
                    return Err(Error::InvalidValue(
                        "vendor containers cannot nest".to_string(),
                    ));
                }
            }
        }

        let total = bytes.len() - start;
        if total > 255 {
            return Err(Error::InvalidValue(format!(
                "vendor {} attribute exceeds 255 octets",
                self.vendor_id
            )));
        }

        bytes[start + 1] = total as u8;
        Ok(())
    }

    fn decode(value: &[u8], dict: &Dictionary) -> Result<Attribute, Error> {
        if value.len() < 4 {
            return Err(Error::MalformedPacket("vendor attribute shorter than its vendor id"));
        }

        let vendor_id = u32::from_be_bytes([value[0], value[1], value[2], value[3]]);
        let (type_size, length_size) = dict.vendor_header(vendor_id);
        let payload = &value[4..];

        let mut children = Vec::new();
        let mut offset = 0;

        while offset < payload.len() {
            if payload.len() - offset < type_size + length_size {
                return Err(Error::MalformedPacket("truncated sub attribute header"));
            }

            let kind = match type_size {
                1 => payload[offset] as u32,
                2 => u16::from_be_bytes([payload[offset], payload[offset + 1]]) as u32,
                _ => u32::from_be_bytes([
                    payload[offset],
                    payload[offset + 1],
                    payload[offset + 2],
                    payload[offset + 3],
                ]),
            };

            // With no length field the sub attribute runs to the end of
            // the container.
            let end = match length_size {
                0 => payload.len(),
                _ => {
                    let length = match length_size {
                        1 => payload[offset + type_size] as usize,
                        _ => u16::from_be_bytes([
                            payload[offset + type_size],
                            payload[offset + type_size + 1],
                        ]) as usize,
                    };

                    if length < type_size + length_size || offset + length > payload.len() {
                        return Err(Error::MalformedPacket("sub attribute length out of bounds"));
                    }

                    offset + length
                }
            };

            let value = &payload[offset + type_size + length_size..end];
            let template = dict.template(vendor_id as i32, kind);
            let tagged = template.is_some_and(|t| t.tagged);
            let encoded = template.is_some_and(|t| t.cipher != cipher::Cipher::None);

            let (tag, value) = match (tagged, value) {
                (true, [tag, rest @ ..]) => (Some(*tag), rest),
                _ => (None, value),
            };

            children.push(Attribute::Plain(Plain {
                vendor_id: vendor_id as i32,
                kind,
                tag,
                value: value.to_vec(),
                encoded,
            }));

            offset = end;
        }

        Ok(Attribute::Vendor(VendorSpecific {
            vendor_id,
            children,
        }))
    }
}
