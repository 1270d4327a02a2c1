pub mod access;

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    Error,
    attribute::{Attribute, EAP_MESSAGE, MESSAGE_AUTHENTICATOR, VENDOR_NONE, VendorSpecific},
    crypto,
    dict::Dictionary,
};

/// A packet is at least its 20 octet header.
pub const MIN_PACKET_LEN: usize = 20;

/// No packet is ever larger than 4096 octets, header included.
pub const MAX_PACKET_LEN: usize = 4096;

/// Packet codes this stack understands.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum Code {
    AccessRequest = 1,
    AccessAccept = 2,
    AccessReject = 3,
    AccountingRequest = 4,
    AccountingResponse = 5,
    AccessChallenge = 11,
    StatusServer = 12,
    StatusClient = 13,
    DisconnectRequest = 40,
    DisconnectAck = 41,
    DisconnectNak = 42,
    CoaRequest = 43,
    CoaAck = 44,
    CoaNak = 45,
}

impl Code {
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Self::AccessRequest
                | Self::AccountingRequest
                | Self::StatusServer
                | Self::StatusClient
                | Self::DisconnectRequest
                | Self::CoaRequest
        )
    }

    /// Requests whose authenticator is `md5(packet with a zeroed
    /// authenticator slot | secret)` instead of random octets.
    fn hashed_request(self) -> bool {
        matches!(
            self,
            Self::AccountingRequest | Self::DisconnectRequest | Self::CoaRequest
        )
    }
}

/// An immutable RADIUS packet.
///
/// A packet is built with the `with_*` constructors, which all return a
/// new value, then turned into wire form with [`Packet::encode_request`]
/// or [`Packet::encode_response`] followed by [`Packet::to_bytes`].
/// Both encode operations are idempotent: encoding an already encoded
/// packet reproduces the same octets, which is what retransmission
/// relies on.
#[derive(Debug, Clone)]
pub struct Packet {
    code: Code,
    identifier: u8,
    authenticator: Option<[u8; 16]>,
    attributes: Vec<Attribute>,
    dictionary: Arc<Dictionary>,
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
            && self.identifier == other.identifier
            && self.authenticator == other.authenticator
            && self.attributes == other.attributes
    }
}

impl Packet {
    pub fn new(dictionary: Arc<Dictionary>, code: Code, identifier: u8) -> Self {
        Self {
            code,
            identifier,
            authenticator: None,
            attributes: Vec::new(),
            dictionary,
        }
    }

    /// Start a response to this packet: same identifier, same
    /// dictionary, no attributes yet.
    pub fn response(&self, code: Code) -> Self {
        Self {
            code,
            identifier: self.identifier,
            authenticator: None,
            attributes: Vec::new(),
            dictionary: self.dictionary.clone(),
        }
    }

    /// Append an attribute. A plain attribute carrying a vendor id is
    /// wrapped in its own Vendor-Specific container, so dictionary
    /// built vendor attributes can be appended directly.
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        let attribute = match attribute {
            Attribute::Plain(plain) if plain.vendor_id != VENDOR_NONE => {
                Attribute::Vendor(VendorSpecific {
                    vendor_id: plain.vendor_id as u32,
                    children: vec![Attribute::Plain(plain)],
                })
            }
            other => other,
        };

        self.attributes.push(attribute);
        self
    }

    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = Attribute>) -> Self {
        for attribute in attributes {
            self = self.with_attribute(attribute);
        }

        self
    }

    pub fn with_authenticator(mut self, authenticator: [u8; 16]) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn with_identifier(mut self, identifier: u8) -> Self {
        self.identifier = identifier;
        self
    }

    /// Remove every attribute matching `(vendor_id, kind)`.
    pub fn without_attributes(mut self, vendor_id: i32, kind: u32) -> Self {
        self.attributes
            .retain(|attribute| !(attribute.vendor_id() == vendor_id && attribute.kind() == kind));
        self
    }

    /// Remove the last attribute matching `(vendor_id, kind)`, the way
    /// a proxy strips the Proxy-State it appended.
    pub fn without_last_attribute(mut self, vendor_id: i32, kind: u32) -> Self {
        if let Some(index) = self
            .attributes
            .iter()
            .rposition(|attribute| attribute.vendor_id() == vendor_id && attribute.kind() == kind)
        {
            self.attributes.remove(index);
        }

        self
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn identifier(&self) -> u8 {
        self.identifier
    }

    pub fn authenticator(&self) -> Option<&[u8; 16]> {
        self.authenticator.as_ref()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }

    /// First attribute matching `(vendor_id, kind)`, looking inside
    /// Vendor-Specific containers for vendor attributes.
    pub fn find(&self, vendor_id: i32, kind: u32) -> Option<&Attribute> {
        self.find_all(vendor_id, kind).into_iter().next()
    }

    pub fn find_all(&self, vendor_id: i32, kind: u32) -> Vec<&Attribute> {
        let mut found = Vec::new();

        for attribute in &self.attributes {
            match attribute {
                Attribute::Plain(_) => {
                    if attribute.vendor_id() == vendor_id && attribute.kind() == kind {
                        found.push(attribute);
                    }
                }
                Attribute::Vendor(vsa) => {
                    if vendor_id == VENDOR_NONE {
                        continue;
                    }

                    for child in &vsa.children {
                        if child.vendor_id() == vendor_id && child.kind() == kind {
                            found.push(child);
                        }
                    }
                }
            }
        }

        found
    }

    /// First attribute under its dictionary name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        let template = self.dictionary.template_by_name(name)?;
        self.find(template.vendor_id, template.kind)
    }

    /// Every attribute under its dictionary name, in packet order.
    pub fn attributes_named(&self, name: &str) -> Vec<&Attribute> {
        match self.dictionary.template_by_name(name) {
            Some(template) => self.find_all(template.vendor_id, template.kind),
            None => Vec::new(),
        }
    }

    /// First attribute under its dictionary name, rendered as a string
    /// according to its data type.
    pub fn attribute_text(&self, name: &str) -> Option<String> {
        let template = self.dictionary.template_by_name(name)?;
        self.find(template.vendor_id, template.kind)
            .map(|attribute| template.data_type.format(attribute.value()))
    }

    /// Serialize this packet. The authenticator must already be in
    /// place, which is what the encode operations do.
    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        let authenticator = self
            .authenticator
            .ok_or(Error::MalformedPacket("authenticator not set"))?;

        Ok(self.serialize(&authenticator)?.freeze())
    }

    /// Encode a request for the wire.
    ///
    /// Access-Request and the status codes draw a random authenticator
    /// (once; a present authenticator is kept), encrypt their password
    /// attributes against it and maintain the Message-Authenticator.
    /// Accounting-Request, CoA-Request and Disconnect-Request hash the
    /// serialized packet with a zeroed authenticator slot and the
    /// shared secret.
    pub fn encode_request(mut self, secret: &str) -> Result<Self, Error> {
        match self.code {
            Code::AccessRequest | Code::StatusServer | Code::StatusClient => {
                let authenticator = self
                    .authenticator
                    .unwrap_or_else(crypto::random_authenticator);
                self.authenticator = Some(authenticator);

                self.seal_attributes(secret, &authenticator)?;
                self.ensure_message_authenticator();
                self.update_message_authenticator(secret, &authenticator)?;

                // Surface length violations at encode time.
                self.serialize(&authenticator)?;
                Ok(self)
            }
            code if code.hashed_request() => {
                let zeroed = [0u8; 16];
                self.seal_attributes(secret, &zeroed)?;
                self.update_message_authenticator(secret, &zeroed)?;

                let bytes = self.serialize(&zeroed)?;
                self.authenticator = Some(crypto::md5(&[&bytes, secret.as_bytes()]));
                Ok(self)
            }
            _ => Err(Error::MalformedPacket("not a request code")),
        }
    }

    /// Encode a response for the wire. The response authenticator is
    /// `md5(type | id | length | request authenticator | attributes |
    /// secret)`, and the Message-Authenticator (when carried) is
    /// computed with the request authenticator in the header slot.
    pub fn encode_response(mut self, secret: &str, request_auth: &[u8; 16]) -> Result<Self, Error> {
        if self.code.is_request() {
            return Err(Error::MalformedPacket("not a response code"));
        }

        self.seal_attributes(secret, request_auth)?;
        self.ensure_message_authenticator();
        self.update_message_authenticator(secret, request_auth)?;

        let bytes = self.serialize(request_auth)?;
        self.authenticator = Some(crypto::md5(&[&bytes, secret.as_bytes()]));
        Ok(self)
    }

    /// Parse a datagram without any verification or decryption.
    ///
    /// # Test
    ///
    /// ```
    /// use std::sync::Arc;
    /// use radius_server_codec::{Code, Dictionary, Packet};
    ///
    /// let buffer = [
    ///     0x01u8, 0x2a, 0x00, 0x1a, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06,
    ///     0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x01, 0x06,
    ///     0x74, 0x65, 0x73, 0x74,
    /// ];
    ///
    /// let packet = Packet::decode(&buffer, Arc::new(Dictionary::default())).unwrap();
    ///
    /// assert_eq!(packet.code(), Code::AccessRequest);
    /// assert_eq!(packet.identifier(), 42);
    /// assert_eq!(packet.attribute_text("User-Name").as_deref(), Some("test"));
    /// ```
    pub fn decode(bytes: &[u8], dictionary: Arc<Dictionary>) -> Result<Self, Error> {
        if bytes.len() < MIN_PACKET_LEN {
            return Err(Error::MalformedPacket("shorter than a packet header"));
        }

        let code = Code::try_from(bytes[0])
            .map_err(|_| Error::MalformedPacket("unknown packet code"))?;
        let identifier = bytes[1];

        let declared = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        if !(MIN_PACKET_LEN..=MAX_PACKET_LEN).contains(&declared) {
            return Err(Error::MalformedPacket("declared length out of range"));
        }

        // A UDP datagram may carry padding past the declared length,
        // but never less than it.
        if declared > bytes.len() {
            return Err(Error::MalformedPacket("declared length exceeds datagram"));
        }

        let mut authenticator = [0u8; 16];
        authenticator.copy_from_slice(&bytes[4..20]);

        let attributes = Attribute::decode_all(&bytes[MIN_PACKET_LEN..declared], &dictionary)?;
        Ok(Self {
            code,
            identifier,
            authenticator: Some(authenticator),
            attributes,
            dictionary,
        })
    }

    /// Parse and verify an inbound request, then decrypt its password
    /// attributes.
    ///
    /// An Access-Request authenticator is random and cannot be checked;
    /// its Message-Authenticator is checked when present and demanded
    /// when the request carries EAP. The hashed request kinds are
    /// checked by recomputing the hash over a zeroed authenticator
    /// slot.
    pub fn decode_request(
        bytes: &[u8],
        dictionary: Arc<Dictionary>,
        secret: &str,
    ) -> Result<Self, Error> {
        let mut packet = Self::decode(bytes, dictionary)?;
        let declared = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        let raw = &bytes[..declared];

        let mut authenticator = [0u8; 16];
        authenticator.copy_from_slice(&raw[4..20]);

        match packet.code {
            Code::AccessRequest | Code::StatusServer | Code::StatusClient => {
                let has_eap = packet.find(VENDOR_NONE, EAP_MESSAGE).is_some();
                let has_ma = packet.find(VENDOR_NONE, MESSAGE_AUTHENTICATOR).is_some();
                if has_eap && !has_ma {
                    return Err(Error::MalformedPacket("EAP request without Message-Authenticator"));
                }

                verify_message_authenticator(raw, &authenticator, secret)?;
                packet.open_attributes(secret, &authenticator)?;
            }
            code if code.hashed_request() => {
                let mut copy = raw.to_vec();
                copy[4..20].fill(0);
                if crypto::md5(&[&copy, secret.as_bytes()]) != authenticator {
                    return Err(Error::AuthenticatorInvalid);
                }

                verify_message_authenticator(raw, &[0u8; 16], secret)?;
                packet.open_attributes(secret, &[0u8; 16])?;
            }
            _ => return Err(Error::MalformedPacket("not a request code")),
        }

        Ok(packet)
    }

    /// Parse and verify an inbound response against the authenticator
    /// of the request it answers, then decrypt its password
    /// attributes.
    pub fn decode_response(
        bytes: &[u8],
        dictionary: Arc<Dictionary>,
        secret: &str,
        request_auth: &[u8; 16],
    ) -> Result<Self, Error> {
        let mut packet = Self::decode(bytes, dictionary)?;
        if packet.code.is_request() {
            return Err(Error::MalformedPacket("not a response code"));
        }

        let declared = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        let raw = &bytes[..declared];

        let mut authenticator = [0u8; 16];
        authenticator.copy_from_slice(&raw[4..20]);

        let mut copy = raw.to_vec();
        copy[4..20].copy_from_slice(request_auth);
        if crypto::md5(&[&copy, secret.as_bytes()]) != authenticator {
            return Err(Error::AuthenticatorInvalid);
        }

        verify_message_authenticator(raw, request_auth, secret)?;
        packet.open_attributes(secret, request_auth)?;
        Ok(packet)
    }

    fn serialize(&self, authenticator: &[u8; 16]) -> Result<BytesMut, Error> {
        let mut bytes = BytesMut::with_capacity(128);
        bytes.put_u8(self.code.into());
        bytes.put_u8(self.identifier);
        bytes.put_u16(0);
        bytes.put(&authenticator[..]);

        for attribute in &self.attributes {
            attribute.encode_into(&mut bytes, &self.dictionary)?;
        }

        if bytes.len() > MAX_PACKET_LEN {
            return Err(Error::MalformedPacket("packet exceeds 4096 octets"));
        }

        let size = (bytes.len() as u16).to_be_bytes();
        bytes[2] = size[0];
        bytes[3] = size[1];
        Ok(bytes)
    }

    fn seal_attributes(&mut self, secret: &str, auth: &[u8; 16]) -> Result<(), Error> {
        let dictionary = self.dictionary.clone();
        for attribute in &mut self.attributes {
            attribute.seal(&dictionary, secret, auth)?;
        }

        Ok(())
    }

    fn open_attributes(&mut self, secret: &str, auth: &[u8; 16]) -> Result<(), Error> {
        let dictionary = self.dictionary.clone();
        for attribute in &mut self.attributes {
            attribute.open(&dictionary, secret, auth)?;
        }

        Ok(())
    }

    /// A Status-Server probe and anything carrying EAP must carry a
    /// Message-Authenticator; add the placeholder when missing.
    fn ensure_message_authenticator(&mut self) {
        let required = self.code == Code::StatusServer
            || self.find(VENDOR_NONE, EAP_MESSAGE).is_some();

        if required && self.find(VENDOR_NONE, MESSAGE_AUTHENTICATOR).is_none() {
            self.attributes
                .push(Attribute::octets(MESSAGE_AUTHENTICATOR, vec![0u8; 16]));
        }
    }

    /// Recompute the Message-Authenticator value, if the attribute is
    /// present: HMAC-MD5 over the packet with `auth_slot` in the header
    /// and the attribute value zeroed.
    fn update_message_authenticator(
        &mut self,
        secret: &str,
        auth_slot: &[u8; 16],
    ) -> Result<(), Error> {
        let present = self
            .attributes
            .iter()
            .any(|a| a.vendor_id() == VENDOR_NONE && a.kind() == MESSAGE_AUTHENTICATOR);
        if !present {
            return Ok(());
        }

        self.set_message_authenticator(vec![0u8; 16]);
        let bytes = self.serialize(auth_slot)?;
        let digest = crypto::hmac_md5(secret.as_bytes(), &[&bytes]);
        self.set_message_authenticator(digest.to_vec());
        Ok(())
    }

    fn set_message_authenticator(&mut self, value: Vec<u8>) {
        for attribute in &mut self.attributes {
            if attribute.vendor_id() == VENDOR_NONE && attribute.kind() == MESSAGE_AUTHENTICATOR {
                *attribute.value_mut() = value;
                return;
            }
        }
    }

    /// Rendered attribute kinds for diagnostics: name when the
    /// dictionary has one, the numeric type otherwise.
    pub fn describe(&self) -> String {
        let names = self
            .attributes
            .iter()
            .map(|attribute| match attribute.name(&self.dictionary) {
                Some(name) => name.to_string(),
                None => attribute.kind().to_string(),
            })
            .collect::<Vec<_>>();

        format!("{:?} id={} [{}]", self.code, self.identifier, names.join(", "))
    }
}

/// Check a Message-Authenticator in raw wire bytes, if one is present.
fn verify_message_authenticator(
    raw: &[u8],
    auth_slot: &[u8; 16],
    secret: &str,
) -> Result<(), Error> {
    let Some((offset, length)) = find_attribute_region(raw, MESSAGE_AUTHENTICATOR as u8) else {
        return Ok(());
    };

    if length != 18 {
        return Err(Error::MalformedPacket("message authenticator is not 16 octets"));
    }

    let mut copy = raw.to_vec();
    copy[4..20].copy_from_slice(auth_slot);

    let stored: [u8; 16] = raw[offset + 2..offset + 18]
        .try_into()
        .expect("length checked above");
    copy[offset + 2..offset + 18].fill(0);

    if crypto::hmac_md5(secret.as_bytes(), &[&copy]) != stored {
        return Err(Error::AuthenticatorInvalid);
    }

    Ok(())
}

// Locate the first top level attribute of `kind`: absolute offset and
// total length. The caller already validated the attribute framing.
fn find_attribute_region(raw: &[u8], kind: u8) -> Option<(usize, usize)> {
    let mut offset = MIN_PACKET_LEN;

    while offset + 2 <= raw.len() {
        let length = raw[offset + 1] as usize;
        if length < 2 || offset + length > raw.len() {
            return None;
        }

        if raw[offset] == kind {
            return Some((offset, length));
        }

        offset += length;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{PROXY_STATE, USER_PASSWORD};

    fn dict() -> Arc<Dictionary> {
        Arc::new(Dictionary::default())
    }

    fn access_request(dict: &Arc<Dictionary>) -> Packet {
        Packet::new(dict.clone(), Code::AccessRequest, 42)
            .with_attribute(dict.attribute("User-Name", "test").unwrap())
            .with_attribute(dict.attribute("User-Password", "password").unwrap())
    }

    #[test]
    fn round_trip_preserves_the_packet() {
        let dict = dict();
        let encoded = access_request(&dict).encode_request("testing123").unwrap();

        let bytes = encoded.to_bytes().unwrap();
        let decoded = Packet::decode_request(&bytes, dict, "testing123").unwrap();

        // The decoded request has its password opened again; encoding
        // it once more must reproduce the same packet.
        let reencoded = decoded.encode_request("testing123").unwrap();
        assert_eq!(reencoded, encoded);
        assert_eq!(reencoded.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn encode_request_is_idempotent() {
        let dict = dict();
        let once = access_request(&dict).encode_request("testing123").unwrap();
        let twice = once.clone().encode_request("testing123").unwrap();

        assert_eq!(once.to_bytes().unwrap(), twice.to_bytes().unwrap());
    }

    #[test]
    fn accounting_encode_is_idempotent() {
        let dict = dict();
        let request = Packet::new(dict, Code::AccountingRequest, 9)
            .with_attribute(
                Dictionary::default().attribute("Acct-Status-Type", "Start").unwrap(),
            );

        let once = request.encode_request("testing123").unwrap();
        let twice = once.clone().encode_request("testing123").unwrap();
        assert_eq!(once.to_bytes().unwrap(), twice.to_bytes().unwrap());
    }

    #[test]
    fn accounting_authenticator_verifies() {
        let dict = dict();
        let request = Packet::new(dict.clone(), Code::AccountingRequest, 7)
            .with_attribute(dict.attribute("Acct-Session-Id", "abc123").unwrap())
            .encode_request("testing123")
            .unwrap();

        let bytes = request.to_bytes().unwrap();
        assert!(Packet::decode_request(&bytes, dict.clone(), "testing123").is_ok());
        assert_eq!(
            Packet::decode_request(&bytes, dict, "wrong"),
            Err(Error::AuthenticatorInvalid)
        );
    }

    #[test]
    fn response_authenticator_law() {
        let dict = dict();
        let request = access_request(&dict).encode_request("testing123").unwrap();
        let request_auth = *request.authenticator().unwrap();

        let response = request
            .response(Code::AccessAccept)
            .with_attribute(dict.attribute("Reply-Message", "Welcome test!").unwrap())
            .encode_response("testing123", &request_auth)
            .unwrap();

        // auth(r) == md5(type | id | len | auth(q) | attrs | secret)
        let bytes = response.to_bytes().unwrap();
        let mut copy = bytes.to_vec();
        copy[4..20].copy_from_slice(&request_auth);
        assert_eq!(
            crypto::md5(&[&copy, b"testing123"]),
            *response.authenticator().unwrap()
        );

        let decoded =
            Packet::decode_response(&bytes, dict.clone(), "testing123", &request_auth).unwrap();
        assert_eq!(decoded.identifier(), 42);

        let mut other_auth = request_auth;
        other_auth[0] ^= 0xff;
        assert_eq!(
            Packet::decode_response(&bytes, dict, "testing123", &other_auth),
            Err(Error::AuthenticatorInvalid)
        );
    }

    #[test]
    fn message_authenticator_round_trip() {
        let dict = dict();
        let request = Packet::new(dict.clone(), Code::AccessRequest, 3)
            .with_attribute(dict.attribute("User-Name", "eap-user").unwrap())
            .with_attribute(Attribute::octets(EAP_MESSAGE, vec![0x02, 0x00, 0x00, 0x04]))
            .encode_request("testing123")
            .unwrap();

        let bytes = request.to_bytes().unwrap();

        // The EAP request got a Message-Authenticator and it checks out.
        assert!(Packet::decode_request(&bytes, dict.clone(), "testing123").is_ok());

        // Any flipped payload bit fails the check.
        let mut tampered = bytes.to_vec();
        *tampered.last_mut().unwrap() ^= 0x01;
        assert_eq!(
            Packet::decode_request(&tampered, dict, "testing123"),
            Err(Error::AuthenticatorInvalid)
        );
    }

    #[test]
    fn eap_without_message_authenticator_is_rejected() {
        let dict = dict();
        let mut packet = Packet::new(dict.clone(), Code::AccessRequest, 3)
            .with_attribute(Attribute::octets(EAP_MESSAGE, vec![0x02]))
            .encode_request("testing123")
            .unwrap();

        // Strip the Message-Authenticator and refresh the length.
        packet = packet.without_attributes(VENDOR_NONE, MESSAGE_AUTHENTICATOR);
        let bytes = packet.to_bytes().unwrap();

        assert_eq!(
            Packet::decode_request(&bytes, dict, "testing123"),
            Err(Error::MalformedPacket("EAP request without Message-Authenticator"))
        );
    }

    #[test]
    fn length_bounds_are_enforced() {
        let dict = dict();

        // 20 octet header + 15 attributes of 255 octets + one of 251
        // octets is exactly 4096.
        let mut packet = Packet::new(dict.clone(), Code::AccessRequest, 1);
        for _ in 0..15 {
            packet = packet.with_attribute(Attribute::octets(25, vec![0u8; 253]));
        }
        packet = packet.with_attribute(Attribute::octets(25, vec![0u8; 249]));

        let encoded = packet.clone().encode_request("s").unwrap();
        assert_eq!(encoded.to_bytes().unwrap().len(), MAX_PACKET_LEN);

        // One more octet of payload crosses the limit.
        let oversized = packet
            .without_last_attribute(VENDOR_NONE, 25)
            .with_attribute(Attribute::octets(25, vec![0u8; 250]))
            .encode_request("s");
        assert_eq!(
            oversized,
            Err(Error::MalformedPacket("packet exceeds 4096 octets"))
        );
    }

    #[test]
    fn truncated_and_lying_headers_are_rejected() {
        let dict = dict();

        assert!(Packet::decode(&[0x01, 0x00, 0x00], dict.clone()).is_err());

        // Declares 40 octets but delivers 20.
        let mut short = vec![0u8; 20];
        short[0] = 0x01;
        short[3] = 40;
        assert_eq!(
            Packet::decode(&short, dict.clone()),
            Err(Error::MalformedPacket("declared length exceeds datagram"))
        );

        // Declares less than a header.
        let mut tiny = vec![0u8; 20];
        tiny[0] = 0x01;
        tiny[3] = 10;
        assert_eq!(
            Packet::decode(&tiny, dict.clone()),
            Err(Error::MalformedPacket("declared length out of range"))
        );

        // Trailing padding past the declared length is tolerated.
        let mut padded = vec![0u8; 24];
        padded[0] = 0x01;
        padded[3] = 20;
        assert!(Packet::decode(&padded, dict).is_ok());
    }

    #[test]
    fn password_is_opened_on_decode() {
        let dict = dict();
        let encoded = access_request(&dict).encode_request("testing123").unwrap();
        let bytes = encoded.to_bytes().unwrap();

        let decoded = Packet::decode_request(&bytes, dict, "testing123").unwrap();
        let password = decoded.find(VENDOR_NONE, USER_PASSWORD).unwrap();
        assert_eq!(password.value(), b"password");
        assert!(!password.is_encoded());
    }

    #[test]
    fn without_last_attribute_strips_one() {
        let dict = dict();
        let packet = Packet::new(dict, Code::AccessRequest, 1)
            .with_attribute(Attribute::octets(PROXY_STATE, b"one".to_vec()))
            .with_attribute(Attribute::octets(PROXY_STATE, b"two".to_vec()))
            .without_last_attribute(VENDOR_NONE, PROXY_STATE);

        let states = packet.find_all(VENDOR_NONE, PROXY_STATE);
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].value(), b"one");
    }
}
