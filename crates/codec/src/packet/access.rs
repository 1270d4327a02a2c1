use std::sync::Arc;

use rand::Rng;

use crate::{
    Error,
    attribute::{
        ARAP_PASSWORD, Attribute, CHAP_CHALLENGE, CHAP_PASSWORD, EAP_MESSAGE, USER_NAME,
        USER_PASSWORD, VENDOR_NONE,
    },
    crypto,
    dict::Dictionary,
    packet::{Code, Packet},
};

/// The authentication mechanism carried inside an Access-Request,
/// derived from which password attributes are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMechanism {
    /// User-Password (2), plaintext under the packet authenticator.
    Pap,
    /// CHAP-Password (3), with CHAP-Challenge (60) or the packet
    /// authenticator as the challenge.
    Chap,
    /// One or more EAP-Message (79) attributes.
    Eap,
    /// ARAP-Password (70). Carried structurally; its crypto is not
    /// implemented.
    Arap,
    /// No password attribute at all.
    NoAuth,
}

/// An Access-Request with its password semantics.
///
/// This wraps a [`Packet`] with code 1; encoding and decoding stay on
/// the packet itself, this type adds classification, the PAP and CHAP
/// builders, and password verification for the server side.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRequest {
    packet: Packet,
}

impl AccessRequest {
    pub fn new(dictionary: Arc<Dictionary>, identifier: u8) -> Self {
        Self {
            packet: Packet::new(dictionary, Code::AccessRequest, identifier),
        }
    }

    pub fn from_packet(packet: Packet) -> Result<Self, Error> {
        if packet.code() != Code::AccessRequest {
            return Err(Error::MalformedPacket("not an Access-Request"));
        }

        Ok(Self { packet })
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn into_packet(self) -> Packet {
        self.packet
    }

    /// Add User-Name and a plaintext User-Password. The password is
    /// encrypted when the packet is encoded.
    pub fn with_pap(mut self, user: &str, password: &str) -> Self {
        self.packet = self
            .packet
            .with_attribute(Attribute::octets(USER_NAME, user.as_bytes().to_vec()))
            .with_attribute(Attribute::octets(USER_PASSWORD, password.as_bytes().to_vec()));
        self
    }

    /// Add User-Name, a random CHAP-Challenge and the derived
    /// CHAP-Password `chap_id | md5(chap_id | password | challenge)`.
    pub fn with_chap(mut self, user: &str, password: &str) -> Self {
        let mut challenge = [0u8; 16];
        rand::rng().fill(&mut challenge);
        let chap_id: u8 = rand::rng().random();

        let mut chap_password = Vec::with_capacity(17);
        chap_password.push(chap_id);
        chap_password.extend_from_slice(&crypto::md5(&[
            &[chap_id],
            password.as_bytes(),
            &challenge,
        ]));

        self.packet = self
            .packet
            .with_attribute(Attribute::octets(USER_NAME, user.as_bytes().to_vec()))
            .with_attribute(Attribute::octets(CHAP_CHALLENGE, challenge.to_vec()))
            .with_attribute(Attribute::octets(CHAP_PASSWORD, chap_password));
        self
    }

    pub fn user_name(&self) -> Option<String> {
        self.packet.attribute_text("User-Name")
    }

    /// Classify the request. Exactly one mechanism may be present;
    /// several at once make the request invalid even though it still
    /// parses.
    pub fn mechanism(&self) -> Result<AuthMechanism, Error> {
        let mut found = Vec::new();

        if self.packet.find(VENDOR_NONE, USER_PASSWORD).is_some() {
            found.push(AuthMechanism::Pap);
        }

        if self.packet.find(VENDOR_NONE, CHAP_PASSWORD).is_some() {
            found.push(AuthMechanism::Chap);
        }

        if self.packet.find(VENDOR_NONE, EAP_MESSAGE).is_some() {
            found.push(AuthMechanism::Eap);
        }

        if self.packet.find(VENDOR_NONE, ARAP_PASSWORD).is_some() {
            found.push(AuthMechanism::Arap);
        }

        match found.as_slice() {
            [] => Ok(AuthMechanism::NoAuth),
            [mechanism] => Ok(*mechanism),
            _ => Err(Error::MalformedPacket("conflicting authentication attributes")),
        }
    }

    /// The decrypted PAP password, once the packet went through
    /// [`Packet::decode_request`].
    pub fn pap_password(&self) -> Option<&[u8]> {
        self.packet
            .find(VENDOR_NONE, USER_PASSWORD)
            .filter(|attribute| !attribute.is_encoded())
            .map(|attribute| attribute.value())
    }

    /// Check a candidate plaintext password against the request.
    ///
    /// PAP compares against the decrypted User-Password. CHAP
    /// recomputes `md5(chap_id | password | challenge)` over the
    /// CHAP-Challenge, falling back to the packet authenticator when no
    /// challenge attribute is present. A request without password
    /// attributes never verifies.
    pub fn verify_password(&self, plaintext: &str) -> Result<bool, Error> {
        match self.mechanism()? {
            AuthMechanism::Pap => {
                let password = self
                    .pap_password()
                    .ok_or(Error::MalformedPacket("password still encrypted"))?;
                Ok(password == plaintext.as_bytes())
            }
            AuthMechanism::Chap => {
                let chap = self
                    .packet
                    .find(VENDOR_NONE, CHAP_PASSWORD)
                    .map(|attribute| attribute.value())
                    .ok_or(Error::MalformedPacket("missing CHAP-Password"))?;
                if chap.len() != 17 {
                    return Err(Error::MalformedPacket("CHAP-Password is not 17 octets"));
                }

                let challenge = match self.packet.find(VENDOR_NONE, CHAP_CHALLENGE) {
                    Some(attribute) => attribute.value().to_vec(),
                    None => self
                        .packet
                        .authenticator()
                        .ok_or(Error::MalformedPacket("no challenge and no authenticator"))?
                        .to_vec(),
                };

                let digest = crypto::md5(&[&chap[..1], plaintext.as_bytes(), &challenge]);
                Ok(digest[..] == chap[1..])
            }
            AuthMechanism::Eap => Err(Error::UnsupportedAuth("EAP")),
            AuthMechanism::Arap => Err(Error::UnsupportedAuth("ARAP")),
            AuthMechanism::NoAuth => Ok(false),
        }
    }
}
