mod default;
mod parser;

use ahash::AHashMap;

use crate::{
    Error,
    attribute::{Attribute, Plain, VENDOR_NONE, cipher::Cipher, value::DataType},
};

/// A vendor entry. Most vendors use the standard one octet type and
/// length fields for their sub attributes; a few (USR, Lucent) use
/// wider type fields or drop the length field entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vendor {
    pub id: u32,
    pub name: String,
    pub type_size: usize,
    pub length_size: usize,
}

impl Vendor {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            type_size: 1,
            length_size: 1,
        }
    }

    pub fn with_format(
        id: u32,
        name: impl Into<String>,
        type_size: usize,
        length_size: usize,
    ) -> Result<Self, Error> {
        if !matches!(type_size, 1 | 2 | 4) || length_size > 2 {
            return Err(Error::InvalidValue(format!(
                "unsupported vendor format {},{}",
                type_size, length_size
            )));
        }

        Ok(Self {
            id,
            name: name.into(),
            type_size,
            length_size,
        })
    }

    pub fn header_size(&self) -> usize {
        self.type_size + self.length_size
    }
}

/// A dictionary entry describing one attribute: its name, data type,
/// encryption scheme, tag support, and named integer values.
#[derive(Debug, Clone)]
pub struct AttributeTemplate {
    pub vendor_id: i32,
    pub kind: u32,
    pub name: String,
    pub data_type: DataType,
    pub cipher: Cipher,
    pub tagged: bool,
    values: AHashMap<String, u32>,
    names: AHashMap<u32, String>,
}

impl AttributeTemplate {
    pub fn new(vendor_id: i32, kind: u32, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            vendor_id,
            kind,
            name: name.into(),
            data_type,
            cipher: Cipher::None,
            tagged: false,
            values: AHashMap::new(),
            names: AHashMap::new(),
        }
        .normalize()
    }

    pub fn with_cipher(mut self, cipher: Cipher) -> Self {
        self.cipher = cipher;
        self.normalize()
    }

    pub fn with_tag(mut self) -> Self {
        self.tagged = true;
        self
    }

    /// Some attributes have fixed semantics no dictionary file may
    /// override: User-Password (2) and Tunnel-Password (69) are always
    /// encrypted, Tunnel-Password is implicitly tagged, attribute 80 is
    /// always Message-Authenticator, and Ascend (529) type 214 is the
    /// Ascend-Send-Secret scheme.
    fn normalize(mut self) -> Self {
        match (self.vendor_id, self.kind) {
            (VENDOR_NONE, 2) => self.cipher = Cipher::UserPassword,
            (VENDOR_NONE, 69) => {
                self.cipher = Cipher::TunnelPassword;
                self.tagged = true;
            }
            (VENDOR_NONE, 80) => self.name = "Message-Authenticator".to_string(),
            (529, 214) => self.cipher = Cipher::AscendSendSecret,
            _ => {}
        }

        self
    }

    /// Integer for a named enumeration value.
    pub fn value_of(&self, name: &str) -> Option<u32> {
        self.values.get(name).copied()
    }

    /// Name for an integer enumeration value.
    pub fn name_of(&self, value: u32) -> Option<&str> {
        self.names.get(&value).map(String::as_str)
    }
}

/// Attribute and vendor name space.
///
/// A dictionary is built once at startup, from the built-in tables
/// and/or dictionary files, and then shared read-only behind an `Arc`.
/// [`Dictionary::default`] carries the standard RFC 2865/2866/2868/2869
/// attributes and the Ascend vendor; [`Dictionary::empty`] starts
/// blank for fully file-driven setups.
#[derive(Debug, Clone)]
pub struct Dictionary {
    templates: AHashMap<(i32, u32), AttributeTemplate>,
    by_name: AHashMap<String, (i32, u32)>,
    vendors: AHashMap<u32, Vendor>,
    vendor_names: AHashMap<String, u32>,
}

impl Default for Dictionary {
    fn default() -> Self {
        let mut dict = Self::empty();
        default::populate(&mut dict);
        dict
    }
}

impl Dictionary {
    pub fn empty() -> Self {
        Self {
            templates: AHashMap::new(),
            by_name: AHashMap::new(),
            vendors: AHashMap::new(),
            vendor_names: AHashMap::new(),
        }
    }

    pub fn template(&self, vendor_id: i32, kind: u32) -> Option<&AttributeTemplate> {
        self.templates.get(&(vendor_id, kind))
    }

    pub fn template_by_name(&self, name: &str) -> Option<&AttributeTemplate> {
        self.by_name.get(name).and_then(|key| self.templates.get(key))
    }

    pub fn vendor(&self, id: u32) -> Option<&Vendor> {
        self.vendors.get(&id)
    }

    pub fn vendor_by_name(&self, name: &str) -> Option<&Vendor> {
        self.vendor_names.get(name).and_then(|id| self.vendors.get(id))
    }

    /// Sub attribute header sizes for a vendor, defaulting to the
    /// standard one octet type and length.
    pub fn vendor_header(&self, id: u32) -> (usize, usize) {
        self.vendors
            .get(&id)
            .map(|vendor| (vendor.type_size, vendor.length_size))
            .unwrap_or((1, 1))
    }

    pub fn insert_vendor(&mut self, vendor: Vendor) -> Result<(), Error> {
        if self.vendors.contains_key(&vendor.id) {
            return Err(Error::InvalidValue(format!("duplicate vendor id {}", vendor.id)));
        }

        if self.vendor_names.contains_key(&vendor.name) {
            return Err(Error::InvalidValue(format!(
                "duplicate vendor name {:?}",
                vendor.name
            )));
        }

        self.vendor_names.insert(vendor.name.clone(), vendor.id);
        self.vendors.insert(vendor.id, vendor);
        Ok(())
    }

    pub fn insert_template(&mut self, template: AttributeTemplate) -> Result<(), Error> {
        let key = (template.vendor_id, template.kind);
        if self.templates.contains_key(&key) {
            return Err(Error::InvalidValue(format!(
                "duplicate attribute {} for vendor {}",
                template.kind, template.vendor_id
            )));
        }

        if self.by_name.contains_key(&template.name) {
            return Err(Error::InvalidValue(format!(
                "duplicate attribute name {:?}",
                template.name
            )));
        }

        self.by_name.insert(template.name.clone(), key);
        self.templates.insert(key, template);
        Ok(())
    }

    pub fn insert_value(&mut self, attribute: &str, name: &str, value: u32) -> Result<(), Error> {
        let key = self
            .by_name
            .get(attribute)
            .copied()
            .ok_or_else(|| Error::UnknownAttributeName(attribute.to_string()))?;

        // The template is known to exist; by_name is never stale.
        let template = self.templates.get_mut(&key).expect("name index out of sync");
        template.values.insert(name.to_string(), value);
        template.names.insert(value, name.to_string());
        Ok(())
    }

    /// Build an attribute from its dictionary name and a string value.
    /// Integer attributes accept enumeration names.
    ///
    /// # Test
    ///
    /// ```
    /// use radius_server_codec::Dictionary;
    ///
    /// let dict = Dictionary::default();
    /// let attr = dict.attribute("Service-Type", "Login-User").unwrap();
    ///
    /// assert_eq!(attr.value(), &[0x00, 0x00, 0x00, 0x01]);
    /// ```
    pub fn attribute(&self, name: &str, value: &str) -> Result<Attribute, Error> {
        let template = self
            .template_by_name(name)
            .ok_or_else(|| Error::UnknownAttributeName(name.to_string()))?;

        let bytes = match template.data_type {
            DataType::Integer => match template.value_of(value) {
                Some(number) => number.to_be_bytes().to_vec(),
                None => template.data_type.parse(value)?,
            },
            _ => template.data_type.parse(value)?,
        };

        Ok(self.build(template, None, bytes))
    }

    /// Like [`Dictionary::attribute`] but with an explicit RFC 2868 tag.
    pub fn attribute_tagged(&self, name: &str, tag: u8, value: &str) -> Result<Attribute, Error> {
        let template = self
            .template_by_name(name)
            .ok_or_else(|| Error::UnknownAttributeName(name.to_string()))?;

        let bytes = match template.data_type {
            DataType::Integer => match template.value_of(value) {
                Some(number) => number.to_be_bytes().to_vec(),
                None => template.data_type.parse(value)?,
            },
            _ => template.data_type.parse(value)?,
        };

        Ok(self.build(template, Some(tag), bytes))
    }

    /// Build an attribute from its dictionary name and raw octets.
    pub fn attribute_octets(&self, name: &str, value: &[u8]) -> Result<Attribute, Error> {
        let template = self
            .template_by_name(name)
            .ok_or_else(|| Error::UnknownAttributeName(name.to_string()))?;

        Ok(self.build(template, None, value.to_vec()))
    }

    fn build(&self, template: &AttributeTemplate, tag: Option<u8>, value: Vec<u8>) -> Attribute {
        let tag = match (template.tagged, tag) {
            (false, _) => None,
            (true, Some(tag)) => Some(tag),
            // An unspecified tag on a tagged attribute is tag zero.
            (true, None) => Some(0),
        };

        Attribute::Plain(Plain {
            vendor_id: template.vendor_id,
            kind: template.kind,
            tag,
            value,
            encoded: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn enumeration_to_wire_bytes() {
        let dict = Dictionary::default();
        let attr = dict.attribute("Service-Type", "Login-User").unwrap();

        let mut bytes = BytesMut::new();
        attr.encode_into(&mut bytes, &dict).unwrap();
        assert_eq!(&bytes[..], &[0x06, 0x06, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn enumeration_names_resolve_both_ways() {
        let dict = Dictionary::default();
        let template = dict.template_by_name("Acct-Status-Type").unwrap();

        assert_eq!(template.value_of("Start"), Some(1));
        assert_eq!(template.name_of(2), Some("Stop"));
        assert_eq!(template.value_of("Missing"), None);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let dict = Dictionary::default();

        assert_eq!(
            dict.attribute("No-Such-Attribute", "1"),
            Err(Error::UnknownAttributeName("No-Such-Attribute".to_string()))
        );
    }

    #[test]
    fn fixed_attribute_semantics() {
        let dict = Dictionary::default();

        assert_eq!(
            dict.template(VENDOR_NONE, 2).unwrap().cipher,
            Cipher::UserPassword
        );

        let tunnel = dict.template(VENDOR_NONE, 69).unwrap();
        assert_eq!(tunnel.cipher, Cipher::TunnelPassword);
        assert!(tunnel.tagged);

        assert_eq!(
            dict.template(VENDOR_NONE, 80).unwrap().name,
            "Message-Authenticator"
        );

        assert_eq!(
            dict.template(529, 214).unwrap().cipher,
            Cipher::AscendSendSecret
        );
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut dict = Dictionary::default();

        assert!(
            dict.insert_template(AttributeTemplate::new(
                VENDOR_NONE,
                1,
                "Duplicate-Kind",
                DataType::String,
            ))
            .is_err()
        );

        assert!(
            dict.insert_template(AttributeTemplate::new(
                VENDOR_NONE,
                200,
                "User-Name",
                DataType::String,
            ))
            .is_err()
        );

        assert!(dict.insert_vendor(Vendor::new(529, "Ascend-Again")).is_err());
    }

    #[test]
    fn tagged_attribute_gets_default_tag() {
        let dict = Dictionary::default();

        let attr = dict.attribute("Tunnel-Type", "L2TP").unwrap();
        assert_eq!(attr.tag(), Some(0));
        assert_eq!(attr.value(), &[0x00, 0x00, 0x00, 0x03]);

        let attr = dict.attribute_tagged("Tunnel-Type", 7, "L2TP").unwrap();
        assert_eq!(attr.tag(), Some(7));
    }
}
