use std::net::{Ipv4Addr, Ipv6Addr};

use crate::Error;

/// Dictionary data types. Every value is stored in wire form; the data
/// type only drives conversion from and to strings.
///
/// Types the dictionary grammar names but this codec has no richer
/// representation for (`abinary`, `tlv`, ...) behave like `octets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    String,
    Octets,
    Integer,
    Date,
    Ipaddr,
    Ipv6addr,
    Ipv6prefix,
    Ifid,
    Integer64,
    Ether,
    Abinary,
    Byte,
    Short,
    Signed,
    Tlv,
    Ipv4prefix,
    Vsa,
}

impl DataType {
    /// Data type from a dictionary file token. Unknown tokens fall back
    /// to `octets`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "octets" => Self::Octets,
            "integer" => Self::Integer,
            "date" => Self::Date,
            "ipaddr" => Self::Ipaddr,
            "ipv6addr" => Self::Ipv6addr,
            "ipv6prefix" => Self::Ipv6prefix,
            "ifid" => Self::Ifid,
            "integer64" => Self::Integer64,
            "ether" => Self::Ether,
            "abinary" => Self::Abinary,
            "byte" => Self::Byte,
            "short" => Self::Short,
            "signed" => Self::Signed,
            "tlv" => Self::Tlv,
            "ipv4prefix" => Self::Ipv4prefix,
            "vsa" => Self::Vsa,
            _ => Self::Octets,
        }
    }

    /// Parse a user supplied string into the wire form of this type.
    pub fn parse(self, value: &str) -> Result<Vec<u8>, Error> {
        match self {
            Self::String => {
                if value.is_empty() {
                    return Err(Error::InvalidValue("empty string value".to_string()));
                }

                Ok(value.as_bytes().to_vec())
            }
            Self::Integer | Self::Date => Ok(parse_u32(value)?.to_be_bytes().to_vec()),
            Self::Integer64 => Ok(parse_u64(value)?.to_be_bytes().to_vec()),
            Self::Byte => {
                let n = parse_u32(value)?;
                u8::try_from(n)
                    .map(|b| vec![b])
                    .map_err(|_| invalid(value, "byte"))
            }
            Self::Short => {
                let n = parse_u32(value)?;
                u16::try_from(n)
                    .map(|s| s.to_be_bytes().to_vec())
                    .map_err(|_| invalid(value, "short"))
            }
            Self::Signed => value
                .parse::<i32>()
                .map(|n| n.to_be_bytes().to_vec())
                .map_err(|_| invalid(value, "signed")),
            Self::Ipaddr => value
                .parse::<Ipv4Addr>()
                .map(|ip| ip.octets().to_vec())
                .map_err(|_| invalid(value, "ipaddr")),
            Self::Ipv6addr => value
                .parse::<Ipv6Addr>()
                .map(|ip| ip.octets().to_vec())
                .map_err(|_| invalid(value, "ipv6addr")),
            Self::Ipv6prefix => parse_ipv6_prefix(value),
            Self::Ipv4prefix => parse_ipv4_prefix(value),
            Self::Ifid => parse_grouped_hex(value, 8).ok_or_else(|| invalid(value, "ifid")),
            Self::Ether => parse_grouped_hex(value, 6).ok_or_else(|| invalid(value, "ether")),
            Self::Octets | Self::Abinary | Self::Tlv | Self::Vsa => hex_decode(value),
        }
    }

    /// Render wire bytes as a string. Values whose length does not fit
    /// the type are rendered as hex instead of failing.
    pub fn format(self, value: &[u8]) -> String {
        match self {
            Self::String => match std::str::from_utf8(value) {
                Ok(s) => s.to_string(),
                Err(_) => hex_encode(value),
            },
            Self::Integer | Self::Date => match <[u8; 4]>::try_from(value) {
                Ok(b) => u32::from_be_bytes(b).to_string(),
                Err(_) => hex_encode(value),
            },
            Self::Integer64 => match <[u8; 8]>::try_from(value) {
                Ok(b) => u64::from_be_bytes(b).to_string(),
                Err(_) => hex_encode(value),
            },
            Self::Byte => match value {
                [b] => b.to_string(),
                _ => hex_encode(value),
            },
            Self::Short => match <[u8; 2]>::try_from(value) {
                Ok(b) => u16::from_be_bytes(b).to_string(),
                Err(_) => hex_encode(value),
            },
            Self::Signed => match <[u8; 4]>::try_from(value) {
                Ok(b) => i32::from_be_bytes(b).to_string(),
                Err(_) => hex_encode(value),
            },
            Self::Ipaddr => match <[u8; 4]>::try_from(value) {
                Ok(b) => Ipv4Addr::from(b).to_string(),
                Err(_) => hex_encode(value),
            },
            Self::Ipv6addr => match <[u8; 16]>::try_from(value) {
                Ok(b) => Ipv6Addr::from(b).to_string(),
                Err(_) => hex_encode(value),
            },
            Self::Ipv6prefix => format_ipv6_prefix(value).unwrap_or_else(|| hex_encode(value)),
            Self::Ipv4prefix => format_ipv4_prefix(value).unwrap_or_else(|| hex_encode(value)),
            Self::Ifid | Self::Ether => {
                let groups = value
                    .iter()
                    .map(|b| format!("{:02x}", b))
                    .collect::<Vec<_>>();
                groups.join(":")
            }
            Self::Octets | Self::Abinary | Self::Tlv | Self::Vsa => hex_encode(value),
        }
    }
}

fn invalid(value: &str, kind: &str) -> Error {
    Error::InvalidValue(format!("{:?} is not a valid {}", value, kind))
}

/// Decimal or `0x` prefixed hex integer.
pub fn parse_u32(value: &str) -> Result<u32, Error> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };

    parsed.map_err(|_| invalid(value, "integer"))
}

pub fn parse_u64(value: &str) -> Result<u64, Error> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };

    parsed.map_err(|_| invalid(value, "integer64"))
}

/// Hex string, optionally `0x` prefixed, into bytes.
pub fn hex_decode(value: &str) -> Result<Vec<u8>, Error> {
    let hex = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);

    if hex.len() % 2 != 0 {
        return Err(invalid(value, "hex string"));
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid(value, "hex string")))
        .collect()
}

pub fn hex_encode(value: &[u8]) -> String {
    let mut out = String::with_capacity(2 + value.len() * 2);
    out.push_str("0x");
    for b in value {
        out.push_str(&format!("{:02x}", b));
    }

    out
}

// Hex octets with optional `:` or `-` group separators, as used by the
// ifid and ether types.
fn parse_grouped_hex(value: &str, size: usize) -> Option<Vec<u8>> {
    let hex = value.replace([':', '-'], "");
    let bytes = hex_decode(&hex).ok()?;
    (bytes.len() == size).then_some(bytes)
}

/// `addr/prefix-len` into `0x00 | prefix-len | addr`, with trailing
/// zero octets of the address trimmed. The wire form is 2 to 18 octets.
fn parse_ipv6_prefix(value: &str) -> Result<Vec<u8>, Error> {
    let (addr, len) = value
        .split_once('/')
        .ok_or_else(|| invalid(value, "ipv6prefix"))?;

    let addr = addr
        .parse::<Ipv6Addr>()
        .map_err(|_| invalid(value, "ipv6prefix"))?;
    let len = len
        .parse::<u8>()
        .ok()
        .filter(|n| *n <= 128)
        .ok_or_else(|| invalid(value, "ipv6prefix"))?;

    let mut bytes = vec![0, len];
    bytes.extend_from_slice(&addr.octets());
    while bytes.len() > 2 && bytes[bytes.len() - 1] == 0 {
        bytes.pop();
    }

    Ok(bytes)
}

fn format_ipv6_prefix(value: &[u8]) -> Option<String> {
    if value.len() < 2 || value.len() > 18 {
        return None;
    }

    let mut octets = [0u8; 16];
    octets[..value.len() - 2].copy_from_slice(&value[2..]);
    Some(format!("{}/{}", Ipv6Addr::from(octets), value[1]))
}

fn parse_ipv4_prefix(value: &str) -> Result<Vec<u8>, Error> {
    let (addr, len) = value
        .split_once('/')
        .ok_or_else(|| invalid(value, "ipv4prefix"))?;

    let addr = addr
        .parse::<Ipv4Addr>()
        .map_err(|_| invalid(value, "ipv4prefix"))?;
    let len = len
        .parse::<u8>()
        .ok()
        .filter(|n| *n <= 32)
        .ok_or_else(|| invalid(value, "ipv4prefix"))?;

    let mut bytes = vec![0, len];
    bytes.extend_from_slice(&addr.octets());
    Ok(bytes)
}

fn format_ipv4_prefix(value: &[u8]) -> Option<String> {
    let octets = <[u8; 4]>::try_from(value.get(2..6)?).ok()?;
    Some(format!("{}/{}", Ipv4Addr::from(octets), value[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_integer_forms() {
        assert_eq!(
            DataType::Integer.parse("1").unwrap(),
            vec![0x00, 0x00, 0x00, 0x01]
        );
        assert_eq!(
            DataType::Integer.parse("0x0A").unwrap(),
            vec![0x00, 0x00, 0x00, 0x0a]
        );
        assert!(DataType::Integer.parse("nope").is_err());
    }

    #[test]
    fn parse_addresses() {
        assert_eq!(
            DataType::Ipaddr.parse("192.168.0.107").unwrap(),
            vec![0xc0, 0xa8, 0x00, 0x6b]
        );

        let bytes = DataType::Ipv6addr.parse("fe80::1").unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(DataType::Ipv6addr.format(&bytes), "fe80::1");
    }

    #[test]
    fn ipv6_prefix_trims_trailing_zeros() {
        let bytes = DataType::Ipv6prefix.parse("fe80::/64").unwrap();
        assert_eq!(bytes, vec![0x00, 64, 0xfe, 0x80]);
        assert_eq!(DataType::Ipv6prefix.format(&bytes), "fe80::/64");

        // The whole zero prefix shrinks to the two octet header.
        assert_eq!(DataType::Ipv6prefix.parse("::/0").unwrap(), vec![0, 0]);
    }

    #[test]
    fn octets_hex_round_trip() {
        let bytes = DataType::Octets.parse("0xdeadbeef").unwrap();
        assert_eq!(bytes, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(DataType::Octets.format(&bytes), "0xdeadbeef");
        assert!(DataType::Octets.parse("abc").is_err());
    }

    #[test]
    fn ether_and_ifid() {
        assert_eq!(
            DataType::Ether.parse("00:0c:29:aa:bb:cc").unwrap(),
            vec![0x00, 0x0c, 0x29, 0xaa, 0xbb, 0xcc]
        );
        assert_eq!(
            DataType::Ifid.parse("0202:00ff:fe00:0001").unwrap().len(),
            8
        );
    }

    #[test]
    fn unknown_type_name_is_octets() {
        assert_eq!(DataType::from_name("combo-ip"), DataType::Octets);
    }
}
