//! 48-bit MAC addresses

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// A 48-bit IEEE 802 MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// The broadcast address `ff:ff:ff:ff:ff:ff`
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    /// Allocate the `index`-th locally administered unicast address.
    ///
    /// Addresses are handed out in installation order, starting at
    /// `02:00:00:00:00:01`.
    pub fn allocate(index: u32) -> Self {
        let n = index.wrapping_add(1).to_be_bytes();
        MacAddress([0x02, 0x00, n[0], n[1], n[2], n[3]])
    }

    /// Raw address bytes
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// True for multicast and broadcast addresses (I/G bit set)
    pub fn is_group(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// True only for the all-ones broadcast address
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| ParseError::InvalidAddress(s.to_string()))?;
            if part.len() != 2 {
                return Err(ParseError::InvalidAddress(s.to_string()));
            }
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| ParseError::InvalidAddress(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(ParseError::InvalidAddress(s.to_string()));
        }
        Ok(MacAddress(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let addr = MacAddress([0x02, 0x00, 0x00, 0x00, 0x1a, 0xff]);
        assert_eq!(addr.to_string(), "02:00:00:00:1a:ff");
        assert_eq!("02:00:00:00:1a:ff".parse::<MacAddress>().unwrap(), addr);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("02:00:00:00:1a".parse::<MacAddress>().is_err());
        assert!("02:00:00:00:1a:ff:00".parse::<MacAddress>().is_err());
        assert!("02:00:00:00:1a:zz".parse::<MacAddress>().is_err());
        assert!("2:00:00:00:1a:ff".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_allocate_is_unicast_and_distinct() {
        let a = MacAddress::allocate(0);
        let b = MacAddress::allocate(1);
        assert_ne!(a, b);
        assert!(!a.is_group());
        assert_eq!(a.to_string(), "02:00:00:00:00:01");
    }

    #[test]
    fn test_broadcast_is_group() {
        assert!(MacAddress::BROADCAST.is_group());
        assert!(MacAddress::BROADCAST.is_broadcast());
    }
}
