use crate::iec_61850_9_2::common::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 48-bit Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const LENGTH: usize = 6;

    /// Base multicast address assigned to sampled values (01-0C-CD-04-xx-xx).
    pub const SV_MULTICAST_BASE: MacAddress = MacAddress([0x01, 0x0C, 0xCD, 0x04, 0x00, 0x00]);
    /// Base multicast address assigned to GOOSE (01-0C-CD-01-xx-xx).
    pub const GOOSE_MULTICAST_BASE: MacAddress = MacAddress([0x01, 0x0C, 0xCD, 0x01, 0x00, 0x00]);
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);

    pub fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    /// Parses `HH:HH:HH:HH:HH:HH`, case-insensitive.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        Self::try_parse(s).ok_or_else(|| ConfigError::InvalidMac(s.to_string()))
    }

    pub fn try_parse(s: &str) -> Option<Self> {
        let mut bytes = [0u8; 6];
        let mut count = 0;
        for segment in s.split(':') {
            if count == 6 || segment.is_empty() || segment.len() > 2 {
                return None;
            }
            bytes[count] = u8::from_str_radix(segment, 16).ok()?;
            count += 1;
        }
        if count != 6 {
            return None;
        }
        Some(MacAddress(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xFF; 6]
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }

    pub fn is_locally_administered(&self) -> bool {
        self.0[0] & 0x02 != 0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MacAddress::parse(s)
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}
