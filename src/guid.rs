use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;
use uuid::Uuid;

/// Size of a GUID on the wire.
pub const GUID_SIZE: usize = 16;

#[derive(Copy, Clone, PartialOrd, PartialEq, Eq, Hash, Default)]
pub struct Guid {
    data1: u32,
    data2: u16,
    data3: u16,
    data4: [u8; 8],
}

#[derive(Debug, Error)]
#[error("`{input}` is not a valid GUID")]
pub struct GuidParseError {
    input: String,
    #[source]
    source: uuid::Error,
}

impl Guid {
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Guid {
        Guid {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// Reads a GUID in its Windows in-memory layout (first three groups little-endian).
    pub fn from_le_bytes(bytes: [u8; GUID_SIZE]) -> Guid {
        let mut data4 = [0; 8];
        data4.copy_from_slice(&bytes[8..16]);
        Guid {
            data1: LittleEndian::read_u32(&bytes[0..4]),
            data2: LittleEndian::read_u16(&bytes[4..6]),
            data3: LittleEndian::read_u16(&bytes[6..8]),
            data4,
        }
    }

    pub fn to_le_bytes(&self) -> [u8; GUID_SIZE] {
        let mut out = [0; GUID_SIZE];
        LittleEndian::write_u32(&mut out[0..4], self.data1);
        LittleEndian::write_u16(&mut out[4..6], self.data2);
        LittleEndian::write_u16(&mut out[6..8], self.data3);
        out[8..16].copy_from_slice(&self.data4);
        out
    }
}

impl FromStr for Guid {
    type Err = GuidParseError;

    /// Accepts every textual form `uuid` does: hyphenated, braced, simple and URN.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s.trim()).map_err(|source| GuidParseError {
            input: s.to_owned(),
            source,
        })?;
        Ok(Guid::from(uuid))
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        let (data1, data2, data3, data4) = uuid.as_fields();
        Guid::new(data1, data2, data3, *data4)
    }
}

impl Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7]
        )
    }
}

impl Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parses_and_formats_braced_guid() {
        let guid: Guid = "{e13c0d23-ccbc-4e12-931b-d9cc2eee27e4}".parse().unwrap();
        assert_eq!(guid.to_string(), "E13C0D23-CCBC-4E12-931B-D9CC2EEE27E4");
    }

    #[test]
    fn test_wire_layout_is_mixed_endian() {
        let guid = Guid::new(0x0102_0304, 0x0506, 0x0708, [9, 10, 11, 12, 13, 14, 15, 16]);
        let bytes = guid.to_le_bytes();
        assert_eq!(
            bytes,
            [4, 3, 2, 1, 6, 5, 8, 7, 9, 10, 11, 12, 13, 14, 15, 16]
        );
        assert_eq!(Guid::from_le_bytes(bytes), guid);
    }

    #[test]
    fn test_parsed_guid_matches_windows_byte_order() {
        let text = "0a3b6c2d-1e2f-4a5b-8c7d-9e0f1a2b3c4d";
        let guid: Guid = text.parse().unwrap();
        let uuid = Uuid::parse_str(text).unwrap();
        assert_eq!(guid.to_le_bytes(), uuid.to_bytes_le());
        assert_eq!(Guid::from(uuid), guid);
    }

    #[test]
    fn test_rejects_malformed_guid() {
        assert!("not-a-guid".parse::<Guid>().is_err());
        assert!("e13c0d23-ccbc-4e12-931b-d9cc2eee27e".parse::<Guid>().is_err());
    }
}
