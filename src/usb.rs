//! USB descriptor vocabulary shared by the generator stages.

use num_enum::{IntoPrimitive, FromPrimitive};
use derive_more::{From, Into, Display};

use crate::error::Error;

/// Highest number of endpoint slots a configuration may use, including EP0.
pub const MAX_ENDPOINTS: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Direction {
    #[default]
    Out = 0,
    In = 1,
}

impl Direction {
    /// Direction named by the last `_`-separated word of an endpoint field
    /// name, e.g. `data_in`.
    pub fn from_field_name(name: &str) -> Option<Direction> {
        let suffix = name.rsplit('_').next()?;
        match suffix.to_ascii_uppercase().as_str() {
            "IN" => Some(Direction::In),
            "OUT" => Some(Direction::Out),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", match self {
            Direction::In  => "IN",
            Direction::Out => "OUT"})
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, From, Into, Display)]
pub struct EndpointNum(pub u8);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, From, Into)]
pub struct EndpointAddr(pub u8);

impl EndpointAddr {
    pub fn from_parts(number: EndpointNum, direction: Direction) -> Self {
        EndpointAddr((direction as u8) << 7 | number.0 & 0x7F)
    }
}

impl std::fmt::Display for EndpointAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DescriptorType {
    Device = 1,
    Configuration = 2,
    String = 3,
    Interface = 4,
    Endpoint = 5,
    #[default]
    Unknown = 9
}

/// Binary-coded decimal version, as carried in `bcdDevice`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BCDVersion {
    pub minor: u8,
    pub major: u8,
}

impl BCDVersion {
    /// Pack a decimal version number such as `1.23`.
    ///
    /// Returns `None` outside `0 <= version < 100`.
    pub fn from_decimal(version: f64) -> Option<BCDVersion> {
        if !(0.0..100.0).contains(&version) {
            return None;
        }
        let scaled = (version * 100.0).round() as u32;
        if scaled >= 10000 {
            return None;
        }
        let bcd = |n: u32| (((n / 10) << 4) | (n % 10)) as u8;
        Some(BCDVersion {
            major: bcd(scaled / 100),
            minor: bcd(scaled % 100),
        })
    }

    pub fn value(&self) -> u16 {
        u16::from(self.major) << 8 | u16::from(self.minor)
    }

    /// C literal form, e.g. `0x0123`.
    pub fn literal(&self) -> String {
        format!("0x{:04x}", self.value())
    }
}

impl std::fmt::Display for BCDVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:X}.{:02X}", self.major, self.minor)
    }
}

pub struct UTF16Bytes<'b>(&'b [u8]);

impl UTF16Bytes<'_> {
    fn chars(&self) -> Vec<u16> {
        self.0.chunks_exact(2)
              .map(|a| u16::from_le_bytes([a[0], a[1]]))
              .collect()
    }
}

impl std::fmt::Display for UTF16Bytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let chars = self.chars();
        match String::from_utf16(&chars) {
            Ok(string) => write!(f, "'{}'", string.escape_default()),
            Err(_) => write!(f,
                "invalid UTF16, partial decode: '{}'",
                String::from_utf16_lossy(&chars).escape_default())
        }
    }
}

/// Longest payload a string descriptor can carry, as `bLength` is one byte
/// and includes the two header bytes.
pub const MAX_STRING_BYTES: usize = u8::MAX as usize - 2;

/// UTF-16LE payload of a string descriptor, at most `MAX_STRING_BYTES` long.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UTF16ByteVec(Vec<u8>);

impl UTF16ByteVec {
    /// Encode `text`, or `None` if it does not fit in a string descriptor.
    pub fn encode(text: &str) -> Option<UTF16ByteVec> {
        let bytes: Vec<u8> = text.encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();
        (bytes.len() <= MAX_STRING_BYTES).then_some(UTF16ByteVec(bytes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Complete string descriptor: length, type, then the payload.
    pub fn descriptor(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + self.0.len());
        bytes.push((2 + self.0.len()) as u8);
        bytes.push(DescriptorType::String.into());
        bytes.extend_from_slice(&self.0);
        bytes
    }
}

impl std::fmt::Display for UTF16ByteVec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        UTF16Bytes(self.0.as_slice()).fmt(f)
    }
}

struct ClassCode {
    name: &'static str,
    symbol: &'static str,
    subclasses: &'static [SubclassCode],
}

struct SubclassCode {
    name: &'static str,
    symbol: &'static str,
    protocols: &'static [(&'static str, &'static str)],
}

const NO_PROTOCOL: &[(&str, &str)] = &[("none", "0")];

const NO_SUBCLASS: &[SubclassCode] = &[
    SubclassCode { name: "none", symbol: "0", protocols: NO_PROTOCOL },
];

const DEVICE_CLASSES: &[ClassCode] = &[
    ClassCode {
        name: "none",
        symbol: "TUSB_CLASS_UNSPECIFIED",
        subclasses: NO_SUBCLASS,
    },
    ClassCode {
        name: "misc",
        symbol: "TUSB_CLASS_MISC",
        subclasses: &[
            SubclassCode { name: "none", symbol: "0", protocols: NO_PROTOCOL },
            SubclassCode {
                name: "common",
                symbol: "MISC_SUBCLASS_COMMON",
                protocols: &[("none", "0"), ("iad", "MISC_PROTOCOL_IAD")],
            },
        ],
    },
    ClassCode {
        name: "cdc",
        symbol: "TUSB_CLASS_CDC",
        subclasses: NO_SUBCLASS,
    },
    ClassCode {
        name: "hid",
        symbol: "TUSB_CLASS_HID",
        subclasses: NO_SUBCLASS,
    },
    ClassCode {
        name: "vendor",
        symbol: "TUSB_CLASS_VENDOR_SPECIFIC",
        subclasses: NO_SUBCLASS,
    },
];

/// Symbolic class, subclass and protocol codes of a device descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceClassCodes {
    pub class: &'static str,
    pub subclass: &'static str,
    pub protocol: &'static str,
}

impl DeviceClassCodes {
    pub fn lookup(class: &str, subclass: &str, protocol: &str)
        -> Result<DeviceClassCodes, Error>
    {
        let unknown = |kind, name: &str| Error::UnknownClassName {
            kind,
            name: name.to_string(),
        };
        let class_code = DEVICE_CLASSES
            .iter()
            .find(|c| c.name == class)
            .ok_or_else(|| unknown("device class", class))?;
        let subclass_code = class_code.subclasses
            .iter()
            .find(|s| s.name == subclass)
            .ok_or_else(|| unknown("device subclass", subclass))?;
        let protocol_symbol = subclass_code.protocols
            .iter()
            .find(|(name, _)| *name == protocol)
            .map(|(_, symbol)| *symbol)
            .ok_or_else(|| unknown("device protocol", protocol))?;
        Ok(DeviceClassCodes {
            class: class_code.symbol,
            subclass: subclass_code.symbol,
            protocol: protocol_symbol,
        })
    }
}
