use std::fmt;
use std::mem;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::guid::GUID_SIZE;

/// Declared input type of a template field (`win:*` manifest vocabulary).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    HexInt32,
    HexInt64,
    Float,
    Double,
    /// Win32 `BOOL`, four bytes on the wire.
    Boolean,
    Pointer,
    FileTime,
    SystemTime,
    UnicodeString,
    AnsiString,
    Guid,
    Binary,
}

impl InType {
    /// Natural width of one value, `None` for variable-length strings.
    pub fn natural_width(self) -> Option<usize> {
        let width = match self {
            InType::Int8 | InType::UInt8 | InType::Binary => 1,
            InType::Int16 | InType::UInt16 => 2,
            InType::Int32 | InType::UInt32 | InType::HexInt32 | InType::Float | InType::Boolean => {
                4
            }
            InType::Int64 | InType::UInt64 | InType::HexInt64 | InType::Double => 8,
            InType::FileTime => 8,
            InType::SystemTime => 16,
            InType::Pointer => mem::size_of::<usize>(),
            InType::Guid => GUID_SIZE,
            InType::UnicodeString | InType::AnsiString => return None,
        };
        Some(width)
    }

    /// Whether a field of this type can supply an element count.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            InType::Int8
                | InType::UInt8
                | InType::Int16
                | InType::UInt16
                | InType::Int32
                | InType::UInt32
                | InType::Int64
                | InType::UInt64
                | InType::HexInt32
                | InType::HexInt64
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            InType::Int8 => "win:Int8",
            InType::UInt8 => "win:UInt8",
            InType::Int16 => "win:Int16",
            InType::UInt16 => "win:UInt16",
            InType::Int32 => "win:Int32",
            InType::UInt32 => "win:UInt32",
            InType::Int64 => "win:Int64",
            InType::UInt64 => "win:UInt64",
            InType::HexInt32 => "win:HexInt32",
            InType::HexInt64 => "win:HexInt64",
            InType::Float => "win:Float",
            InType::Double => "win:Double",
            InType::Boolean => "win:Boolean",
            InType::Pointer => "win:Pointer",
            InType::FileTime => "win:FILETIME",
            InType::SystemTime => "win:SYSTEMTIME",
            InType::UnicodeString => "win:UnicodeString",
            InType::AnsiString => "win:AnsiString",
            InType::Guid => "win:GUID",
            InType::Binary => "win:Binary",
        }
    }
}

impl FromStr for InType {
    type Err = ();

    /// Accepts the manifest spelling, with or without the `win:` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bare = s.trim();
        let bare = bare.strip_prefix("win:").unwrap_or(bare);
        let in_type = match bare {
            "Int8" => InType::Int8,
            "UInt8" => InType::UInt8,
            "Int16" => InType::Int16,
            "UInt16" => InType::UInt16,
            "Int32" => InType::Int32,
            "UInt32" => InType::UInt32,
            "Int64" => InType::Int64,
            "UInt64" => InType::UInt64,
            "HexInt32" => InType::HexInt32,
            "HexInt64" => InType::HexInt64,
            "Float" => InType::Float,
            "Double" => InType::Double,
            "Boolean" => InType::Boolean,
            "Pointer" => InType::Pointer,
            "FILETIME" => InType::FileTime,
            "SYSTEMTIME" => InType::SystemTime,
            "UnicodeString" => InType::UnicodeString,
            "AnsiString" => InType::AnsiString,
            "GUID" => InType::Guid,
            "Binary" => InType::Binary,
            _ => return Err(()),
        };
        Ok(in_type)
    }
}

impl fmt::Display for InType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Complete schema input: keywords, templates, size overrides and providers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub keywords: Vec<KeywordDefinition>,
    #[serde(default)]
    pub templates: Vec<TemplateDefinition>,
    #[serde(default)]
    pub size_overrides: Vec<SizeOverrideDefinition>,
    #[serde(default)]
    pub providers: Vec<ProviderDefinition>,
}

impl SchemaDefinition {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordDefinition {
    pub name: String,
    pub mask: MaskValue,
}

/// A keyword mask, either numeric or textual (`"0x8000"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaskValue {
    Number(u64),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl TemplateDefinition {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        TemplateDefinition {
            name: name.into(),
            fields,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    /// Absent for struct fields.
    #[serde(default)]
    pub in_type: Option<String>,
    /// Name of an earlier field holding the element count.
    #[serde(default)]
    pub count: Option<String>,
    #[serde(default, rename = "struct")]
    pub is_struct: bool,
}

impl FieldDefinition {
    pub fn scalar(name: impl Into<String>, in_type: InType) -> Self {
        FieldDefinition {
            name: name.into(),
            in_type: Some(in_type.name().to_owned()),
            count: None,
            is_struct: false,
        }
    }

    pub fn array(name: impl Into<String>, in_type: InType, count: impl Into<String>) -> Self {
        FieldDefinition {
            name: name.into(),
            in_type: Some(in_type.name().to_owned()),
            count: Some(count.into()),
            is_struct: false,
        }
    }

    pub fn structure(name: impl Into<String>, count: Option<&str>) -> Self {
        FieldDefinition {
            name: name.into(),
            in_type: None,
            count: count.map(str::to_owned),
            is_struct: true,
        }
    }
}

/// Escape hatch for elements whose byte size cannot be derived from their declared type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeOverride {
    /// Bytes per element; the contribution is `count * n`.
    Element(u32),
    /// The whole contribution, regardless of the count.
    Total(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeOverrideDefinition {
    pub template: String,
    pub field: String,
    pub size: SizeOverride,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDefinition {
    pub name: String,
    #[serde(default)]
    pub events: Vec<EventDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDefinition {
    pub symbol: String,
    pub value: u32,
    #[serde(default)]
    pub version: u8,
    pub level: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub template: Option<String>,
}
