//! String descriptor table.

use std::fmt::Write;

use indexmap::IndexMap;

use crate::expr::identifier;
use crate::error::Error;
use crate::usb::{MAX_STRING_BYTES, UTF16ByteVec};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringEntry {
    /// Symbolic index, `STRING_INDEX_<OWNER>_<PROPERTY>`.
    pub id: String,
    pub text: String,
    pub encoded: UTF16ByteVec,
}

impl StringEntry {
    /// C initialiser for this entry's descriptor record.
    pub fn record(&self) -> String {
        if self.encoded.is_empty() {
            return "NULL".to_string();
        }
        let mut record = String::from("\"");
        for byte in self.encoded.descriptor() {
            write!(record, "\\x{byte:02x}").unwrap();
        }
        record.push('"');
        record
    }
}

/// String entries in first-insertion order.
///
/// Index 0 is the language descriptor; entries are numbered from 1.
#[derive(Clone, Debug, Default)]
pub struct StringTable {
    entries: IndexMap<String, StringEntry>,
}

impl StringTable {
    pub fn new() -> StringTable {
        StringTable::default()
    }

    /// Register the string `property` of `owner` and return its identifier.
    ///
    /// An identifier seen before keeps its first value. A missing or
    /// empty value still gets an entry, rendered as `NULL`.
    pub fn add(&mut self, owner: &str, property: &str, value: Option<&str>)
        -> Result<String, Error>
    {
        let id = format!("STRING_INDEX_{}_{}", identifier(owner), identifier(property));
        if self.entries.contains_key(&id) {
            return Ok(id);
        }
        let text = value.unwrap_or_default();
        let encoded = UTF16ByteVec::encode(text)
            .ok_or_else(|| Error::StringTooLong {
                id: id.clone(),
                length: text.encode_utf16().count() * 2,
                max: MAX_STRING_BYTES,
            })?;
        self.entries.insert(id.clone(), StringEntry {
            id: id.clone(),
            text: text.to_string(),
            encoded,
        });
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StringEntry> {
        self.entries.values()
    }

    /// Largest descriptor payload in bytes.
    pub fn max_length(&self) -> usize {
        self.iter().map(|entry| entry.encoded.len()).max().unwrap_or(0)
    }

    /// Body of the index enumeration for the header.
    pub fn render_enum(&self) -> String {
        let mut text = String::from("\tSTRING_INDEX_LANGUAGE,\n");
        for entry in self.iter() {
            writeln!(text, "\t{},", entry.id).unwrap();
        }
        text.push_str("\tSTRING_INDEX_COUNT,\n");
        text
    }

    /// Initialisers for the descriptor source, language record first.
    pub fn render_records(&self) -> String {
        let mut text = String::from("\t\"\\x04\\x03\\x09\\x04\", // Language: English (0x0409)\n");
        for entry in self.iter() {
            writeln!(text, "\t{}, // {}: {}", entry.record(), entry.id, entry.encoded).unwrap();
        }
        text
    }
}
