//! Parser for the sfnt `name` table.
//!
//! TrueType and OpenType fonts start with a table directory:
//!
//! ```text
//! u32 sfVersion      0x00010000 or 'OTTO'
//! u16 numTables
//! u16 searchRange, entrySelector, rangeShift
//! numTables x { u32 tag, u32 checkSum, u32 offset, u32 length }
//! ```
//!
//! The `name` table it points to holds a header and a list of records whose string payloads
//! live in a storage area following the records:
//!
//! ```text
//! u16 format
//! u16 count
//! u16 stringOffset   relative to the start of the name table
//! count x { u16 platformID, u16 encodingID, u16 languageID, u16 nameID,
//!           u16 length, u16 offset }   offset relative to the string storage
//! ```
//!
//! Fonts handed to the host are untrusted. Every extent is checked against the end of the
//! blob before any byte is copied: a record pointing outside the blob is skipped, a table
//! pointing outside the blob yields an empty [`NameTable`]. Parsing never fails.

use log::debug;

use crate::{file::Parser, Result};

pub mod cache;

pub use cache::FontNameCache;

/// The `name` table tag.
pub const NAME_TAG: u32 = u32::from_be_bytes(*b"name");

const DIRECTORY_HEADER_SIZE: usize = 12;
const TABLE_RECORD_SIZE: usize = 16;
const NAME_HEADER_SIZE: usize = 6;
const NAME_RECORD_SIZE: usize = 12;

/// Selector for one name record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameQuery {
    /// Platform (0 Unicode, 1 Macintosh, 3 Windows)
    pub platform_id: u16,
    /// Platform-specific encoding
    pub encoding_id: u16,
    /// Language, e.g. 0x409 for en-US on Windows
    pub language_id: u16,
    /// Which name (1 family, 2 subfamily, 4 full name, ...)
    pub name_id: u16,
}

impl NameQuery {
    /// Build a query from its four keys.
    #[must_use]
    pub fn new(platform_id: u16, encoding_id: u16, language_id: u16, name_id: u16) -> Self {
        NameQuery {
            platform_id,
            encoding_id,
            language_id,
            name_id,
        }
    }
}

/// One name record with its payload copied out of the font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    /// Platform identifier
    pub platform_id: u16,
    /// Encoding identifier
    pub encoding_id: u16,
    /// Language identifier
    pub language_id: u16,
    /// Name identifier
    pub name_id: u16,
    /// Raw string bytes in the platform's encoding
    pub data: Vec<u8>,
}

impl NameRecord {
    fn matches(&self, query: &NameQuery) -> bool {
        self.platform_id == query.platform_id
            && self.encoding_id == query.encoding_id
            && self.language_id == query.language_id
            && self.name_id == query.name_id
    }

    /// Decode the payload: UTF-16BE for the Unicode and Windows platforms, Latin-1 otherwise.
    #[must_use]
    pub fn decode(&self) -> String {
        match self.platform_id {
            0 | 3 => {
                let units: Vec<u16> = self
                    .data
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
            _ => self.data.iter().map(|&byte| char::from(byte)).collect(),
        }
    }
}

/// The records of one font's `name` table, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    records: Vec<NameRecord>,
}

impl NameTable {
    /// Locate and parse the `name` table of a font file.
    ///
    /// A damaged directory or a missing table yields an empty table.
    #[must_use]
    pub fn parse(font: &[u8]) -> NameTable {
        match find_table(font, NAME_TAG) {
            Ok(Some((offset, length))) => NameTable::parse_table(font, offset, length),
            Ok(None) => {
                debug!("Font has no name table");
                NameTable::default()
            }
            Err(error) => {
                debug!("Unreadable font directory: {error}");
                NameTable::default()
            }
        }
    }

    /// Parse the `name` table spanning `length` bytes at `offset` of `blob`.
    ///
    /// A declared extent beyond the blob yields an empty table. Records whose payload lies
    /// outside the blob, or is empty, are skipped.
    #[must_use]
    pub fn parse_table(blob: &[u8], offset: usize, length: usize) -> NameTable {
        let within = offset
            .checked_add(length)
            .is_some_and(|end| end <= blob.len());
        if !within {
            debug!(
                "Name table at {offset}+{length} exceeds font of {} bytes",
                blob.len()
            );
            return NameTable::default();
        }

        match read_records(blob, offset) {
            Ok(records) => NameTable { records },
            Err(error) => {
                debug!("Unreadable name table header: {error}");
                NameTable::default()
            }
        }
    }

    /// The record for `query`: the exact four-key match, else the first record with the same
    /// name id, else `None`.
    #[must_use]
    pub fn lookup(&self, query: &NameQuery) -> Option<&NameRecord> {
        self.records
            .iter()
            .find(|record| record.matches(query))
            .or_else(|| {
                self.records
                    .iter()
                    .find(|record| record.name_id == query.name_id)
            })
    }

    /// All parsed records.
    #[must_use]
    pub fn records(&self) -> &[NameRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Find a table in the sfnt directory, returning its offset and length.
fn find_table(font: &[u8], tag: u32) -> Result<Option<(usize, usize)>> {
    let mut parser = Parser::new(font);
    parser.ensure_remaining(DIRECTORY_HEADER_SIZE)?;

    let _version = parser.read_be::<u32>()?;
    let num_tables = parser.read_be::<u16>()?;
    parser.advance_by(6)?;

    for _ in 0..num_tables {
        parser.ensure_remaining(TABLE_RECORD_SIZE)?;
        let table_tag = parser.read_be::<u32>()?;
        let _checksum = parser.read_be::<u32>()?;
        let offset = parser.read_be::<u32>()?;
        let length = parser.read_be::<u32>()?;
        if table_tag == tag {
            return Ok(Some((offset as usize, length as usize)));
        }
    }

    Ok(None)
}

fn read_records(blob: &[u8], base: usize) -> Result<Vec<NameRecord>> {
    let mut parser = Parser::new(blob);
    parser.seek(base)?;
    parser.ensure_remaining(NAME_HEADER_SIZE)?;

    let _format = parser.read_be::<u16>()?;
    let count = parser.read_be::<u16>()?;
    let storage = base + usize::from(parser.read_be::<u16>()?);

    let mut records = Vec::with_capacity(usize::from(count));
    for index in 0..count {
        if parser.remaining() < NAME_RECORD_SIZE {
            debug!("Name table truncated after {index} of {count} records");
            break;
        }

        let platform_id = parser.read_be::<u16>()?;
        let encoding_id = parser.read_be::<u16>()?;
        let language_id = parser.read_be::<u16>()?;
        let name_id = parser.read_be::<u16>()?;
        let length = usize::from(parser.read_be::<u16>()?);
        let start = storage + usize::from(parser.read_be::<u16>()?);

        if length == 0 || start + length > blob.len() {
            debug!("Skipping name record {index} at {start}+{length}");
            continue;
        }

        records.push(NameRecord {
            platform_id,
            encoding_id,
            language_id,
            name_id,
            data: blob[start..start + length].to_vec(),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::FontBuilder;

    #[test]
    fn parse_font_directory() {
        let font = FontBuilder::new()
            .record(3, 1, 0x409, 1, "Demo Sans")
            .record(1, 0, 0, 4, "Demo Sans Regular")
            .build();

        let table = NameTable::parse(&font);
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0].decode(), "Demo Sans");
        assert_eq!(table.records()[1].decode(), "Demo Sans Regular");
    }

    #[test]
    fn lookup_falls_back_to_name_id() {
        let font = FontBuilder::new()
            .record(1, 0, 0, 1, "Family")
            .record(1, 0, 0, 4, "Full Name")
            .build();
        let table = NameTable::parse(&font);

        let record = table.lookup(&NameQuery::new(3, 1, 0x409, 4)).unwrap();
        assert_eq!(record.data, b"Full Name");
        assert!(table.lookup(&NameQuery::new(3, 1, 0x409, 6)).is_none());
    }

    #[test]
    fn exact_match_wins() {
        let font = FontBuilder::new()
            .record(1, 0, 0, 4, "Mac")
            .record(3, 1, 0x409, 4, "Windows")
            .build();
        let table = NameTable::parse(&font);

        let record = table.lookup(&NameQuery::new(3, 1, 0x409, 4)).unwrap();
        assert_eq!(record.decode(), "Windows");
    }

    #[test]
    fn out_of_range_record_is_skipped() {
        let font = FontBuilder::new()
            .record(1, 0, 0, 1, "A")
            .record(1, 0, 0, 2, "B")
            .raw_record(1, 0, 0, 3, 0xFFF0, 8)
            .build();
        let table = NameTable::parse(&font);

        let ids: Vec<u16> = table.records().iter().map(|r| r.name_id).collect();
        assert_eq!(ids, [1, 2]);
    }

    #[test]
    fn declared_extent_beyond_blob_is_empty() {
        let font = FontBuilder::new().record(1, 0, 0, 1, "A").build();
        let (offset, _) = find_table(&font, NAME_TAG).unwrap().unwrap();
        assert!(NameTable::parse_table(&font, offset, font.len()).is_empty());
        assert!(NameTable::parse_table(&font, usize::MAX, 2).is_empty());
    }

    #[test]
    fn damaged_fonts_are_empty() {
        assert!(NameTable::parse(&[]).is_empty());
        assert!(NameTable::parse(&[0, 1, 0, 0, 0, 9]).is_empty());

        let mut font = FontBuilder::new().record(1, 0, 0, 1, "A").build();
        font.truncate(20);
        assert!(NameTable::parse(&font).is_empty());
    }

    #[test]
    fn zero_length_records_are_skipped() {
        let font = FontBuilder::new()
            .raw_record(1, 0, 0, 1, 0, 0)
            .record(1, 0, 0, 2, "B")
            .build();
        let table = NameTable::parse(&font);
        assert_eq!(table.len(), 1);
        assert_eq!(table.records()[0].name_id, 2);
    }
}
