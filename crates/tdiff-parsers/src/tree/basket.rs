// tdiff-parsers/src/tree/basket.rs
//! Baskets: compressed blocks of consecutive branch entries

use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Range;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, warn};

use super::compression::{BasketCompression, Compression};
use super::directory::BasketInfo;
use crate::traits::{ParseError, ParseOptions, ParseResult};

/// Magic bytes opening every basket
pub const BASKET_MAGIC: &[u8; 4] = b"BSKT";

/// Size of the fixed basket header
pub const BASKET_HEADER_SIZE: u64 = 24;

/// Fixed-size header preceding the compressed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasketHeader {
    pub compression: Compression,
    pub compressed_len: u32,
    pub uncompressed_len: u32,
    /// CRC32 of the uncompressed payload
    pub crc32: u32,
    pub entry_count: u32,
}

impl BasketHeader {
    pub fn read_from<R: Read>(reader: &mut R, offset: u64) -> ParseResult<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != BASKET_MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: BASKET_MAGIC.to_vec(),
                found: magic.to_vec(),
            }
            .with_context(format!("basket at offset {}", offset)));
        }

        let compression = Compression::from(reader.read_u8()?);
        let mut reserved = [0u8; 3];
        reader.read_exact(&mut reserved)?;

        Ok(Self {
            compression,
            compressed_len: reader.read_u32::<LittleEndian>()?,
            uncompressed_len: reader.read_u32::<LittleEndian>()?,
            crc32: reader.read_u32::<LittleEndian>()?,
            entry_count: reader.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> ParseResult<()> {
        writer.write_all(BASKET_MAGIC)?;
        writer.write_u8(self.compression.into())?;
        writer.write_all(&[0u8; 3])?;
        writer.write_u32::<LittleEndian>(self.compressed_len)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_len)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.entry_count)?;
        Ok(())
    }
}

/// A decompressed basket with its entry boundaries
#[derive(Debug, Clone)]
pub struct Basket {
    /// File offset the basket was read from
    pub offset: u64,
    pub first_entry: u64,
    payload: Vec<u8>,
    entries: Vec<Range<usize>>,
}

impl Basket {
    /// Read, decompress and index the basket described by `info`
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        info: &BasketInfo,
        options: &ParseOptions,
    ) -> ParseResult<Self> {
        reader.seek(SeekFrom::Start(info.offset))?;
        let header = BasketHeader::read_from(reader, info.offset)?;

        if header.entry_count != info.entry_count {
            return Err(ParseError::corrupted(
                info.offset,
                format!(
                    "basket holds {} entries, directory expects {}",
                    header.entry_count, info.entry_count
                ),
            ));
        }

        options.check_allocation(header.compressed_len as usize)?;
        options.check_allocation(header.uncompressed_len as usize)?;

        let mut compressed = vec![0u8; header.compressed_len as usize];
        reader.read_exact(&mut compressed)?;

        let payload = BasketCompression::decompress(
            &compressed,
            header.compression,
            header.uncompressed_len as usize,
        )?;

        if options.verify_checksums {
            BasketCompression::verify_crc32(&payload, header.crc32)
                .map_err(|e| e.with_context(format!("basket at offset {}", info.offset)))?;
        } else if header.crc32 == 0 {
            warn!(offset = info.offset, "Basket has no checksum");
        }

        let entries = split_entries(&payload, header.entry_count, info.offset)?;

        debug!(
            offset = info.offset,
            first_entry = info.first_entry,
            entries = entries.len(),
            compression = ?header.compression,
            "Read basket"
        );

        Ok(Self {
            offset: info.offset,
            first_entry: info.first_entry,
            payload,
            entries,
        })
    }

    /// Bytes of the entry with global index `entry`
    pub fn entry(&self, entry: u64) -> Option<&[u8]> {
        let local = entry.checked_sub(self.first_entry)?;
        let range = self.entries.get(usize::try_from(local).ok()?)?;
        Some(&self.payload[range.clone()])
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Build the on-disk form of a basket from encoded entries
    pub fn encode(entries: &[Vec<u8>], compression: Compression) -> ParseResult<Vec<u8>> {
        let mut payload = Vec::with_capacity(entries.iter().map(|e| e.len() + 4).sum());
        for entry in entries {
            let len = u32::try_from(entry.len()).map_err(|_| {
                ParseError::InvalidStructure(format!("entry too large: {} bytes", entry.len()))
            })?;
            payload.write_u32::<LittleEndian>(len)?;
            payload.extend_from_slice(entry);
        }

        let compressed = BasketCompression::compress(&payload, compression)?;
        let header = BasketHeader {
            compression,
            compressed_len: compressed.len() as u32,
            uncompressed_len: payload.len() as u32,
            crc32: BasketCompression::crc32(&payload),
            entry_count: entries.len() as u32,
        };

        let mut out = Vec::with_capacity(BASKET_HEADER_SIZE as usize + compressed.len());
        header.write_to(&mut out)?;
        out.extend_from_slice(&compressed);
        Ok(out)
    }
}

/// Split a payload into `count` length-prefixed entries
fn split_entries(payload: &[u8], count: u32, offset: u64) -> ParseResult<Vec<Range<usize>>> {
    let mut entries = Vec::with_capacity(count as usize);
    let mut pos = 0usize;

    for i in 0..count {
        let prefix = payload.get(pos..pos + 4).ok_or_else(|| {
            ParseError::corrupted(offset, format!("payload ends before entry {}", i))
        })?;
        let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        pos += 4;

        let end = pos
            .checked_add(len)
            .filter(|end| *end <= payload.len())
            .ok_or_else(|| {
                ParseError::corrupted(offset, format!("entry {} overruns the payload", i))
            })?;

        entries.push(pos..end);
        pos = end;
    }

    if pos != payload.len() {
        return Err(ParseError::corrupted(
            offset,
            format!("{} trailing bytes after last entry", payload.len() - pos),
        ));
    }

    Ok(entries)
}
