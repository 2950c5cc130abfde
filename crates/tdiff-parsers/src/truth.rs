// tdiff-parsers/src/truth.rs
//! Binary encoding of truth containers stored in branch entries
//!
//! # Layout
//! ```text
//! u32 particle count, then per particle: i32 key + fields
//! u32 vertex count,   then per vertex:   i32 key + fields
//! u32 shower count,   then per shower:   i32 key + fields
//! ```
//! Integers and floats are little-endian. Strings carry a `u16` length,
//! maps and sets a `u32` count followed by their elements in key order.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tdiff_core::{Particle, Shower, TruthInfoContainer, Vertex};

use crate::traits::{BranchRecord, ParseError, ParseResult};

impl BranchRecord for TruthInfoContainer {
    fn class_name() -> &'static str {
        TruthInfoContainer::CLASS_NAME
    }

    fn decode_into(&mut self, data: &[u8]) -> ParseResult<()> {
        self.clear();
        let mut reader = RecordReader::new(data);

        for _ in 0..reader.count("particle count")? {
            let id = reader.i32("particle key")?;
            let particle = reader.particle()?;
            self.add_particle(id, particle);
        }

        for _ in 0..reader.count("vertex count")? {
            let id = reader.i32("vertex key")?;
            let vertex = reader.vertex()?;
            self.add_vertex(id, vertex);
        }

        for _ in 0..reader.count("shower count")? {
            let id = reader.i32("shower key")?;
            let shower = reader.shower()?;
            self.add_shower(id, shower);
        }

        reader.finish()
    }

    fn encode(&self, out: &mut Vec<u8>) -> ParseResult<()> {
        out.write_u32::<LittleEndian>(self.particle_map().len() as u32)?;
        for (id, particle) in self.particle_map() {
            out.write_i32::<LittleEndian>(*id)?;
            write_particle(out, particle)?;
        }

        out.write_u32::<LittleEndian>(self.vertex_map().len() as u32)?;
        for (id, vertex) in self.vertex_map() {
            out.write_i32::<LittleEndian>(*id)?;
            write_vertex(out, vertex)?;
        }

        out.write_u32::<LittleEndian>(self.shower_map().len() as u32)?;
        for (id, shower) in self.shower_map() {
            out.write_i32::<LittleEndian>(*id)?;
            write_shower(out, shower)?;
        }

        Ok(())
    }
}

/// Bounds-checked reader over one entry
struct RecordReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> RecordReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    fn truncated(&self, what: &str) -> ParseError {
        ParseError::corrupted(self.cursor.position(), format!("record truncated reading {}", what))
    }

    fn i32(&mut self, what: &str) -> ParseResult<i32> {
        self.cursor.read_i32::<LittleEndian>().map_err(|_| self.truncated(what))
    }

    fn u64(&mut self, what: &str) -> ParseResult<u64> {
        self.cursor.read_u64::<LittleEndian>().map_err(|_| self.truncated(what))
    }

    fn f32(&mut self, what: &str) -> ParseResult<f32> {
        self.cursor.read_f32::<LittleEndian>().map_err(|_| self.truncated(what))
    }

    fn f64(&mut self, what: &str) -> ParseResult<f64> {
        self.cursor.read_f64::<LittleEndian>().map_err(|_| self.truncated(what))
    }

    fn count(&mut self, what: &str) -> ParseResult<u32> {
        self.cursor.read_u32::<LittleEndian>().map_err(|_| self.truncated(what))
    }

    fn string(&mut self, what: &str) -> ParseResult<String> {
        let len = self.cursor.read_u16::<LittleEndian>().map_err(|_| self.truncated(what))?;
        let mut bytes = vec![0u8; len as usize];
        self.cursor.read_exact(&mut bytes).map_err(|_| self.truncated(what))?;
        String::from_utf8(bytes).map_err(|_| {
            ParseError::corrupted(self.cursor.position(), format!("{} is not valid UTF-8", what))
        })
    }

    fn f32_map(&mut self, what: &str) -> ParseResult<BTreeMap<i32, f32>> {
        let mut map = BTreeMap::new();
        for _ in 0..self.count(what)? {
            let key = self.i32(what)?;
            map.insert(key, self.f32(what)?);
        }
        Ok(map)
    }

    fn particle(&mut self) -> ParseResult<Particle> {
        Ok(Particle {
            track_id: self.i32("particle track id")?,
            vtx_id: self.i32("particle vertex id")?,
            parent_id: self.i32("particle parent id")?,
            primary_id: self.i32("particle primary id")?,
            pid: self.i32("particle pid")?,
            name: self.string("particle name")?,
            px: self.f64("particle px")?,
            py: self.f64("particle py")?,
            pz: self.f64("particle pz")?,
            e: self.f64("particle energy")?,
            barcode: self.i32("particle barcode")?,
        })
    }

    fn vertex(&mut self) -> ParseResult<Vertex> {
        Ok(Vertex {
            id: self.i32("vertex id")?,
            x: self.f64("vertex x")?,
            y: self.f64("vertex y")?,
            z: self.f64("vertex z")?,
            t: self.f64("vertex t")?,
            process: self.i32("vertex process")?,
        })
    }

    fn shower(&mut self) -> ParseResult<Shower> {
        let id = self.i32("shower id")?;
        let parent_particle_id = self.i32("shower parent particle")?;
        let parent_shower_id = self.i32("shower parent shower")?;

        let mut position = [0f32; 3];
        for v in position.iter_mut() {
            *v = self.f32("shower position")?;
        }
        let mut covariance = [0f32; 6];
        for v in covariance.iter_mut() {
            *v = self.f32("shower covariance")?;
        }

        let edep = self.f32_map("shower edep")?;
        let eion = self.f32_map("shower eion")?;
        let light_yield = self.f32_map("shower light yield")?;

        let mut particle_ids = BTreeSet::new();
        for _ in 0..self.count("shower particle ids")? {
            particle_ids.insert(self.i32("shower particle id")?);
        }

        let mut hit_ids = BTreeMap::new();
        for _ in 0..self.count("shower hit volumes")? {
            let volume = self.i32("shower hit volume")?;
            let mut hits = BTreeSet::new();
            for _ in 0..self.count("shower hit count")? {
                hits.insert(self.u64("shower hit id")?);
            }
            hit_ids.insert(volume, hits);
        }

        Ok(Shower {
            id,
            parent_particle_id,
            parent_shower_id,
            position,
            covariance,
            edep,
            eion,
            light_yield,
            particle_ids,
            hit_ids,
        })
    }

    /// Fail if bytes remain after the record
    fn finish(self) -> ParseResult<()> {
        let len = self.cursor.get_ref().len() as u64;
        if self.cursor.position() != len {
            return Err(ParseError::corrupted(
                self.cursor.position(),
                format!("{} trailing bytes after record", len - self.cursor.position()),
            ));
        }
        Ok(())
    }
}

fn write_string(out: &mut Vec<u8>, value: &str) -> ParseResult<()> {
    let len = u16::try_from(value.len())
        .map_err(|_| ParseError::InvalidStructure(format!("string too long: {} bytes", value.len())))?;
    out.write_u16::<LittleEndian>(len)?;
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

fn write_f32_map(out: &mut Vec<u8>, map: &BTreeMap<i32, f32>) -> ParseResult<()> {
    out.write_u32::<LittleEndian>(map.len() as u32)?;
    for (key, value) in map {
        out.write_i32::<LittleEndian>(*key)?;
        out.write_f32::<LittleEndian>(*value)?;
    }
    Ok(())
}

fn write_particle(out: &mut Vec<u8>, p: &Particle) -> ParseResult<()> {
    out.write_i32::<LittleEndian>(p.track_id)?;
    out.write_i32::<LittleEndian>(p.vtx_id)?;
    out.write_i32::<LittleEndian>(p.parent_id)?;
    out.write_i32::<LittleEndian>(p.primary_id)?;
    out.write_i32::<LittleEndian>(p.pid)?;
    write_string(out, &p.name)?;
    out.write_f64::<LittleEndian>(p.px)?;
    out.write_f64::<LittleEndian>(p.py)?;
    out.write_f64::<LittleEndian>(p.pz)?;
    out.write_f64::<LittleEndian>(p.e)?;
    out.write_i32::<LittleEndian>(p.barcode)?;
    Ok(())
}

fn write_vertex(out: &mut Vec<u8>, v: &Vertex) -> ParseResult<()> {
    out.write_i32::<LittleEndian>(v.id)?;
    out.write_f64::<LittleEndian>(v.x)?;
    out.write_f64::<LittleEndian>(v.y)?;
    out.write_f64::<LittleEndian>(v.z)?;
    out.write_f64::<LittleEndian>(v.t)?;
    out.write_i32::<LittleEndian>(v.process)?;
    Ok(())
}

fn write_shower(out: &mut Vec<u8>, s: &Shower) -> ParseResult<()> {
    out.write_i32::<LittleEndian>(s.id)?;
    out.write_i32::<LittleEndian>(s.parent_particle_id)?;
    out.write_i32::<LittleEndian>(s.parent_shower_id)?;
    for v in s.position.iter().chain(s.covariance.iter()) {
        out.write_f32::<LittleEndian>(*v)?;
    }

    write_f32_map(out, &s.edep)?;
    write_f32_map(out, &s.eion)?;
    write_f32_map(out, &s.light_yield)?;

    out.write_u32::<LittleEndian>(s.particle_ids.len() as u32)?;
    for id in &s.particle_ids {
        out.write_i32::<LittleEndian>(*id)?;
    }

    out.write_u32::<LittleEndian>(s.hit_ids.len() as u32)?;
    for (volume, hits) in &s.hit_ids {
        out.write_i32::<LittleEndian>(*volume)?;
        out.write_u32::<LittleEndian>(hits.len() as u32)?;
        for hit in hits {
            out.write_u64::<LittleEndian>(*hit)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_container() -> TruthInfoContainer {
        let mut c = TruthInfoContainer::new();
        c.add_particle(
            1,
            Particle {
                vtx_id: 1,
                primary_id: 1,
                barcode: 1001,
                ..Particle::new(1, 211, "pi+").with_momentum(0.3, -0.1, 2.5, 2.53)
            },
        );
        c.add_particle(
            -2,
            Particle {
                parent_id: 1,
                vtx_id: -1,
                ..Particle::new(-2, 22, "gamma")
            },
        );
        c.add_vertex(1, Vertex::new(1, 0.0, 0.0, 0.1, 0.0));
        c.add_vertex(-1, Vertex { process: 12, ..Vertex::new(-1, 5.0, 2.0, 30.0, 1.2) });

        let mut shower = Shower::new(1, 1);
        shower.position = [1.0, 2.0, 3.0];
        shower.edep.insert(4, 0.75);
        shower.eion.insert(4, 0.01);
        shower.particle_ids.extend([1, -2]);
        shower.hit_ids.entry(4).or_default().extend([10u64, 11, 12]);
        c.add_shower(1, shower);
        c
    }

    fn encode(c: &TruthInfoContainer) -> Vec<u8> {
        let mut bytes = Vec::new();
        c.encode(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_class_name() {
        assert_eq!(TruthInfoContainer::class_name(), "PHG4TruthInfoContainer");
    }

    #[test]
    fn test_decoded_container_equals_source() {
        let source = make_container();
        let mut decoded = TruthInfoContainer::new();
        decoded.decode_into(&encode(&source)).unwrap();
        assert_eq!(decoded, source);
    }

    #[test]
    fn test_decode_replaces_previous_contents() {
        let mut target = make_container();
        let empty = TruthInfoContainer::new();
        target.decode_into(&encode(&empty)).unwrap();
        assert!(target.is_empty());
    }

    #[test]
    fn test_empty_container_layout() {
        let bytes = encode(&TruthInfoContainer::new());
        assert_eq!(bytes, vec![0u8; 12]);
    }

    #[test]
    fn test_truncated_record() {
        let bytes = encode(&make_container());
        let mut target = TruthInfoContainer::new();
        for cut in [1, 5, bytes.len() / 2, bytes.len() - 1] {
            let result = target.decode_into(&bytes[..cut]);
            assert!(
                matches!(result, Err(ParseError::CorruptedData { .. })),
                "cut at {} gave {:?}",
                cut,
                result
            );
        }
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = encode(&make_container());
        bytes.push(0);
        let mut target = TruthInfoContainer::new();
        assert!(target.decode_into(&bytes).is_err());
    }
}
