//! Entity metadata: a sparse array indexed 0..7, each entry typed by a
//! fixed discriminator table, terminated by any index byte ≥ 7 — whose
//! bytes, plus everything after them, are preserved verbatim.

use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};
use serde_json::Value as Json;

use crate::position::Position;
use crate::slot::Slot;
use crate::{read_varint, write_varint, Decode, Encode, ProtocolError, Result};

/// The fixed entity-metadata type table, discriminator → wire shape.
/// Discriminators 14 and 15 are reserved and never appear on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Byte(i8),
    VarInt(i32),
    Float(f32),
    String(String),
    Chat(Json),
    OptChat(Option<Json>),
    Slot(Slot),
    Boolean(bool),
    Rotation3(f32, f32, f32),
    Position(Position),
    OptPosition(Option<Position>),
    OptString(Option<String>),
    OptVarInt(Option<i32>),
    VarIntTriple(i32, i32, i32),
}

impl MetaValue {
    fn decode<R: Read>(type_id: i32, reader: &mut R) -> Result<Self> {
        match type_id {
            0 => Ok(MetaValue::Byte(reader.read_i8()?)),
            1 | 11 | 18 => Ok(MetaValue::VarInt(read_varint(reader)?)),
            2 => Ok(MetaValue::Float(f32::decode(reader)?)),
            3 => Ok(MetaValue::String(String::decode(reader)?)),
            4 => Ok(MetaValue::Chat(Json::decode(reader)?)),
            5 => Ok(MetaValue::OptChat(Option::<Json>::decode(reader)?)),
            6 => Ok(MetaValue::Slot(Slot::decode(reader)?)),
            7 => Ok(MetaValue::Boolean(bool::decode(reader)?)),
            8 => Ok(MetaValue::Rotation3(
                f32::decode(reader)?,
                f32::decode(reader)?,
                f32::decode(reader)?,
            )),
            9 => Ok(MetaValue::Position(Position::decode(reader)?)),
            10 => Ok(MetaValue::OptPosition(Option::<Position>::decode(reader)?)),
            12 => Ok(MetaValue::OptString(Option::<String>::decode(reader)?)),
            13 | 17 => Ok(MetaValue::OptVarInt(if bool::decode(reader)? {
                Some(read_varint(reader)?)
            } else {
                None
            })),
            16 => Ok(MetaValue::VarIntTriple(
                read_varint(reader)?,
                read_varint(reader)?,
                read_varint(reader)?,
            )),
            other => Err(ProtocolError::InvalidEnumVariant(other)),
        }
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            MetaValue::Byte(v) => writer.write_i8(*v).map_err(Into::into),
            MetaValue::VarInt(v) => write_varint(writer, *v),
            MetaValue::Float(v) => v.encode(writer),
            MetaValue::String(v) => v.encode(writer),
            MetaValue::Chat(v) => v.encode(writer),
            MetaValue::OptChat(v) => v.encode(writer),
            MetaValue::Slot(v) => v.encode(writer),
            MetaValue::Boolean(v) => v.encode(writer),
            MetaValue::Rotation3(a, b, c) => {
                a.encode(writer)?;
                b.encode(writer)?;
                c.encode(writer)
            }
            MetaValue::Position(v) => v.encode(writer),
            MetaValue::OptPosition(v) => v.encode(writer),
            MetaValue::OptString(v) => v.encode(writer),
            MetaValue::OptVarInt(v) => match v {
                Some(n) => {
                    true.encode(writer)?;
                    write_varint(writer, *n)
                }
                None => false.encode(writer),
            },
            MetaValue::VarIntTriple(a, b, c) => {
                write_varint(writer, *a)?;
                write_varint(writer, *b)?;
                write_varint(writer, *c)
            }
        }
    }
}

/// One present entry: the discriminator that selected `value`'s shape, kept
/// alongside it so re-encoding reproduces the exact discriminator byte (1,
/// 11 and 18 all decode to `MetaValue::VarInt` but are distinct on the wire).
#[derive(Debug, Clone, PartialEq)]
pub struct MetaEntry {
    pub type_id: i32,
    pub value: MetaValue,
}

/// Sparse metadata array: indices 0..7 are typed, anything at or past index
/// 7 (canonically the 0xFF terminator) is an opaque tail preserved for
/// round-tripping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityMetadata {
    pub entries: [Option<MetaEntry>; 7],
    pub tail: Vec<u8>,
}

impl EntityMetadata {
    #[must_use]
    pub fn get(&self, index: u8) -> Option<&MetaEntry> {
        self.entries.get(index as usize).and_then(Option::as_ref)
    }

    pub fn set(&mut self, index: u8, entry: MetaEntry) {
        self.entries[index as usize] = Some(entry);
    }
}

impl Encode for EntityMetadata {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        for (index, entry) in self.entries.iter().enumerate() {
            if let Some(entry) = entry {
                writer.write_u8(index as u8)?;
                write_varint(writer, entry.type_id)?;
                entry.value.encode(writer)?;
            }
        }
        writer.write_all(&self.tail)?;
        Ok(())
    }
}

impl Decode<'_> for EntityMetadata {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let mut entries: [Option<MetaEntry>; 7] = Default::default();
        loop {
            let index = reader.read_u8()?;
            if index >= 7 {
                let mut tail = vec![index];
                reader.read_to_end(&mut tail)?;
                return Ok(EntityMetadata { entries, tail });
            }
            let type_id = read_varint(reader)?;
            let value = MetaValue::decode(type_id, reader)?;
            entries[index as usize] = Some(MetaEntry { type_id, value });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminator_only_round_trips() {
        let meta = EntityMetadata {
            entries: Default::default(),
            tail: vec![0xFF],
        };
        let mut bytes = Vec::new();
        meta.encode(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0xFF]);
        assert_eq!(EntityMetadata::decode(&mut &bytes[..]).unwrap(), meta);
    }

    #[test]
    fn single_entry_then_terminator() {
        let mut meta = EntityMetadata::default();
        meta.set(
            0,
            MetaEntry {
                type_id: 0,
                value: MetaValue::Byte(0x40),
            },
        );
        meta.tail = vec![0xFF];
        let mut bytes = Vec::new();
        meta.encode(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0, 0, 0x40, 0xFF]);
        let decoded = EntityMetadata::decode(&mut &bytes[..]).unwrap();
        assert_eq!(decoded, meta);
        assert_eq!(decoded.get(0).unwrap().value, MetaValue::Byte(0x40));
    }

    #[test]
    fn higher_index_preserves_leftover_tail_verbatim() {
        let bytes = vec![9, 1, 2, 3, 4, 5];
        let decoded = EntityMetadata::decode(&mut &bytes[..]).unwrap();
        assert!(decoded.entries.iter().all(Option::is_none));
        assert_eq!(decoded.tail, bytes);
        let mut reencoded = Vec::new();
        decoded.encode(&mut reencoded).unwrap();
        assert_eq!(reencoded, bytes);
    }
}
