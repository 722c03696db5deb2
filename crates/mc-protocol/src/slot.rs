//! `slot` wire type: an optional inventory entry whose trailing NBT is
//! never parsed, only carried.

use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::{read_varint, write_varint, Decode, Encode, Result};

/// An inventory slot. The `nbt` field on `Present` is an opaque pass-through
/// blob: decoding consumes the entire remainder of the current buffer, so
/// `Slot` must be the last field decoded out of whatever body it appears in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Slot {
    #[default]
    Empty,
    Present {
        item_id: i32,
        count: i8,
        nbt: Vec<u8>,
    },
}

impl Encode for Slot {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Slot::Empty => false.encode(writer),
            Slot::Present {
                item_id,
                count,
                nbt,
            } => {
                true.encode(writer)?;
                write_varint(writer, *item_id)?;
                writer.write_i8(*count)?;
                writer.write_all(nbt)?;
                Ok(())
            }
        }
    }
}

impl Decode<'_> for Slot {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        if bool::decode(reader)? {
            let item_id = read_varint(reader)?;
            let count = reader.read_i8()?;
            let mut nbt = Vec::new();
            reader.read_to_end(&mut nbt)?;
            Ok(Slot::Present {
                item_id,
                count,
                nbt,
            })
        } else {
            Ok(Slot::Empty)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_round_trips() {
        let mut bytes = Vec::new();
        Slot::Empty.encode(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0]);
        assert_eq!(Slot::decode(&mut &bytes[..]).unwrap(), Slot::Empty);
    }

    #[test]
    fn present_slot_carries_nbt_tail_opaquely() {
        let slot = Slot::Present {
            item_id: 5,
            count: 3,
            nbt: vec![0x0A, 0x00],
        };
        let mut bytes = Vec::new();
        slot.encode(&mut bytes).unwrap();
        assert_eq!(Slot::decode(&mut &bytes[..]).unwrap(), slot);
    }
}
