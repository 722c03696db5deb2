//! The packed `Position` word and the `Angle` byte.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::{Decode, Encode, Result};

/// Three signed fields packed into one 64-bit big-endian word: x in the
/// high 26 bits, z in the next 26, y in the low 12. Each field is
/// sign-extended on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i16,
    pub z: i32,
}

impl Position {
    #[must_use]
    pub fn new(x: i32, y: i16, z: i32) -> Self {
        Position { x, y, z }
    }

    #[must_use]
    pub fn pack(self) -> i64 {
        (i64::from(self.x) & 0x3FF_FFFF) << 38
            | (i64::from(self.z) & 0x3FF_FFFF) << 12
            | (i64::from(self.y) & 0xFFF)
    }

    #[must_use]
    pub fn unpack(packed: i64) -> Self {
        let x = (packed >> 38) as i32;
        let y = ((packed << 52) >> 52) as i16;
        let z = ((packed << 26) >> 38) as i32;
        Position { x, y, z }
    }
}

impl Encode for Position {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_i64::<BigEndian>(self.pack())?;
        Ok(())
    }
}

impl Decode<'_> for Position {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Position::unpack(reader.read_i64::<BigEndian>()?))
    }
}

/// One byte, a full turn divided into 256 units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Angle(pub u8);

impl Angle {
    #[must_use]
    pub fn from_degrees(degrees: f64) -> Self {
        let normalized = degrees.rem_euclid(360.0);
        Angle((normalized * 255.0 / 360.0).round() as u8)
    }
}

impl Encode for Angle {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.0)?;
        Ok(())
    }
}

impl Decode<'_> for Angle {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Angle(reader.read_u8()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_packing_matches_spec_vector() {
        let pos = Position::new(18_357_644, 831, -20_882_616);
        assert_eq!(pos.pack(), 0x4607_63C2_D97D_03CFu64 as i64);
        assert_eq!(Position::unpack(pos.pack()), pos);
    }

    #[test]
    fn position_round_trips_through_encode_decode() {
        let pos = Position::new(-1, -2048, 1);
        let mut bytes = Vec::new();
        pos.encode(&mut bytes).unwrap();
        let decoded = Position::decode(&mut &bytes[..]).unwrap();
        assert_eq!(decoded, pos);
    }

    #[test]
    fn angle_from_degrees_wraps() {
        assert_eq!(Angle::from_degrees(0.0).0, 0);
        assert_eq!(Angle::from_degrees(360.0).0, 0);
        assert_eq!(Angle::from_degrees(180.0).0, 128);
    }
}
