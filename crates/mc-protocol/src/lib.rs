//! Wire codec for the Minecraft Java Edition 1.15.2 protocol.
//!
//! Covers every primitive and composite type a packet body is built from:
//! VarInt/VarLong, the packed [`Position`], [`position::Angle`], [`Slot`],
//! sparse [`metadata::EntityMetadata`], and the [`buffer::Buffer`] FIFO that
//! packets are decoded from and re-encoded into.

use std::borrow::Cow;
use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod buffer;
pub mod metadata;
pub mod position;
pub mod slot;
pub mod uuid;

pub use buffer::Buffer;
pub use metadata::EntityMetadata;
pub use position::{Angle, Position};
pub use slot::Slot;
pub use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("VarInt too large")]
    VarIntTooLarge,
    #[error("string too long: {len} > {max}")]
    StringTooLong { len: usize, max: usize },
    #[error("invalid type discriminator: {0}")]
    InvalidEnumVariant(i32),
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("buffer underrun: requested {requested} bytes, {available} available")]
    BufferUnderrun { requested: usize, available: usize },
    #[error("decompression failure: {0}")]
    Decompress(String),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Connection phase. Named `handshake/status/login/play` per the four-phase
/// model this proxy operates under (no post-login "configuration" phase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Phase {
    Handshake = 0,
    Status = 1,
    Login = 2,
    Play = 3,
}

impl Phase {
    #[must_use]
    pub fn from_i32(n: i32) -> Option<Phase> {
        match n {
            0 => Some(Phase::Handshake),
            1 => Some(Phase::Status),
            2 => Some(Phase::Login),
            3 => Some(Phase::Play),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Packet direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Client to server.
    Serverbound,
    /// Server to client.
    Clientbound,
}

pub trait Encode {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()>;
}

pub trait Decode<'a>: Sized {
    fn decode<R: Read>(reader: &mut R) -> Result<Self>;
}

// --- VarInt / VarLong -------------------------------------------------

pub fn read_varint<R: Read>(reader: &mut R) -> Result<i32> {
    let mut result = 0i32;
    let mut shift = 0;
    loop {
        let byte = reader.read_u8()?;
        result |= i32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 32 {
            return Err(ProtocolError::VarIntTooLarge);
        }
    }
    Ok(result)
}

pub fn write_varint<W: Write>(writer: &mut W, mut value: i32) -> Result<()> {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value = ((value as u32) >> 7) as i32;
        if value != 0 {
            byte |= 0x80;
        }
        writer.write_u8(byte)?;
        if value == 0 {
            break;
        }
    }
    Ok(())
}

pub fn read_varlong<R: Read>(reader: &mut R) -> Result<i64> {
    let mut result = 0i64;
    let mut shift = 0;
    loop {
        let byte = reader.read_u8()?;
        result |= i64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 64 {
            return Err(ProtocolError::VarIntTooLarge);
        }
    }
    Ok(result)
}

pub fn write_varlong<W: Write>(writer: &mut W, mut value: i64) -> Result<()> {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value = ((value as u64) >> 7) as i64;
        if value != 0 {
            byte |= 0x80;
        }
        writer.write_u8(byte)?;
        if value == 0 {
            break;
        }
    }
    Ok(())
}

// --- Primitives --------------------------------------------------------

impl Encode for bool {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(u8::from(*self))?;
        Ok(())
    }
}

impl Decode<'_> for bool {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_u8()? != 0)
    }
}

impl Encode for u8 {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)?;
        Ok(())
    }
}

impl Decode<'_> for u8 {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_u8()?)
    }
}

impl Encode for i8 {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_i8(*self)?;
        Ok(())
    }
}

impl Decode<'_> for i8 {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_i8()?)
    }
}

impl Encode for i16 {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_i16::<BigEndian>(*self)?;
        Ok(())
    }
}

impl Decode<'_> for i16 {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_i16::<BigEndian>()?)
    }
}

impl Encode for u16 {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(*self)?;
        Ok(())
    }
}

impl Decode<'_> for u16 {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_u16::<BigEndian>()?)
    }
}

impl Encode for i32 {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_i32::<BigEndian>(*self)?;
        Ok(())
    }
}

impl Decode<'_> for i32 {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_i32::<BigEndian>()?)
    }
}

impl Encode for i64 {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_i64::<BigEndian>(*self)?;
        Ok(())
    }
}

impl Decode<'_> for i64 {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_i64::<BigEndian>()?)
    }
}

impl Encode for f32 {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_f32::<BigEndian>(*self)?;
        Ok(())
    }
}

impl Decode<'_> for f32 {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_f32::<BigEndian>()?)
    }
}

impl Encode for f64 {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_f64::<BigEndian>(*self)?;
        Ok(())
    }
}

impl Decode<'_> for f64 {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_f64::<BigEndian>()?)
    }
}

/// VarInt wrapper, for call sites that need the type distinguished from `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VarInt(pub i32);

impl Encode for VarInt {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_varint(writer, self.0)
    }
}

impl Decode<'_> for VarInt {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(VarInt(read_varint(reader)?))
    }
}

impl From<i32> for VarInt {
    fn from(v: i32) -> Self {
        VarInt(v)
    }
}

impl From<VarInt> for i32 {
    fn from(v: VarInt) -> Self {
        v.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VarLong(pub i64);

impl Encode for VarLong {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_varlong(writer, self.0)
    }
}

impl Decode<'_> for VarLong {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(VarLong(read_varlong(reader)?))
    }
}

// --- Strings -------------------------------------------------------------

impl Encode for str {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        let bytes = self.as_bytes();
        write_varint(writer, bytes.len() as i32)?;
        writer.write_all(bytes)?;
        Ok(())
    }
}

impl Encode for String {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.as_str().encode(writer)
    }
}

impl Decode<'_> for String {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let len = read_varint(reader)? as usize;
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

impl Encode for Cow<'_, str> {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.as_ref().encode(writer)
    }
}

/// `json` and `chat` both round-trip through a string-encoded `serde_json::Value`.
impl Encode for serde_json::Value {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        serde_json::to_string(self)?.encode(writer)
    }
}

impl Decode<'_> for serde_json::Value {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let s = String::decode(reader)?;
        Ok(serde_json::from_str(&s)?)
    }
}

// --- opt|T and repeated groups -------------------------------------------

impl<T: Encode> Encode for Option<T> {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Some(v) => {
                true.encode(writer)?;
                v.encode(writer)
            }
            None => false.encode(writer),
        }
    }
}

impl<'a, T: Decode<'a>> Decode<'a> for Option<T> {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        if bool::decode(reader)? {
            Ok(Some(T::decode(reader)?))
        } else {
            Ok(None)
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_varint(writer, self.len() as i32)?;
        for item in self {
            item.encode(writer)?;
        }
        Ok(())
    }
}

impl<'a, T: Decode<'a>> Decode<'a> for Vec<T> {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let len = read_varint(reader)? as usize;
        let mut vec = Vec::with_capacity(len);
        for _ in 0..len {
            vec.push(T::decode(reader)?);
        }
        Ok(vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Json = serde_json::Value;

    fn round_trip_varint(value: i32) {
        let mut bytes = Vec::new();
        write_varint(&mut bytes, value).unwrap();
        assert_eq!(read_varint(&mut &bytes[..]).unwrap(), value);
    }

    #[test]
    fn varint_boundary_values_round_trip() {
        for value in [0, 1, 127, 128, 16383, 16384, -1, i32::MIN, i32::MAX] {
            round_trip_varint(value);
        }
    }

    #[test]
    fn varint_six_continuation_bytes_fails() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert!(matches!(
            read_varint(&mut &bytes[..]),
            Err(ProtocolError::VarIntTooLarge)
        ));
    }

    #[test]
    fn varint_five_bytes_is_the_max_valid_length() {
        let mut bytes = Vec::new();
        write_varint(&mut bytes, -1).unwrap();
        assert_eq!(bytes.len(), 5);
        assert_eq!(read_varint(&mut &bytes[..]).unwrap(), -1);
    }

    #[test]
    fn primitive_round_trips() {
        macro_rules! check {
            ($v:expr) => {{
                let mut bytes = Vec::new();
                $v.encode(&mut bytes).unwrap();
                let decoded = Decode::decode(&mut &bytes[..]).unwrap();
                assert_eq!(decoded, $v);
            }};
        }
        check!(true);
        check!(false);
        check!(-1i8);
        check!(200u8);
        check!(-3000i16);
        check!(40000u16);
        check!(-100_000i32);
        check!(-5_000_000_000i64);
        check!(1.5f32);
        check!(-2.25f64);
    }

    #[test]
    fn string_round_trips_utf8() {
        let original = "héllo wörld".to_string();
        let mut bytes = Vec::new();
        original.encode(&mut bytes).unwrap();
        assert_eq!(String::decode(&mut &bytes[..]).unwrap(), original);
    }

    #[test]
    fn option_absent_encodes_only_the_false_byte() {
        let absent: Option<i32> = None;
        let mut bytes = Vec::new();
        absent.encode(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0]);
        assert_eq!(Option::<i32>::decode(&mut &bytes[..]).unwrap(), None);
    }

    #[test]
    fn option_present_round_trips() {
        let present = Some(42i32);
        let mut bytes = Vec::new();
        present.encode(&mut bytes).unwrap();
        assert_eq!(Option::<i32>::decode(&mut &bytes[..]).unwrap(), present);
    }

    #[test]
    fn vec_round_trips_with_varint_count_prefix() {
        let values = vec![1i32, 2, 3, 4];
        let mut bytes = Vec::new();
        values.encode(&mut bytes).unwrap();
        assert_eq!(bytes[0], 4); // count prefix
        assert_eq!(Vec::<i32>::decode(&mut &bytes[..]).unwrap(), values);
    }

    #[test]
    fn json_round_trips_through_canonicalised_string() {
        let value = serde_json::json!({"text": "hi"});
        let mut bytes = Vec::new();
        value.encode(&mut bytes).unwrap();
        assert_eq!(Json::decode(&mut &bytes[..]).unwrap(), value);
    }

    #[test]
    fn buffer_underrun_on_truncated_string() {
        // varint length says 5, but only 2 bytes follow
        let bytes = [5u8, b'h', b'i'];
        assert!(String::decode(&mut &bytes[..]).is_err());
    }
}
