//! `uuid` wire type.
//!
//! The protocol's `uuid` tag is two consecutive doubles; this crate never
//! interprets the contents, only carries them between decode and encode.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::{Decode, Encode, Result};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Uuid(pub f64, pub f64);

impl Encode for Uuid {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.0.encode(writer)?;
        self.1.encode(writer)
    }
}

impl Decode<'_> for Uuid {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Uuid(f64::decode(reader)?, f64::decode(reader)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_without_interpreting_contents() {
        let original = Uuid(1.5, -3.25);
        let mut bytes = Vec::new();
        original.encode(&mut bytes).unwrap();
        assert_eq!(Uuid::decode(&mut &bytes[..]).unwrap(), original);
    }
}
