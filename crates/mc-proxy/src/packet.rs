//! The packet object: a dual-view (raw wire / decoded) carrier that
//! handlers mutate in place and that may grow child packets along the way.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::warn;

use mc_protocol::{read_varint, write_varint, Buffer, Direction};

use crate::error::Result;

#[derive(Debug, Clone)]
pub enum PacketBody {
    /// As it arrived off the wire: outer length plus an opaque payload —
    /// the compression envelope, if any, is still unparsed.
    Raw { length: i32, payload: Buffer },
    /// Promoted by [`Packet::unpack`] (or synthesised directly): packet id
    /// plus the remaining body buffer.
    Decoded { id: i32, body: Buffer },
}

/// One packet moving through the pipeline. `send_self` toggled off by
/// [`Packet::drop_packet`] still emits `children` — only this packet's own
/// bytes are suppressed.
#[derive(Debug, Clone)]
pub struct Packet {
    pub direction: Direction,
    pub body: PacketBody,
    pub with_compression: bool,
    pub is_compressed: bool,
    pub uncompressed_load_length: i32,
    pub send_self: bool,
    pub children: Vec<Packet>,
}

impl Packet {
    #[must_use]
    pub fn from_frame(direction: Direction, length: i32, payload: Vec<u8>) -> Self {
        Packet {
            direction,
            body: PacketBody::Raw {
                length,
                payload: Buffer::new(payload),
            },
            with_compression: false,
            is_compressed: false,
            uncompressed_load_length: 0,
            send_self: true,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn synthesize(direction: Direction, id: i32, body: Buffer) -> Self {
        Packet {
            direction,
            body: PacketBody::Decoded { id, body },
            with_compression: false,
            is_compressed: false,
            uncompressed_load_length: 0,
            send_self: true,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<i32> {
        match &self.body {
            PacketBody::Decoded { id, .. } => Some(*id),
            PacketBody::Raw { .. } => None,
        }
    }

    #[must_use]
    pub fn matches(&self, direction: Direction, id: i32) -> bool {
        self.direction == direction && self.id() == Some(id)
    }

    #[must_use]
    pub fn body_buffer(&self) -> Option<Buffer> {
        match &self.body {
            PacketBody::Decoded { body, .. } => Some(body.copy()),
            PacketBody::Raw { .. } => None,
        }
    }

    pub fn set_body(&mut self, body: Buffer) {
        if let PacketBody::Decoded { body: slot, .. } = &mut self.body {
            *slot = body;
        }
    }

    pub fn drop_packet(&mut self) {
        self.send_self = false;
    }

    pub fn pickup_packet(&mut self) {
        self.send_self = true;
    }

    pub fn add_child_packet(&mut self, child: Packet) {
        self.children.push(child);
    }

    /// Promotes a raw wire packet to a decoded one: parses the compression
    /// envelope (if `with_compression`) and the leading packet id.
    pub fn unpack(&mut self, with_compression: bool) -> Result<()> {
        self.with_compression = with_compression;
        let mut buf = match &self.body {
            PacketBody::Raw { payload, .. } => payload.copy(),
            PacketBody::Decoded { .. } => return Ok(()),
        };

        if with_compression {
            let uncompressed_length = read_varint(&mut buf)?;
            self.uncompressed_load_length = uncompressed_length;
            if uncompressed_length == 0 {
                self.is_compressed = false;
            } else {
                self.is_compressed = true;
                if let Err(err) = buf.decompress(uncompressed_length as usize) {
                    warn!("decompression failed, treating payload as uncompressed: {err}");
                    self.is_compressed = false;
                }
            }
        }

        let id = read_varint(&mut buf)?;
        self.body = PacketBody::Decoded { id, body: buf };
        Ok(())
    }

    /// Packs this packet (if `send_self`) and its children, recursing into
    /// same-direction children so their bytes land inline; opposite-direction
    /// children are handed back un-packed for the caller to route onto the
    /// other direction's queue.
    pub fn pack(&self, compression_threshold: i32) -> Result<(Vec<u8>, Vec<Packet>)> {
        let mut my_bytes = if self.send_self {
            self.encode_self(compression_threshold)?
        } else {
            Vec::new()
        };

        let mut other_children = Vec::new();
        for child in &self.children {
            if child.direction == self.direction {
                let (child_bytes, child_others) = child.pack(compression_threshold)?;
                my_bytes.extend(child_bytes);
                other_children.extend(child_others);
            } else {
                other_children.push(child.clone());
            }
        }

        Ok((my_bytes, other_children))
    }

    fn encode_self(&self, compression_threshold: i32) -> Result<Vec<u8>> {
        let frame_payload = match &self.body {
            PacketBody::Raw { payload, .. } => payload.to_bytes(),
            PacketBody::Decoded { id, body } => {
                let mut inner = Vec::new();
                write_varint(&mut inner, *id)?;
                inner.extend(body.to_bytes());
                envelope(&inner, compression_threshold)?
            }
        };

        let mut out = Vec::new();
        write_varint(&mut out, frame_payload.len() as i32)?;
        out.extend(frame_payload);
        Ok(out)
    }
}

/// `<UncompressedLength: VarInt><Data>`, compressed iff the body is at
/// least `compression_threshold` bytes and compression is enabled.
fn envelope(body: &[u8], compression_threshold: i32) -> Result<Vec<u8>> {
    if compression_threshold <= 0 {
        return Ok(body.to_vec());
    }

    let mut out = Vec::new();
    if body.len() >= compression_threshold as usize {
        write_varint(&mut out, body.len() as i32)?;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body)?;
        out.extend(encoder.finish()?);
    } else {
        write_varint(&mut out, 0)?;
        out.extend_from_slice(body);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_parent_still_emits_children() {
        let mut parent = Packet::synthesize(Direction::Serverbound, 1, Buffer::new(vec![]));
        parent.drop_packet();
        parent.add_child_packet(Packet::synthesize(
            Direction::Serverbound,
            2,
            Buffer::new(vec![9]),
        ));

        let (bytes, others) = parent.pack(0).unwrap();
        assert!(others.is_empty());
        // only the child's frame should be present
        assert_eq!(bytes, vec![2, 2, 9]);
    }

    #[test]
    fn opposite_direction_children_are_routed_unpacked() {
        let mut parent = Packet::synthesize(Direction::Serverbound, 1, Buffer::new(vec![7]));
        parent.add_child_packet(Packet::synthesize(
            Direction::Clientbound,
            0x50,
            Buffer::new(vec![]),
        ));

        let (bytes, others) = parent.pack(0).unwrap();
        assert_eq!(bytes, vec![2, 1, 7]);
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].id(), Some(0x50));
    }

    #[test]
    fn compression_envelope_picks_compressed_form_at_threshold() {
        let body = vec![0u8; 256];
        let envelope_bytes = envelope(&body, 256).unwrap();
        // a zero uncompressed-length prefix would mean "not compressed"
        assert_ne!(envelope_bytes[0], 0);

        let small_body = vec![0u8; 255];
        let small_envelope = envelope(&small_body, 256).unwrap();
        assert_eq!(small_envelope[0], 0);
    }
}
