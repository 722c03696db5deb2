//! Length-prefix framing and the legacy 1.6 server-list-ping escape hatch.
//! The compression envelope lives one layer up, inside [`crate::packet`].

use tokio::io::{AsyncRead, AsyncReadExt};

use mc_protocol::{Direction, Phase, ProtocolError};

use crate::error::Result;

pub async fn read_varint_async<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32> {
    let mut result = 0i32;
    let mut shift = 0;
    loop {
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf).await?;
        let byte = buf[0];
        result |= i32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 32 {
            return Err(ProtocolError::VarIntTooLarge.into());
        }
    }
    Ok(result)
}

/// Reads one frame as `<Length: VarInt><Payload>`. Returns `Ok(None)` when
/// the legacy-ping escape hatch fired: a client→server frame at handshake
/// phase whose decoded length happens to be exactly 254 is not a modern
/// packet at all (its first two length bytes are the legacy ping's `0xFE
/// 0x01` preamble) — the rest is read and discarded here, and nothing is
/// handed to the pipeline.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    direction: Direction,
    phase: Phase,
) -> Result<Option<(i32, Vec<u8>)>> {
    let length = read_varint_async(reader).await?;

    if direction == Direction::Serverbound && phase == Phase::Handshake && length == 254 {
        discard_legacy_ping(reader).await?;
        return Ok(None);
    }

    let mut payload = vec![0u8; length.max(0) as usize];
    reader.read_exact(&mut payload).await?;
    Ok(Some((length, payload)))
}

async fn discard_legacy_ping<R: AsyncRead + Unpin>(reader: &mut R) -> Result<()> {
    let mut marker = [0u8; 1];
    reader.read_exact(&mut marker).await?; // 0xFA

    let mut len_buf = [0u8; 2];
    reader.read_exact(&mut len_buf).await?;
    let str_len = u16::from_be_bytes(len_buf) as usize;

    let mut rest = vec![0u8; str_len * 2 + 2];
    reader.read_exact(&mut rest).await?;
    let rest_len = u16::from_be_bytes([rest[rest.len() - 2], rest[rest.len() - 1]]) as usize;

    let mut tail = vec![0u8; rest_len];
    reader.read_exact(&mut tail).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_protocol::write_varint;

    #[tokio::test]
    async fn reads_a_plain_frame() {
        let mut bytes = Vec::new();
        write_varint(&mut bytes, 3).unwrap();
        bytes.extend_from_slice(&[1, 2, 3]);
        let mut cursor = &bytes[..];
        let (length, payload) = read_frame(&mut cursor, Direction::Serverbound, Phase::Play)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(length, 3);
        assert_eq!(payload, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn legacy_ping_is_discarded_at_handshake() {
        // 0xFE, 0x01 decode as a length-varint of 254; 0xFA starts the
        // legacy ping body; a zero-length string and zero rest-length follow.
        let mut bytes = vec![0xFE, 0x01, 0xFA, 0x00, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(b"trailing-packet-untouched");
        let mut cursor = &bytes[..];
        let result = read_frame(&mut cursor, Direction::Serverbound, Phase::Handshake)
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(cursor, b"trailing-packet-untouched");
    }
}
