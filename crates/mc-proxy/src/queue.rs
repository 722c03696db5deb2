//! The packet queue: one `mpsc` channel standing in for the lock+condvar
//! pair the original pipeline drains with `new_packet.wait()` then
//! `pop_all()`. `recv_batch` mirrors that exactly — block for the first
//! item, then drain whatever else has piled up without blocking again.

use tokio::sync::mpsc;

use mc_protocol::Direction;

use crate::packet::Packet;

/// Everything that can ride the queue besides a packet in transit.
#[derive(Debug)]
pub enum ControlMessage {
    Packet(Packet),
    /// Mirrors `StopMessage`: once popped, the drain loop stops for good.
    Stop,
    /// A preference changed; the resolver in `handlers` turns this into
    /// zero or more synthesized packets headed the same direction.
    PreferenceUpdate(String),
}

#[derive(Clone)]
pub struct PacketQueueSender {
    tx: mpsc::UnboundedSender<ControlMessage>,
}

impl PacketQueueSender {
    pub fn send(&self, message: ControlMessage) {
        // the receiver outliving every sender is the only way this fails,
        // which only happens once the connection is already torn down
        let _ = self.tx.send(message);
    }

    pub fn send_packet(&self, packet: Packet) {
        self.send(ControlMessage::Packet(packet));
    }

    pub fn send_stop(&self) {
        self.send(ControlMessage::Stop);
    }
}

pub struct PacketQueueReceiver {
    rx: mpsc::UnboundedReceiver<ControlMessage>,
}

impl PacketQueueReceiver {
    /// Waits for the first message, then drains everything else already
    /// queued without waiting again — the async analogue of
    /// `new_packet.wait()` followed by `pop_all()`.
    pub async fn recv_batch(&mut self) -> Option<Vec<ControlMessage>> {
        let first = self.rx.recv().await?;
        let mut batch = vec![first];
        while let Ok(message) = self.rx.try_recv() {
            batch.push(message);
        }
        Some(batch)
    }
}

#[must_use]
pub fn packet_queue() -> (PacketQueueSender, PacketQueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PacketQueueSender { tx }, PacketQueueReceiver { rx })
}

/// Packs every `Packet` in `batch` whose direction is `priority_direction`,
/// concatenating their frames; packets of the opposite direction are
/// returned unpacked for the caller to hand to that direction's sender.
/// A `Stop` anywhere in the batch sets the returned stop flag.
#[must_use]
pub fn pack_all(
    batch: Vec<ControlMessage>,
    priority_direction: Direction,
    compression_threshold: i32,
) -> crate::error::Result<(Vec<u8>, Vec<Packet>, bool)> {
    let mut send_data = Vec::new();
    let mut other_packets = Vec::new();
    let mut stop_flag = false;

    for message in batch {
        match message {
            ControlMessage::Packet(packet) => {
                if packet.direction == priority_direction {
                    let (bytes, others) = packet.pack(compression_threshold)?;
                    send_data.extend(bytes);
                    other_packets.extend(others);
                } else {
                    other_packets.push(packet);
                }
            }
            ControlMessage::Stop => stop_flag = true,
            ControlMessage::PreferenceUpdate(_) => {
                // resolved upstream in the process loop before reaching
                // the send queue; nothing to pack here
            }
        }
    }

    Ok((send_data, other_packets, stop_flag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_protocol::Buffer;

    #[tokio::test]
    async fn recv_batch_waits_then_drains() {
        let (tx, mut rx) = packet_queue();
        tx.send_packet(Packet::synthesize(
            Direction::Clientbound,
            1,
            Buffer::new(vec![]),
        ));
        tx.send_packet(Packet::synthesize(
            Direction::Clientbound,
            2,
            Buffer::new(vec![]),
        ));

        let batch = rx.recv_batch().await.unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[tokio::test]
    async fn stop_message_surfaces_in_pack_all() {
        let (tx, mut rx) = packet_queue();
        tx.send_stop();
        let batch = rx.recv_batch().await.unwrap();
        let (_, _, stop_flag) = pack_all(batch, Direction::Serverbound, 0).unwrap();
        assert!(stop_flag);
    }

    #[test]
    fn pack_all_routes_opposite_direction_untouched() {
        let batch = vec![ControlMessage::Packet(Packet::synthesize(
            Direction::Clientbound,
            5,
            Buffer::new(vec![]),
        ))];
        let (bytes, others, stop_flag) =
            pack_all(batch, Direction::Serverbound, 0).unwrap();
        assert!(bytes.is_empty());
        assert_eq!(others.len(), 1);
        assert!(!stop_flag);
    }
}
