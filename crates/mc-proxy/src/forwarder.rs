//! One direction's three tasks — receive, process, send — mirroring the
//! original `Forward`/`Process`/`send` thread trio, but as tokio tasks over
//! a split socket half instead of OS threads over a raw fd.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use mc_protocol::Direction;

use crate::frame::read_frame;
use crate::handlers;
use crate::packet::Packet;
use crate::queue::{pack_all, packet_queue, ControlMessage, PacketQueueReceiver, PacketQueueSender};
use crate::session::Session;

pub struct DirectionHandles {
    pub receive: JoinHandle<()>,
    pub process: JoinHandle<()>,
    pub send: JoinHandle<()>,
}

impl DirectionHandles {
    pub fn abort_all(&self) {
        self.receive.abort();
        self.process.abort();
        self.send.abort();
    }
}

/// Spawns the receive/process/send trio for one direction.
///
/// `own_out_tx`/`own_out_rx` are this direction's send queue (process
/// pushes, send drains); `other_out_tx` is where cross-direction child
/// packets and preference-update packets get routed, matching the
/// original's `other_send_queue`.
pub fn spawn<R, W>(
    direction: Direction,
    reader: R,
    writer: W,
    session: Arc<Session>,
    own_out_rx: PacketQueueReceiver,
    own_out_tx: PacketQueueSender,
    other_out_tx: PacketQueueSender,
) -> DirectionHandles
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (in_tx, in_rx) = packet_queue();

    let receive = tokio::spawn(receive_loop(direction, reader, session.clone(), in_tx));
    let process = tokio::spawn(process_loop(in_rx, own_out_tx, session.clone()));
    let send = tokio::spawn(send_loop(direction, own_out_rx, other_out_tx, writer, session));

    DirectionHandles { receive, process, send }
}

async fn receive_loop<R>(
    direction: Direction,
    mut reader: R,
    session: Arc<Session>,
    in_tx: PacketQueueSender,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    loop {
        let phase = session.phase();
        match read_frame(&mut reader, direction, phase).await {
            Ok(Some((length, payload))) => {
                in_tx.send_packet(Packet::from_frame(direction, length, payload));
            }
            Ok(None) => {}
            Err(err) => {
                debug!(?direction, %err, "receive side closed");
                in_tx.send_stop();
                session.request_shutdown();
                break;
            }
        }
    }
}

async fn process_loop(
    mut in_rx: PacketQueueReceiver,
    own_out_tx: PacketQueueSender,
    session: Arc<Session>,
) {
    loop {
        let Some(batch) = in_rx.recv_batch().await else {
            break;
        };
        let mut stop = false;
        for message in batch {
            match message {
                ControlMessage::Packet(mut packet) => {
                    let with_compression = session.compression_enabled();
                    if let Err(err) = packet.unpack(with_compression) {
                        warn!(%err, "failed to unpack packet");
                        continue;
                    }
                    if let Err(err) = handlers::dispatch(&mut packet, &session) {
                        warn!(%err, "handler failed");
                    }
                    own_out_tx.send_packet(packet);
                }
                ControlMessage::Stop => stop = true,
                ControlMessage::PreferenceUpdate(name) => {
                    match handlers::resolve_preference_update(&name, &session) {
                        Ok(children) => {
                            for child in children {
                                own_out_tx.send_packet(child);
                            }
                        }
                        Err(err) => warn!(%err, "preference resolver failed"),
                    }
                }
            }
        }
        if stop {
            own_out_tx.send_stop();
            break;
        }
    }
}

async fn send_loop<W>(
    direction: Direction,
    mut own_out_rx: PacketQueueReceiver,
    other_out_tx: PacketQueueSender,
    mut writer: W,
    session: Arc<Session>,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    loop {
        let Some(batch) = own_out_rx.recv_batch().await else {
            break;
        };
        let compression_threshold = session.compression_threshold();
        let (bytes, other_packets, stop_flag) = match pack_all(batch, direction, compression_threshold) {
            Ok(result) => result,
            Err(err) => {
                error!(?direction, %err, "failed to pack outgoing batch");
                continue;
            }
        };

        if !bytes.is_empty() {
            if let Err(err) = writer.write_all(&bytes).await {
                debug!(?direction, %err, "send side closed");
                session.request_shutdown();
                break;
            }
        }
        for packet in other_packets {
            other_out_tx.send_packet(packet);
        }
        if stop_flag {
            break;
        }
    }
    let _ = writer.shutdown().await;
}
