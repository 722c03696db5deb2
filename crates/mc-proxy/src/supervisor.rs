//! Dials the upstream server, then accepts one client, wires a `Forwarder`
//! pair around a shared [`Session`], and tears both down when either side
//! signals shutdown. Mirrors the original `Proxy.run`'s dial-then-bind-
//! then-accept ordering, restarting per connection the way `start_proxy`'s
//! `while gui_obj.run_proxy` loop did.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use mc_protocol::Direction;

use crate::config::Preferences;
use crate::error::Result;
use crate::forwarder;
use crate::queue::packet_queue;
use crate::session::Session;
use crate::status::{StatusCode, StatusSink};

pub struct Supervisor {
    pub bind_addr: SocketAddr,
    pub server_addr: SocketAddr,
    pub preferences: Preferences,
    pub status: Arc<dyn StatusSink>,
}

impl Supervisor {
    #[must_use]
    pub fn new(
        bind_addr: SocketAddr,
        server_addr: SocketAddr,
        preferences: Preferences,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Supervisor {
            bind_addr,
            server_addr,
            preferences,
            status,
        }
    }

    /// Runs the dial-then-accept loop until the listener itself errors out
    /// (the process is expected to be interrupted from outside, e.g.
    /// Ctrl+C). Each iteration dials the upstream server *before* binding
    /// and accepting a client, matching `Proxy.run`'s ordering: a
    /// `ServerUnreachable` status is only ever observed before a client has
    /// been accepted, never after.
    pub async fn run(&self) -> Result<()> {
        loop {
            self.status.set_status(StatusCode::NotRunning);
            let server_socket = match TcpStream::connect(self.server_addr).await {
                Ok(socket) => socket,
                Err(err) => {
                    warn!(%err, server = %self.server_addr, "could not reach upstream server");
                    self.status.set_status(StatusCode::ServerUnreachable);
                    continue;
                }
            };

            let listener = TcpListener::bind(self.bind_addr).await?;
            self.status.set_status(StatusCode::AwaitingClient);
            let (client_socket, client_addr) = listener.accept().await?;
            info!(%client_addr, "client connected");

            if let Err(err) = self.serve_one(client_socket, server_socket).await {
                warn!(%err, "connection ended with an error");
            }
        }
    }

    async fn serve_one(&self, client_socket: TcpStream, server_socket: TcpStream) -> Result<()> {
        let session = Session::with_status(self.preferences.clone(), self.status.clone());

        let (client_reader, client_writer) = client_socket.into_split();
        let (server_reader, server_writer) = server_socket.into_split();

        let (c2s_out_tx, c2s_out_rx) = packet_queue();
        let (s2c_out_tx, s2c_out_rx) = packet_queue();

        let c2s = forwarder::spawn(
            Direction::Serverbound,
            client_reader,
            server_writer,
            session.clone(),
            c2s_out_rx,
            c2s_out_tx.clone(),
            s2c_out_tx.clone(),
        );
        let s2c = forwarder::spawn(
            Direction::Clientbound,
            server_reader,
            client_writer,
            session.clone(),
            s2c_out_rx,
            s2c_out_tx,
            c2s_out_tx,
        );

        session.shutdown.notified().await;
        c2s.abort_all();
        s2c.abort_all();
        info!("connection torn down");
        Ok(())
    }
}
