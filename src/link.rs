//! Link session with the surface station.
//!
//! Owns the listening socket, the single bound peer connection, and the
//! framing buffers. Every operation is non-blocking so the control loop
//! can never be stalled by a silent or slow peer: `try_receive` polls,
//! `send` buffers and flushes opportunistically, and `poll_accept`
//! drains pending connection attempts.
//!
//! Frames are length-prefixed (`u32` big-endian, counting the message
//! body that follows). A peer that claims a frame larger than the
//! protocol maximum, or that lets the outbound backlog grow past its
//! cap, has violated the framing contract and is dropped.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::protocol::MAX_MESSAGE_LEN;

const FRAME_HEADER_LEN: usize = 4;
/// Inbound reassembly cap: a little over two maximum frames.
const MAX_RX_BUFFER: usize = 2 * (FRAME_HEADER_LEN + MAX_MESSAGE_LEN) + 64;
/// Outbound backlog cap before a non-draining peer is dropped.
const MAX_TX_BUFFER: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkState {
    /// No transport bound.
    Disconnected,
    /// Transport open, inbound traffic within the watchdog deadline.
    Connected,
    /// Transport open but no valid inbound message within the deadline.
    Stale,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LinkStats {
    pub frames_rx: u32,
    pub frames_tx: u32,
    pub decode_errors: u32,
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no surface station bound")]
    NotConnected,
    #[error("a surface station is already bound")]
    AlreadyBound,
    #[error("frame of {0} bytes exceeds the protocol maximum")]
    FrameTooLarge(usize),
    #[error("outbound backlog exceeded")]
    SendBacklog,
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
struct Peer {
    stream: TcpStream,
    addr: SocketAddr,
    rx_buf: Vec<u8>,
    tx_buf: Vec<u8>,
}

#[derive(Debug)]
pub struct LinkSession {
    listener: TcpListener,
    local_port: u16,
    state: LinkState,
    peer: Option<Peer>,
    stats: LinkStats,
}

impl LinkSession {
    /// Bind the listening socket. Port 0 picks an ephemeral port (used
    /// by tests); see [`LinkSession::local_port`].
    pub fn bind(port: u16) -> Result<Self, LinkError> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        let local_port = listener.local_addr()?.port();
        Ok(Self {
            listener,
            local_port,
            state: LinkState::Disconnected,
            peer: None,
            stats: LinkStats::default(),
        })
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn note_decode_error(&mut self) {
        self.stats.decode_errors = self.stats.decode_errors.saturating_add(1);
    }

    /// Accept a pending connection attempt, if any. Exactly one peer may
    /// be bound at a time: a second attempt while one is active is
    /// rejected with [`LinkError::AlreadyBound`] and its socket closed.
    ///
    /// Returns `Ok(true)` when a new peer was bound this call.
    pub fn poll_accept(&mut self) -> Result<bool, LinkError> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                if self.peer.is_some() {
                    warn!(%addr, "rejecting connection attempt, a surface station is already bound");
                    drop(stream);
                    return Err(LinkError::AlreadyBound);
                }
                stream.set_nonblocking(true)?;
                stream.set_nodelay(true).ok();
                info!(%addr, "surface station connected");
                self.peer = Some(Peer {
                    stream,
                    addr,
                    rx_buf: Vec::new(),
                    tx_buf: Vec::new(),
                });
                self.state = LinkState::Connected;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => {
                error!(error = %e, "accept failed");
                Err(LinkError::Io(e))
            }
        }
    }

    /// Queue one framed message for the bound peer and flush as much of
    /// the backlog as the socket will take without blocking.
    pub fn send(&mut self, body: &[u8]) -> Result<(), LinkError> {
        if body.len() > MAX_MESSAGE_LEN {
            return Err(LinkError::FrameTooLarge(body.len()));
        }
        let peer = self.peer.as_mut().ok_or(LinkError::NotConnected)?;
        if peer.tx_buf.len() + FRAME_HEADER_LEN + body.len() > MAX_TX_BUFFER {
            warn!(addr = %peer.addr, "peer not draining, dropping connection");
            self.drop_peer();
            return Err(LinkError::SendBacklog);
        }
        peer.tx_buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
        peer.tx_buf.extend_from_slice(body);
        self.stats.frames_tx = self.stats.frames_tx.saturating_add(1);
        self.flush()
    }

    fn flush(&mut self) -> Result<(), LinkError> {
        let peer = match self.peer.as_mut() {
            Some(peer) => peer,
            None => return Ok(()),
        };
        while !peer.tx_buf.is_empty() {
            match peer.stream.write(&peer.tx_buf) {
                Ok(0) => {
                    self.drop_peer();
                    return Err(LinkError::NotConnected);
                }
                Ok(n) => {
                    peer.tx_buf.drain(..n);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(addr = %peer.addr, error = %e, "write failed, dropping connection");
                    self.drop_peer();
                    return Err(LinkError::Io(e));
                }
            }
        }
        Ok(())
    }

    /// Return one complete inbound frame body, if available, without
    /// blocking. `Ok(None)` means no complete frame yet (or no peer).
    ///
    /// An oversized length prefix tears the connection down: a peer
    /// violating the framing contract cannot be trusted.
    pub fn try_receive(&mut self) -> Result<Option<Vec<u8>>, LinkError> {
        if self.peer.is_none() {
            return Ok(None);
        }

        if let Some(body) = self.pop_frame()? {
            return Ok(Some(body));
        }

        let peer = match self.peer.as_mut() {
            Some(peer) => peer,
            None => return Ok(None),
        };
        let mut chunk = [0u8; 4096];
        match peer.stream.read(&mut chunk) {
            Ok(0) => {
                info!(addr = %peer.addr, "surface station disconnected");
                self.drop_peer();
                return Ok(None);
            }
            Ok(n) => {
                peer.rx_buf.extend_from_slice(&chunk[..n]);
                if peer.rx_buf.len() > MAX_RX_BUFFER {
                    let len = peer.rx_buf.len();
                    warn!(addr = %peer.addr, len, "inbound buffer overrun, dropping connection");
                    self.drop_peer();
                    return Err(LinkError::FrameTooLarge(len));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!(addr = %peer.addr, error = %e, "read failed, dropping connection");
                self.drop_peer();
                return Err(LinkError::Io(e));
            }
        }

        self.pop_frame()
    }

    fn pop_frame(&mut self) -> Result<Option<Vec<u8>>, LinkError> {
        let peer = match self.peer.as_mut() {
            Some(peer) => peer,
            None => return Ok(None),
        };
        if peer.rx_buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        let mut header = [0u8; FRAME_HEADER_LEN];
        header.copy_from_slice(&peer.rx_buf[..FRAME_HEADER_LEN]);
        let frame_len = u32::from_be_bytes(header) as usize;
        if frame_len > MAX_MESSAGE_LEN {
            warn!(addr = %peer.addr, frame_len, "oversized frame, dropping connection");
            self.drop_peer();
            return Err(LinkError::FrameTooLarge(frame_len));
        }
        if peer.rx_buf.len() < FRAME_HEADER_LEN + frame_len {
            return Ok(None);
        }
        let body = peer.rx_buf[FRAME_HEADER_LEN..FRAME_HEADER_LEN + frame_len].to_vec();
        peer.rx_buf.drain(..FRAME_HEADER_LEN + frame_len);
        self.stats.frames_rx = self.stats.frames_rx.saturating_add(1);
        Ok(Some(body))
    }

    /// Watchdog expiry: transport still open but the peer has gone
    /// quiet. Only meaningful from `Connected`.
    pub fn mark_stale(&mut self) {
        if self.state == LinkState::Connected {
            warn!("no valid inbound traffic within watchdog deadline, link stale");
            self.state = LinkState::Stale;
        }
    }

    /// A valid inbound message arrived; a stale link is healthy again.
    /// Returns true when this call restored the link from `Stale`.
    pub fn mark_fresh(&mut self) -> bool {
        if self.state == LinkState::Stale {
            info!("inbound traffic resumed, link healthy");
            self.state = LinkState::Connected;
            return true;
        }
        false
    }

    pub fn disconnect(&mut self) {
        self.drop_peer();
    }

    fn drop_peer(&mut self) {
        self.peer = None;
        self.state = LinkState::Disconnected;
    }
}
