//! Multipart messages over a blocking byte stream.
//!
//! Each frame is wrapped in a 5-byte envelope (see [`Envelope`]). This is
//! not the ZeroMQ wire protocol; bridge servers need
//! `ZmqTransport` (feature `zmq`).
//!
//! - Unix: TCP or Unix Domain Socket
//! - Windows: TCP
//!
//! # Example
//!
//! ```ignore
//! use karabo_bridge_client::transport::{StreamTransport, Transport};
//!
//! let mut transport = StreamTransport::connect("tcp://localhost:4545")?;
//! transport.send_frame(b"next")?;
//! let first = transport.receive_frame()?;
//! ```

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;

use super::envelope::{Envelope, DEFAULT_MAX_FRAME_SIZE};
use super::frame_buffer::FrameBuffer;
use super::{ReceivedFrame, Transport};
use crate::error::{BridgeError, Result};

/// Read chunk size for socket reads.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Parsed connection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `tcp://host:port`
    Tcp(String),
    /// `ipc:///path/to/socket`
    #[cfg(unix)]
    Ipc(std::path::PathBuf),
}

impl FromStr for Endpoint {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(addr) = s.strip_prefix("tcp://") {
            if addr.is_empty() {
                return Err(BridgeError::Config(format!("Missing address in endpoint '{}'", s)));
            }
            return Ok(Endpoint::Tcp(addr.to_string()));
        }

        #[cfg(unix)]
        {
            if let Some(path) = s.strip_prefix("ipc://") {
                if path.is_empty() {
                    return Err(BridgeError::Config(format!("Missing path in endpoint '{}'", s)));
                }
                return Ok(Endpoint::Ipc(path.into()));
            }
        }

        Err(BridgeError::Config(format!("Unsupported endpoint '{}'", s)))
    }
}

// ============================================================================
// Connection
// ============================================================================

/// A connected socket.
#[derive(Debug)]
pub enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Connection {
    /// Connect to an endpoint.
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str())?;
                stream.set_nodelay(true)?;
                Ok(Connection::Tcp(stream))
            }
            #[cfg(unix)]
            Endpoint::Ipc(path) => Ok(Connection::Unix(std::os::unix::net::UnixStream::connect(
                path,
            )?)),
        }
    }

    /// Set the socket read timeout (`None` blocks forever).
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match self {
            Connection::Tcp(stream) => stream.set_read_timeout(timeout)?,
            #[cfg(unix)]
            Connection::Unix(stream) => stream.set_read_timeout(timeout)?,
        }
        Ok(())
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Connection::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Connection::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Connection::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Connection::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Connection::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Connection::Unix(stream) => stream.flush(),
        }
    }
}

// ============================================================================
// StreamTransport
// ============================================================================

/// Envelope-framed multipart transport over a byte stream.
pub struct StreamTransport<S = Connection> {
    stream: S,
    buffer: FrameBuffer,
    /// Frames already parsed but not yet handed out.
    pending: VecDeque<ReceivedFrame>,
    read_buf: Vec<u8>,
}

impl StreamTransport<Connection> {
    /// Connect to `tcp://host:port` or `ipc://path`.
    pub fn connect(endpoint: &str) -> Result<Self> {
        Self::connect_with_max_frame_size(endpoint, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn connect_with_max_frame_size(endpoint: &str, max_frame_size: u32) -> Result<Self> {
        let parsed: Endpoint = endpoint.parse()?;
        tracing::debug!("Connecting to server: {}", endpoint);
        let connection = Connection::connect(&parsed)?;
        Ok(Self::with_max_frame_size(connection, max_frame_size))
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout)
    }
}

impl<S: Read + Write> StreamTransport<S> {
    /// Wrap an already connected stream.
    pub fn new(stream: S) -> Self {
        Self::with_max_frame_size(stream, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(stream: S, max_frame_size: u32) -> Self {
        Self {
            stream,
            buffer: FrameBuffer::with_max_frame_size(max_frame_size),
            pending: VecDeque::new(),
            read_buf: vec![0u8; READ_CHUNK_SIZE],
        }
    }

    /// Send a multipart message; all frames but the last carry MORE.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Usage`] for an empty message, or an I/O error.
    pub fn send_multipart<B: AsRef<[u8]>>(&mut self, frames: &[B]) -> Result<()> {
        if frames.is_empty() {
            return Err(BridgeError::Usage("a message needs at least one frame"));
        }
        let last = frames.len() - 1;
        for (i, frame) in frames.iter().enumerate() {
            self.write_frame(frame.as_ref(), i != last)?;
        }
        self.stream.flush()?;
        Ok(())
    }

    /// Receive all frames of the next message.
    pub fn receive_message(&mut self) -> Result<Vec<Bytes>> {
        let mut frames = Vec::new();
        loop {
            let frame = self.receive_frame()?;
            frames.push(frame.data);
            if !frame.more {
                return Ok(frames);
            }
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn write_frame(&mut self, frame: &[u8], more: bool) -> Result<()> {
        let length = u32::try_from(frame.len()).map_err(|_| {
            BridgeError::Framing(format!("Frame of {} bytes is too large to send", frame.len()))
        })?;
        self.stream.write_all(&Envelope::new(more, length).encode())?;
        self.stream.write_all(frame)?;
        Ok(())
    }
}

impl<S: Read + Write> Transport for StreamTransport<S> {
    fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.write_frame(frame, false)?;
        self.stream.flush()?;
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<ReceivedFrame> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(frame);
            }

            let n = match self.stream.read(&mut self.read_buf) {
                Ok(0) => return Err(BridgeError::ConnectionClosed),
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(BridgeError::Io(e)),
            };
            self.pending.extend(self.buffer.push(&self.read_buf[..n])?);
        }
    }
}
