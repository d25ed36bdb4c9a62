//! Transport module - moving opaque frames between client and server.
//!
//! The session only needs the [`Transport`] contract: send one frame, and
//! receive frames one by one together with a "more frames pending" signal.
//! Two implementations are provided:
//! - [`ZmqTransport`] (feature `zmq`): a ZeroMQ REQ socket, as spoken by
//!   bridge servers
//! - [`StreamTransport`]: a length-prefixed envelope over TCP
//!   (`tcp://host:port`) or Unix Domain Sockets (`ipc:///path/to/socket`,
//!   Unix only), for loopback tests and relays that speak it. It is not
//!   wire compatible with ZeroMQ.

mod envelope;
mod frame_buffer;
#[cfg(feature = "zmq")]
mod req;
mod stream;

use bytes::Bytes;

use crate::error::Result;

pub use envelope::{flags, Envelope, DEFAULT_MAX_FRAME_SIZE, ENVELOPE_SIZE};
pub use frame_buffer::FrameBuffer;
#[cfg(feature = "zmq")]
pub use req::ZmqTransport;
pub use stream::{Connection, Endpoint, StreamTransport};

/// One frame as delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    /// Frame bytes.
    pub data: Bytes,
    /// More frames of the same message follow.
    pub more: bool,
}

/// Frame-oriented, blocking request/reply transport.
pub trait Transport {
    /// Send a single-frame message.
    fn send_frame(&mut self, frame: &[u8]) -> Result<()>;

    /// Block until the next frame arrives.
    fn receive_frame(&mut self) -> Result<ReceivedFrame>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        (**self).send_frame(frame)
    }

    fn receive_frame(&mut self) -> Result<ReceivedFrame> {
        (**self).receive_frame()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        (**self).send_frame(frame)
    }

    fn receive_frame(&mut self) -> Result<ReceivedFrame> {
        (**self).receive_frame()
    }
}
