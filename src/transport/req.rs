//! ZeroMQ REQ socket transport.
//!
//! Bridge servers bind a ZeroMQ REP socket; this is the transport to use
//! against them. Multipart replies arrive one message part at a time, with
//! `ZMQ_RCVMORE` marking all but the last.
//!
//! # Example
//!
//! ```ignore
//! use karabo_bridge_client::transport::ZmqTransport;
//! use karabo_bridge_client::Client;
//!
//! let mut client = Client::new(ZmqTransport::connect("tcp://localhost:4545")?);
//! let reply = client.next_reply()?;
//! ```

use std::time::Duration;

use bytes::Bytes;

use super::{ReceivedFrame, Transport};
use crate::error::Result;

/// A connected ZeroMQ REQ socket.
///
/// A REQ socket enforces strict send/receive alternation. After a receive
/// timeout the socket cannot send again; reconnect instead.
pub struct ZmqTransport {
    socket: zmq::Socket,
    _context: zmq::Context,
}

impl ZmqTransport {
    /// Connect a REQ socket to a `tcp://` or `ipc://` endpoint.
    pub fn connect(endpoint: &str) -> Result<Self> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::REQ)?;
        socket.set_linger(0)?;
        tracing::debug!("Connecting REQ socket to {}", endpoint);
        socket.connect(endpoint)?;
        Ok(Self {
            socket,
            _context: context,
        })
    }

    /// Set the receive timeout (`None` blocks forever).
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let millis = match timeout {
            None => -1,
            Some(t) => i32::try_from(t.as_millis()).unwrap_or(i32::MAX).max(1),
        };
        self.socket.set_rcvtimeo(millis)?;
        Ok(())
    }

    /// Refuse message parts larger than `limit` bytes.
    pub fn set_max_frame_size(&self, limit: u32) -> Result<()> {
        self.socket.set_maxmsgsize(i64::from(limit))?;
        Ok(())
    }
}

impl Transport for ZmqTransport {
    fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.socket.send(frame, 0)?;
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<ReceivedFrame> {
        let data = self.socket.recv_bytes(0)?;
        let more = self.socket.get_rcvmore()?;
        Ok(ReceivedFrame {
            data: Bytes::from(data),
            more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Client;
    use std::thread;

    fn rep_socket() -> (zmq::Context, zmq::Socket, String) {
        let context = zmq::Context::new();
        let rep = context.socket(zmq::REP).unwrap();
        rep.bind("tcp://127.0.0.1:*").unwrap();
        let endpoint = rep.get_last_endpoint().unwrap().unwrap();
        (context, rep, endpoint)
    }

    #[test]
    fn test_request_against_rep_socket() {
        let (_context, rep, endpoint) = rep_socket();
        let server = thread::spawn(move || {
            let request = rep.recv_bytes(0).unwrap();
            rep.send_multipart([&b"head"[..], &b"body"[..]], 0).unwrap();
            request
        });

        let mut client = Client::new(ZmqTransport::connect(&endpoint).unwrap());
        let frames = client.request().unwrap();

        assert_eq!(frames, vec![Bytes::from("head"), Bytes::from("body")]);
        assert_eq!(server.join().unwrap(), b"next".to_vec());
    }

    #[test]
    fn test_receive_timeout_is_an_error() {
        let (_context, _rep, endpoint) = rep_socket();
        let transport = ZmqTransport::connect(&endpoint).unwrap();
        transport
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let mut client = Client::new(transport);
        assert!(client.request().is_err());
    }
}
