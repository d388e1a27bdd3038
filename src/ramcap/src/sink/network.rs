//! Network sink
//!
//! Listens on a TCP port, accepts exactly one client and streams the image
//! to it. The digest artifact follows the payload on the same connection.

use super::{ByteSink, SinkError};
use std::io::{self, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpListener, TcpStream};

/// Single-client TCP byte sink
pub struct NetworkSink {
    stream: TcpStream,
    peer: SocketAddr,
}

impl NetworkSink {
    /// Bind, listen and block until one client connects
    pub fn listen(port: u16, local_only: bool) -> Result<Self, SinkError> {
        let ip = if local_only {
            Ipv4Addr::LOCALHOST
        } else {
            Ipv4Addr::UNSPECIFIED
        };
        let addr = SocketAddr::V4(SocketAddrV4::new(ip, port));

        // std sets SO_REUSEADDR on unix listeners
        let listener =
            TcpListener::bind(addr).map_err(|source| SinkError::Bind { addr, source })?;
        Self::accept_from(listener)
    }

    /// Accept one client from an already bound listener
    pub fn accept_from(listener: TcpListener) -> Result<Self, SinkError> {
        let addr = listener.local_addr().map_err(SinkError::Io)?;
        tracing::info!("Waiting for connection on {}", addr);

        let (stream, peer) = listener
            .accept()
            .map_err(|source| SinkError::Accept { addr, source })?;
        tracing::info!("Accepted connection from {}", peer);

        Ok(Self { stream, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Write for NetworkSink {
    /// Send the whole buffer unless the connection fails part way
    ///
    /// Progress made before a failure is reported as a short count.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut sent = 0;
        while sent < buf.len() {
            match self.stream.write(&buf[sent..]) {
                Ok(0) => break,
                Ok(n) => sent += n,
                Err(err) if sent == 0 => return Err(err),
                Err(err) => {
                    tracing::debug!("send stopped after {} bytes: {}", sent, err);
                    break;
                }
            }
        }
        Ok(sent)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl ByteSink for NetworkSink {
    /// The connection stays up so the digest can follow the payload
    fn close(&mut self) -> io::Result<()> {
        self.stream.flush()
    }

    fn digest_channel(&mut self, _suffix: &str) -> io::Result<Box<dyn Write + '_>> {
        Ok(Box::new(&mut self.stream))
    }

    fn describe(&self) -> String {
        format!("tcp peer {}", self.peer)
    }
}

impl Drop for NetworkSink {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
