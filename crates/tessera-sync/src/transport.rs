use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use crate::DEFAULT_PORT;
use crate::error::SyncError;
use crate::protocol::Frame;

pub mod memory;

pub trait FrameSink: Send {
    fn send(&mut self, frame: &Frame) -> Result<(), SyncError>;
    /// Ends the outgoing stream; the peer's source then reports `Disconnected`.
    fn close(&mut self);
}

pub trait FrameSource: Send {
    fn recv(&mut self) -> Result<Frame, SyncError>;
}

/// A bidirectional connection that can be split into independently owned halves.
pub trait Transport: Send {
    fn split(self: Box<Self>) -> (Box<dyn FrameSink>, Box<dyn FrameSource>);
}

/// Appends the default port when `addr` has none.
pub fn with_default_port(addr: &str) -> String {
    if addr.contains(':') {
        addr.to_string()
    } else {
        format!("{addr}:{DEFAULT_PORT}")
    }
}

/// Newline-delimited JSON frames over TCP.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn connect(addr: &str) -> Result<Self, SyncError> {
        let addr = with_default_port(addr);
        let mut last = None;
        for sa in addr.to_socket_addrs()? {
            match TcpStream::connect(sa) {
                Ok(stream) => return Ok(Self::from_stream(stream)),
                Err(e) => last = Some(e),
            }
        }
        Err(last
            .map(SyncError::Io)
            .unwrap_or_else(|| SyncError::Protocol(format!("no address for {addr}"))))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        Self { stream }
    }
}

impl Transport for TcpTransport {
    fn split(self: Box<Self>) -> (Box<dyn FrameSink>, Box<dyn FrameSource>) {
        let reader = match self.stream.try_clone() {
            Ok(s) => Some(BufReader::new(s)),
            Err(e) => {
                log::warn!(target: "sync", "cannot clone tcp stream: {e}");
                None
            }
        };
        let sink = TcpSink {
            writer: BufWriter::new(self.stream),
            closed: false,
        };
        (
            Box::new(sink),
            Box::new(TcpSource {
                reader,
                line: String::new(),
            }),
        )
    }
}

struct TcpSink {
    writer: BufWriter<TcpStream>,
    closed: bool,
}

impl FrameSink for TcpSink {
    fn send(&mut self, frame: &Frame) -> Result<(), SyncError> {
        if self.closed {
            return Err(SyncError::Disconnected);
        }
        serde_json::to_writer(&mut self.writer, frame)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.writer.flush();
            let _ = self.writer.get_ref().shutdown(Shutdown::Both);
        }
    }
}

struct TcpSource {
    reader: Option<BufReader<TcpStream>>,
    line: String,
}

impl FrameSource for TcpSource {
    fn recv(&mut self) -> Result<Frame, SyncError> {
        let reader = self.reader.as_mut().ok_or(SyncError::Disconnected)?;
        loop {
            self.line.clear();
            let n = match reader.read_line(&mut self.line) {
                Ok(n) => n,
                Err(_) => return Err(SyncError::Disconnected),
            };
            if n == 0 {
                return Err(SyncError::Disconnected);
            }
            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            return Ok(serde_json::from_str(text)?);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_appended_once() {
        assert_eq!(with_default_port("localhost"), "localhost:8421");
        assert_eq!(with_default_port("10.0.0.2:9000"), "10.0.0.2:9000");
    }
}
