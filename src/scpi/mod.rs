use crate::config::InstrumentConfig;
use crate::error::ScpiError;
use log::{debug, warn};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

pub mod block;

/// Responses larger than this on the text channel mean the instrument and
/// the client disagree about framing.
const MAX_LINE_LEN: usize = 1024 * 1024;

/// Default per-read chunk bound for block payloads. Raised for large file
/// transfers through [`ScpiSession::with_limits`].
pub const DEFAULT_CHUNK_SIZE: usize = 20_000;

/// Byte-level transport under the SCPI channel.
///
/// One implementation talks to the real instrument over TCP; tests inject a
/// scripted implementation to simulate responses, fragmented reads and
/// injected faults. The session owns all framing (newline termination,
/// block headers); the transport only moves bytes.
pub trait Transport {
    /// Write the whole buffer, flushing it to the wire.
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;

    /// Read up to `buf.len()` bytes, blocking for at most the configured IO
    /// timeout. A return of 0 means the peer closed the connection.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Apply a response timeout to subsequent reads and writes.
    fn set_io_timeout(&mut self, timeout: Duration) -> std::io::Result<()>;

    /// Close the underlying connection.
    fn shutdown(&mut self) -> std::io::Result<()>;
}

/// TCP transport to the instrument's raw SCPI socket (port 5025).
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn connect(
        address: &str,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Result<Self, ScpiError> {
        let socket_addr = address
            .to_socket_addrs()
            .map_err(|_| ScpiError::InvalidAddress(address.to_string()))?
            .next()
            .ok_or_else(|| ScpiError::InvalidAddress(address.to_string()))?;

        debug!("connecting to {address}");
        let stream = TcpStream::connect_timeout(&socket_addr, connect_timeout)
            .map_err(|e| ScpiError::io(format!("connecting to {address}"), e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| ScpiError::io("setting TCP_NODELAY", e))?;

        let mut transport = Self { stream };
        transport
            .set_io_timeout(io_timeout)
            .map_err(|e| ScpiError::io("applying response timeout", e))?;
        Ok(transport)
    }
}

impl Transport for TcpTransport {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        use std::io::Write;
        self.stream.write_all(buf)?;
        self.stream.flush()
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        use std::io::Read;
        self.stream.read(buf)
    }

    fn set_io_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))
    }

    fn shutdown(&mut self) -> std::io::Result<()> {
        self.stream.shutdown(Shutdown::Both)
    }
}

/// One session with one instrument: the transport handle (absent while
/// disconnected), the endpoint address, and the mutable channel settings.
///
/// Every operation that needs a live connection checks for one and fails
/// fast with [`ScpiError::NotConnected`]; nothing reconnects implicitly.
pub struct ScpiSession {
    transport: Option<Box<dyn Transport>>,
    address: String,
    connect_timeout: Duration,
    timeout: Duration,
    chunk_size: usize,
}

impl ScpiSession {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport: None,
            address: address.into(),
            connect_timeout: Duration::from_millis(5000),
            timeout,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn from_config(config: &InstrumentConfig) -> Self {
        Self {
            transport: None,
            address: config.address.clone(),
            connect_timeout: config.connect_timeout(),
            timeout: config.timeout(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Open the transport and record it in the session. On any failure the
    /// session stays disconnected; no partial handle is retained.
    pub fn connect(&mut self) -> Result<(), ScpiError> {
        let transport = TcpTransport::connect(&self.address, self.connect_timeout, self.timeout)?;
        self.transport = Some(Box::new(transport));
        debug!("connected to {}", self.address);
        Ok(())
    }

    /// Best-effort close. Close errors are logged, never propagated:
    /// disconnect must not raise.
    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.shutdown() {
                warn!("error while disconnecting from {}: {e}", self.address);
            } else {
                debug!("disconnected from {}", self.address);
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Change the response timeout, applying it to the live transport when
    /// one exists.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), ScpiError> {
        if let Some(transport) = self.transport.as_mut() {
            transport
                .set_io_timeout(timeout)
                .map_err(|e| ScpiError::io("applying response timeout", e))?;
        }
        self.timeout = timeout;
        Ok(())
    }

    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size;
    }

    fn transport_mut(&mut self) -> Result<&mut dyn Transport, ScpiError> {
        match self.transport.as_mut() {
            Some(t) => Ok(t.as_mut()),
            None => Err(ScpiError::NotConnected),
        }
    }

    /// Write a command with no expected response.
    pub fn send(&mut self, cmd: &str) -> Result<(), ScpiError> {
        let transport = self.transport_mut()?;
        debug!(">> {cmd}");
        let mut framed = Vec::with_capacity(cmd.len() + 1);
        framed.extend_from_slice(cmd.as_bytes());
        framed.push(b'\n');
        transport
            .write_all(&framed)
            .map_err(|e| ScpiError::io(format!("writing command {cmd}"), e))
    }

    /// Read one newline-terminated response line, trimmed of surrounding
    /// whitespace.
    ///
    /// Bytes are pulled one at a time rather than through a buffered
    /// reader: a buffered reader would steal bytes that belong to a binary
    /// block following the line on the same stream.
    fn read_line(&mut self) -> Result<String, ScpiError> {
        let transport = self.transport_mut()?;
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = transport
                .read(&mut byte)
                .map_err(|e| ScpiError::io("reading response line", e))?;
            if n == 0 {
                if line.is_empty() {
                    return Err(ScpiError::io(
                        "reading response line",
                        std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "connection closed before response",
                        ),
                    ));
                }
                break;
            }
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
            if line.len() > MAX_LINE_LEN {
                return Err(ScpiError::Protocol(format!(
                    "response line exceeds {MAX_LINE_LEN} bytes"
                )));
            }
        }
        let text = String::from_utf8_lossy(&line).trim().to_string();
        debug!("<< {text}");
        Ok(text)
    }

    /// Write a query and read its single-line response.
    pub fn query(&mut self, cmd: &str) -> Result<String, ScpiError> {
        self.send(cmd)?;
        self.read_line()
    }

    /// Operation-complete barrier: issue `*OPC?` and discard the response.
    /// Used after commands whose completion is not otherwise observable.
    pub fn query_opc_sync(&mut self) -> Result<(), ScpiError> {
        let _ = self.query("*OPC?")?;
        Ok(())
    }

    /// Write a query whose response is an IEEE definite-length block, and
    /// decode it to the raw payload bytes.
    pub fn query_block(&mut self, cmd: &str) -> Result<Vec<u8>, ScpiError> {
        self.send(cmd)?;
        let chunk_size = self.chunk_size;
        let transport = self.transport_mut()?;
        block::read_block(transport, chunk_size)
    }

    /// Run `op` with the timeout and/or chunk size overridden, restoring
    /// the previous values on every exit path. Large transfers and slow
    /// measurement sequences need bigger limits than the interactive
    /// channel default, but the override must never outlive the operation.
    pub fn with_limits<T>(
        &mut self,
        timeout: Option<Duration>,
        chunk_size: Option<usize>,
        op: impl FnOnce(&mut Self) -> Result<T, ScpiError>,
    ) -> Result<T, ScpiError> {
        let prev_timeout = self.timeout;
        let prev_chunk = self.chunk_size;

        if let Some(t) = timeout {
            self.set_timeout(t)?;
        }
        if let Some(c) = chunk_size {
            self.chunk_size = c;
        }

        let result = op(self);

        self.chunk_size = prev_chunk;
        if let Err(e) = self.set_timeout(prev_timeout) {
            warn!("failed to restore timeout after override: {e}");
        }
        result
    }

    #[cfg(test)]
    pub(crate) fn connected_with(transport: Box<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport: Some(transport),
            address: "mock:0".to_string(),
            connect_timeout: Duration::from_millis(100),
            timeout,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{ex, session_with_script, Reply};
    use super::*;

    #[test]
    fn operations_require_a_live_session() {
        let mut session = ScpiSession::new("192.0.2.1:5025", Duration::from_millis(100));
        assert!(matches!(session.send("FREQ:CENT 1e9 Hz"), Err(ScpiError::NotConnected)));
        assert!(matches!(session.query("FREQ:CENT?"), Err(ScpiError::NotConnected)));
        assert!(matches!(session.query_opc_sync(), Err(ScpiError::NotConnected)));
        assert!(matches!(
            session.query_block("TRAC:DATA? TRACE1"),
            Err(ScpiError::NotConnected)
        ));
    }

    #[test]
    fn disconnect_never_raises_and_clears_the_handle() {
        let mut session = ScpiSession::new("192.0.2.1:5025", Duration::from_millis(100));
        session.disconnect();
        assert!(!session.is_connected());

        let (mut session, _state) = session_with_script(vec![], Duration::from_millis(100));
        assert!(session.is_connected());
        session.disconnect();
        assert!(!session.is_connected());
        session.disconnect();
    }

    #[test]
    fn query_trims_surrounding_whitespace() {
        let (mut session, _state) = session_with_script(
            vec![ex("FREQ:CENT?", Reply::Line("  1.00000000E+09\r ".to_string()))],
            Duration::from_millis(100),
        );
        assert_eq!(session.query("FREQ:CENT?").unwrap(), "1.00000000E+09");
    }

    #[test]
    fn opc_sync_discards_the_response() {
        let (mut session, state) = session_with_script(
            vec![ex("*OPC?", Reply::Line("1".to_string()))],
            Duration::from_millis(100),
        );
        session.query_opc_sync().unwrap();
        assert_eq!(state.borrow().writes, vec!["*OPC?"]);
    }

    #[test]
    fn unscripted_query_times_out() {
        let (mut session, _state) = session_with_script(vec![], Duration::from_millis(100));
        assert!(matches!(session.query("BAND?"), Err(ScpiError::Timeout)));
    }

    #[test]
    fn with_limits_restores_on_success_and_error() {
        let (mut session, state) = session_with_script(vec![], Duration::from_millis(5000));
        let base = Duration::from_millis(5000);
        let raised = Duration::from_millis(120_000);

        let ok: Result<(), ScpiError> = session.with_limits(Some(raised), Some(1_048_576), |s| {
            assert_eq!(s.timeout(), raised);
            assert_eq!(s.chunk_size(), 1_048_576);
            Ok(())
        });
        ok.unwrap();
        assert_eq!(session.timeout(), base);
        assert_eq!(session.chunk_size(), DEFAULT_CHUNK_SIZE);

        let err: Result<(), ScpiError> = session.with_limits(Some(raised), Some(42), |_| {
            Err(ScpiError::Protocol("mid-transfer fault".to_string()))
        });
        assert!(err.is_err());
        assert_eq!(session.timeout(), base);
        assert_eq!(session.chunk_size(), DEFAULT_CHUNK_SIZE);

        // Applied then restored, twice over.
        assert_eq!(
            state.borrow().timeouts,
            vec![raised, base, raised, base]
        );
    }

    #[test]
    fn query_block_decodes_through_the_channel() {
        let payload: Vec<u8> = (0u8..100).collect();
        let (mut session, _state) = session_with_script(
            vec![ex(
                "TRAC:DATA? TRACE1",
                Reply::Bytes(testing::ieee_block(&payload)),
            )],
            Duration::from_millis(100),
        );
        assert_eq!(session.query_block("TRAC:DATA? TRACE1").unwrap(), payload);
    }
}
