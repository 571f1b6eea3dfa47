//! Persistent per-device TCP transport: connect, send a framed request, and
//! correlate the response within a bounded window (spec §5, §7).

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::error::{Result, TransportError};
use crate::session::{SessionKey, V3Envelope};

/// LAN round-trip timeout for ordinary V3 commands.
pub const LAN_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);
/// Longer timeout for legacy V1 queries, which can be slow to answer.
pub const V1_QUERY_TIMEOUT: Duration = Duration::from_secs(8);

/// A connected session to one device. Owns the TCP stream and, for V3
/// devices, the envelope codec derived from the handshake.
pub struct Transport {
    stream: TcpStream,
    envelope: Option<V3Envelope>,
}

impl Transport {
    #[instrument(skip(key), fields(addr = %addr))]
    pub async fn connect(addr: std::net::SocketAddr, key: Option<SessionKey>) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::Connect)?;
        debug!("connected");
        Ok(Self { stream, envelope: key.map(V3Envelope::new) })
    }

    /// Send a fully-formed base frame, wrapping it in a V3 envelope first if
    /// this transport has a session key, and wait up to `timeout_after` for a
    /// matching response.
    pub async fn request(&mut self, frame: &[u8], timeout_after: Duration) -> Result<Vec<u8>> {
        let wire = match &mut self.envelope {
            Some(env) => env.wrap(frame),
            None => frame.to_vec(),
        };

        self.stream.write_all(&wire).await.map_err(TransportError::Write)?;

        let mut buf = vec![0u8; 4096];
        let n = timeout(timeout_after, self.stream.read(&mut buf))
            .await
            .map_err(|_| TransportError::Read(std::io::Error::new(std::io::ErrorKind::TimedOut, "response timeout")))?
            .map_err(TransportError::Read)?;
        buf.truncate(n);

        match &self.envelope {
            Some(env) => Ok(env.unwrap(&buf)?),
            None => Ok(buf),
        }
    }

    /// True once the underlying socket has observed a disconnect, in which
    /// case the caller should treat the device as offline and reconnect
    /// before issuing another request.
    pub async fn is_closed(&mut self) -> bool {
        let mut probe = [0u8; 1];
        match self.stream.try_read(&mut probe) {
            Ok(0) => true,
            Ok(_) => false,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => false,
            Err(_) => true,
        }
    }
}

/// Reconnect loop with simple fixed backoff; callers own when to invoke it,
/// typically after `request` returns a [`TransportError`].
pub async fn reconnect(
    addr: std::net::SocketAddr,
    key: Option<SessionKey>,
    attempts: u32,
    backoff: Duration,
) -> Result<Transport> {
    let mut last_err = None;
    for attempt in 0..attempts {
        match Transport::connect(addr, key.clone()).await {
            Ok(t) => return Ok(t),
            Err(e) => {
                warn!(attempt, "reconnect attempt failed");
                last_err = Some(e);
                tokio::time::sleep(backoff).await;
            }
        }
    }
    Err(last_err.expect("attempts > 0 guarantees at least one error"))
}
