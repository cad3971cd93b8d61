//! TCP listener and per-connection handler: frames in, replies out, one session per socket.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedSender;
use weld_core::protocol::ProtocolError;
use weld_core::session::{Session, DEFAULT_SAMPLE_STEP};
use weld_core::wire::{body_len, decode_frame, encode_reply, Frame, LEN_SIZE};

/// Read and write deadline per operation.
pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub sample_step: usize,
    pub io_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            sample_step: DEFAULT_SAMPLE_STEP,
            io_timeout: IO_TIMEOUT,
        }
    }
}

/// Why a connection ended without a complete session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Accept forever; each connection gets its own task. Completed sessions go to `queue`.
pub async fn run_listener(
    listener: TcpListener,
    settings: ConnectionSettings,
    queue: UnboundedSender<Session>,
) -> std::io::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "listening");
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let queue = queue.clone();
                tokio::spawn(handle_connection(stream, peer, settings, queue));
            }
            Err(e) => tracing::warn!(error = %e, "accept failed"),
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    settings: ConnectionSettings,
    queue: UnboundedSender<Session>,
) {
    let ip = peer.ip().to_string();
    tracing::debug!(%peer, "connection accepted");
    match serve_connection(&mut stream, &ip, settings).await {
        Ok(session) => {
            tracing::info!(%peer, rows = session.row_count(), "session complete");
            if queue.send(session).is_err() {
                tracing::error!(%peer, "persistence worker gone, session dropped");
            }
        }
        Err(e) => tracing::warn!(%peer, error = %e, "connection aborted, session discarded"),
    }
}

/// Run the packet loop on one stream until END has been acknowledged.
pub async fn serve_connection<S>(
    stream: &mut S,
    source_ip: &str,
    settings: ConnectionSettings,
) -> Result<Session, ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = Session::new(source_ip).with_sample_step(settings.sample_step);
    let reply = encode_reply();
    while !session.is_terminal() {
        let frame = read_frame(stream, settings.io_timeout).await?;
        tracing::trace!(packet = ?frame.packet_id, len = frame.payload.len(), "packet");
        session.apply(&frame)?;
        deadline(settings.io_timeout, stream.write_all(&reply)).await?;
    }
    deadline(settings.io_timeout, stream.flush()).await?;
    Ok(session)
}

async fn read_frame<S>(stream: &mut S, timeout: Duration) -> Result<Frame, ConnectionError>
where
    S: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LEN_SIZE];
    deadline(timeout, stream.read_exact(&mut prefix)).await?;
    let mut bytes = vec![0u8; LEN_SIZE + body_len(prefix)];
    bytes[..LEN_SIZE].copy_from_slice(&prefix);
    deadline(timeout, stream.read_exact(&mut bytes[LEN_SIZE..])).await?;
    Ok(decode_frame(&bytes)?)
}

/// An expired deadline is a protocol error.
async fn deadline<T>(
    timeout: Duration,
    op: impl Future<Output = std::io::Result<T>>,
) -> Result<T, ConnectionError> {
    match tokio::time::timeout(timeout, op).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ProtocolError::Timeout.into()),
    }
}
