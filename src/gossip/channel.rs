//! Message Channel
//!
//! Point-to-point transport for gossip sessions. Each frame is an 8-byte
//! little-endian length header followed by a JSON-encoded [`GossipMessage`].
//! The protocol driver only sees the [`MessageChannel`] and [`Connector`]
//! traits, so sessions run unchanged over TCP or in-memory pipes.

use super::message::GossipMessage;
use crate::error::{GossipError, Result};

use async_trait::async_trait;
use std::future::Future;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// Largest frame accepted from a peer.
pub const MAX_FRAME_LEN: u64 = 16 * 1024 * 1024;

#[async_trait]
pub trait MessageChannel: Send {
    async fn send_data(&mut self, msg: &GossipMessage) -> Result<()>;

    /// Waits for the next message. Returns [`GossipError::ChannelClosed`] on a clean EOF.
    async fn rcv_data(&mut self) -> Result<GossipMessage>;

    async fn close(&mut self);

    /// Address of the remote end, for diagnostics.
    fn peer(&self) -> &str;
}

/// Opens outbound channels to peers.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, addr: &str) -> Result<Box<dyn MessageChannel>>;
}

/// Length-prefixed JSON frames over any byte stream.
pub struct FramedChannel<S> {
    stream: S,
    peer: String,
}

impl<S> FramedChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream,
            peer: peer.into(),
        }
    }
}

#[async_trait]
impl<S> MessageChannel for FramedChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_data(&mut self, msg: &GossipMessage) -> Result<()> {
        let body = serde_json::to_vec(msg)?;
        let len = body.len() as u64;
        if len > MAX_FRAME_LEN {
            return Err(GossipError::FrameTooLarge(len));
        }

        self.stream.write_all(&len.to_le_bytes()).await?;
        self.stream.write_all(&body).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn rcv_data(&mut self) -> Result<GossipMessage> {
        let mut header = [0u8; 8];
        if let Err(e) = self.stream.read_exact(&mut header).await {
            return Err(match e.kind() {
                ErrorKind::UnexpectedEof => GossipError::ChannelClosed,
                _ => GossipError::Io(e),
            });
        }

        let len = u64::from_le_bytes(header);
        if len > MAX_FRAME_LEN {
            return Err(GossipError::FrameTooLarge(len));
        }

        let mut body = vec![0u8; len as usize];
        self.stream.read_exact(&mut body).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!("Failed to shut down channel to {}: {}", self.peer, e);
        }
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

/// Dials peers over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, addr: &str) -> Result<Box<dyn MessageChannel>> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(FramedChannel::new(stream, addr)))
    }
}

/// Accepts inbound connections until `shutdown` fires, handing each one to
/// `on_rcv` on its own task.
pub async fn run_on_rcv_data<F, Fut>(listener: TcpListener, shutdown: CancellationToken, on_rcv: F)
where
    F: Fn(Box<dyn MessageChannel>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Gossip listener accepting on {}", addr);
    }

    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!("set_nodelay failed for {}: {}", peer, e);
                }
                let channel: Box<dyn MessageChannel> =
                    Box::new(FramedChannel::new(stream, peer.to_string()));
                tokio::spawn(on_rcv(channel));
            }
            Err(e) => {
                tracing::warn!("Failed to accept gossip connection: {}", e);
            }
        }
    }

    tracing::info!("Gossip listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::types::NodeId;

    #[tokio::test]
    async fn test_framed_channel_over_duplex() {
        let (a, b) = tokio::io::duplex(1024);
        let mut left = FramedChannel::new(a, "right");
        let mut right = FramedChannel::new(b, "left");

        let msg = GossipMessage::PullRequest {
            nodes: vec![NodeId::from("n1"), NodeId::from("n2")],
        };
        left.send_data(&msg).await.unwrap();
        left.send_data(&GossipMessage::Done).await.unwrap();

        assert_eq!(right.rcv_data().await.unwrap(), msg);
        assert_eq!(right.rcv_data().await.unwrap(), GossipMessage::Done);
        assert_eq!(right.peer(), "left");
    }

    #[tokio::test]
    async fn test_eof_reports_closed_channel() {
        let (a, b) = tokio::io::duplex(64);
        let mut left = FramedChannel::new(a, "right");
        let mut right = FramedChannel::new(b, "left");

        left.close().await;
        drop(left);
        assert!(matches!(right.rcv_data().await, Err(GossipError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let (mut a, b) = tokio::io::duplex(64);
        let mut right = FramedChannel::new(b, "left");

        a.write_all(&(MAX_FRAME_LEN + 1).to_le_bytes()).await.unwrap();
        assert!(matches!(
            right.rcv_data().await,
            Err(GossipError::FrameTooLarge(len)) if len == MAX_FRAME_LEN + 1
        ));
    }

    #[tokio::test]
    async fn test_tcp_listener_hands_off_channels() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let shutdown = CancellationToken::new();

        let server = tokio::spawn(run_on_rcv_data(
            listener,
            shutdown.clone(),
            |mut channel: Box<dyn MessageChannel>| async move {
                if let Ok(GossipMessage::PullRequest { .. }) = channel.rcv_data().await {
                    let _ = channel.send_data(&GossipMessage::PushAck).await;
                }
            },
        ));

        let mut client = TcpConnector.connect(&addr).await.unwrap();
        client
            .send_data(&GossipMessage::PullRequest { nodes: vec![] })
            .await
            .unwrap();
        assert_eq!(client.rcv_data().await.unwrap(), GossipMessage::PushAck);

        shutdown.cancel();
        server.await.unwrap();
    }
}
