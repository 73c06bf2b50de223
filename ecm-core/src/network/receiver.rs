use std::net::SocketAddr;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::net::TcpListener;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::PacketCodec;
use crate::error::EcmError;
use crate::packet::CommandPacket;

/// Accepts relay connections one at a time and hands every complete
/// 7-byte record to a callback.
pub struct PacketReceiver {
    listener: TcpListener,
}

impl PacketReceiver {
    /// Bind the listening socket. Failure here is a startup error.
    pub async fn bind(addr: &str) -> Result<Self, EcmError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, EcmError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve connections until `cancel` fires.
    ///
    /// Accept and read errors only end the current connection; the loop
    /// goes back to accepting.
    pub async fn run<F>(&self, cancel: &CancellationToken, mut on_packet: F) -> Result<(), EcmError>
    where
        F: FnMut(CommandPacket),
    {
        loop {
            let accept = tokio::select! {
                result = self.listener.accept() => result,
                _ = cancel.cancelled() => break,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            debug!(%peer, "relay connected");
            let packets = serve_connection(stream, cancel, &mut on_packet).await;
            debug!(%peer, packets, "relay disconnected");
        }

        info!("packet receiver stopped");
        Ok(())
    }
}

/// Read 7-byte records from one connection until it closes, errors or
/// `cancel` fires. Returns the number of packets dispatched.
pub async fn serve_connection<S, F>(stream: S, cancel: &CancellationToken, on_packet: &mut F) -> usize
where
    S: AsyncRead + Unpin,
    F: FnMut(CommandPacket),
{
    let mut frames = FramedRead::new(stream, PacketCodec);
    let mut count = 0;

    loop {
        let next = tokio::select! {
            next = frames.next() => next,
            _ = cancel.cancelled() => break,
        };

        match next {
            Some(Ok(packet)) => {
                count += 1;
                on_packet(packet);
            }
            Some(Err(EcmError::IncompletePacket { received })) => {
                warn!(received, "discarding partial packet at disconnect");
                break;
            }
            Some(Err(e)) => {
                warn!("relay read error: {e}");
                break;
            }
            None => break,
        }
    }

    count
}
