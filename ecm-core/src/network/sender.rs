use std::time::Duration;

use futures::SinkExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::trace;

use super::Endpoint;
use crate::codec::PacketCodec;
use crate::error::EcmError;
use crate::packet::CommandPacket;

/// Sends each packet on a fresh connection and closes it.
///
/// No reuse, no retry and no acknowledgement; a failure is returned to
/// the caller, which drops the packet.
#[derive(Debug, Clone)]
pub struct PacketSender {
    endpoint: Endpoint,
    connect_timeout: Duration,
}

impl PacketSender {
    pub fn new(endpoint: Endpoint, connect_timeout: Duration) -> Self {
        Self {
            endpoint,
            connect_timeout,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub async fn send(&self, packet: CommandPacket) -> Result<(), EcmError> {
        let addr = self.endpoint.to_string();
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| EcmError::Timeout(self.connect_timeout))??;

        let mut framed = Framed::new(stream, PacketCodec);
        framed.send(packet).await?;

        let mut stream = framed.into_inner();
        stream.shutdown().await?;
        trace!(%addr, ?packet, "packet relayed");
        Ok(())
    }
}
