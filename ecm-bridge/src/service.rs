//! Bridge service core logic.
//!
//! Owns the configuration and the process-wide cancellation token, and
//! runs one of the three deployments until the token fires:
//!
//! | Deployment | Pipeline                                               |
//! |------------|--------------------------------------------------------|
//! | `Local`    | lines → decoder → renderer → framebuffer               |
//! | `Relay`    | lines → decoder → TCP sender                           |
//! | `Serve`    | TCP receiver → renderer → framebuffer                  |

use std::ops::DerefMut;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ecm_core::{
    CommandPacket, EcmError, FrameSurface, HandshakeDecoder, HandshakeLines, PacketSender,
    RenderOutcome, Renderer, interpret,
};

use crate::config::BridgeConfig;

/// Which pipeline the service runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    /// Decode the parallel link and draw directly.
    Local,
    /// Decode the parallel link and forward packets over TCP.
    Relay,
    /// Accept relayed packets over TCP and draw them.
    Serve,
}

impl std::fmt::Display for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Deployment::Local => write!(f, "local"),
            Deployment::Relay => write!(f, "relay"),
            Deployment::Serve => write!(f, "serve"),
        }
    }
}

// ── BridgeService ────────────────────────────────────────────────

pub struct BridgeService {
    config: BridgeConfig,
    cancel: CancellationToken,
}

impl BridgeService {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// A handle the signal handler uses to stop the service.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `deployment` until stopped.
    ///
    /// Errors returned here are startup or backend failures; per-packet
    /// failures are logged inside the loops.
    pub async fn run(&self, deployment: Deployment) -> Result<(), EcmError> {
        self.config.validate()?;
        info!(%deployment, "bridge starting");
        match deployment {
            Deployment::Local => self.run_local().await,
            Deployment::Relay => self.run_relay().await,
            Deployment::Serve => self.run_serve().await,
        }?;
        info!(%deployment, "bridge stopped");
        Ok(())
    }

    // ── Deployments ──────────────────────────────────────────────

    #[cfg(target_os = "linux")]
    async fn run_local(&self) -> Result<(), EcmError> {
        let mut surface = self.open_surface()?;
        let mut decoder = self.open_decoder()?;
        let renderer = Renderer::new(self.config.framebuffer.fill_mode);
        info!(fill_mode = ?renderer.fill_mode(), "rendering locally");

        let packets =
            render_transactions(&mut decoder, &mut surface, &renderer, &self.cancel).await?;
        info!(packets, "decoder loop ended");
        Ok(())
    }

    #[cfg(target_os = "linux")]
    async fn run_relay(&self) -> Result<(), EcmError> {
        let mut decoder = self.open_decoder()?;
        let sender = PacketSender::new(self.config.relay_endpoint(), self.config.connect_timeout());
        info!(peer = %sender.endpoint(), "relaying packets");

        let relayed = relay_transactions(&mut decoder, &sender, &self.cancel).await?;
        info!(relayed, "decoder loop ended");
        Ok(())
    }

    #[cfg(target_os = "linux")]
    async fn run_serve(&self) -> Result<(), EcmError> {
        use ecm_core::PacketReceiver;

        let mut surface = self.open_surface()?;
        let renderer = Renderer::new(self.config.framebuffer.fill_mode);

        let receiver = PacketReceiver::bind(&self.config.listen_address()).await?;
        info!(
            addr = %receiver.local_addr()?,
            fill_mode = ?renderer.fill_mode(),
            "server listening"
        );

        receiver
            .run(&self.cancel, |packet| {
                render_packet(&mut surface, &renderer, &packet);
            })
            .await
    }

    #[cfg(not(target_os = "linux"))]
    async fn run_local(&self) -> Result<(), EcmError> {
        Err(EcmError::Unsupported("local deployment needs Linux GPIO and fbdev"))
    }

    #[cfg(not(target_os = "linux"))]
    async fn run_relay(&self) -> Result<(), EcmError> {
        Err(EcmError::Unsupported("relay deployment needs Linux GPIO"))
    }

    #[cfg(not(target_os = "linux"))]
    async fn run_serve(&self) -> Result<(), EcmError> {
        Err(EcmError::Unsupported("serve deployment needs Linux fbdev"))
    }

    // ── Backends ─────────────────────────────────────────────────

    #[cfg(target_os = "linux")]
    fn open_surface(&self) -> Result<ecm_core::backend::fbdev::FbSurface, EcmError> {
        let device = std::path::Path::new(&self.config.framebuffer.device);
        let mut surface = ecm_core::backend::fbdev::open(device)?;
        let g = *surface.geometry();
        info!(
            device = %device.display(),
            width = g.width,
            height = g.height,
            stride = g.stride,
            virtual_height = g.virtual_height,
            mapped = surface.mapped_len(),
            "framebuffer ready"
        );
        if self.config.framebuffer.clear_on_start {
            surface.clear();
        }
        Ok(surface)
    }

    #[cfg(target_os = "linux")]
    fn open_decoder(
        &self,
    ) -> Result<HandshakeDecoder<ecm_core::backend::gpio::GpioLines>, EcmError> {
        let map = self.config.line_map();
        let lines = ecm_core::backend::gpio::open(&map)?;
        info!(
            chip = %map.chip,
            data = ?map.data,
            clock = map.clock,
            ack = map.ack,
            start = map.start,
            status = ?map.status,
            "gpio lines ready"
        );
        Ok(HandshakeDecoder::new(lines, self.config.decoder_timing()))
    }
}

// ── Pipelines ────────────────────────────────────────────────────

/// Interpret one packet and draw it.
pub fn render_packet<M: DerefMut<Target = [u8]>>(
    surface: &mut FrameSurface<M>,
    renderer: &Renderer,
    packet: &CommandPacket,
) -> RenderOutcome {
    let command = interpret(packet);
    let outcome = renderer.apply(surface, &command);
    match outcome {
        RenderOutcome::Ignored => debug!(kind = packet.kind(), "ignoring packet"),
        RenderOutcome::Clipped => debug!(?command, "pixel outside visible area"),
        _ => debug!(?command, "rendered"),
    }
    outcome
}

/// Decode transactions and draw each one until cancelled. Returns the
/// number of packets rendered.
pub async fn render_transactions<L, M>(
    decoder: &mut HandshakeDecoder<L>,
    surface: &mut FrameSurface<M>,
    renderer: &Renderer,
    cancel: &CancellationToken,
) -> Result<u64, EcmError>
where
    L: HandshakeLines,
    M: DerefMut<Target = [u8]>,
{
    let mut rendered = 0;
    while let Some(packet) = decoder.next_packet(cancel).await? {
        render_packet(surface, renderer, &packet);
        rendered += 1;
    }
    Ok(rendered)
}

/// Decode transactions and relay each one until cancelled. A failed send
/// drops that packet only. Returns the number of packets delivered.
pub async fn relay_transactions<L: HandshakeLines>(
    decoder: &mut HandshakeDecoder<L>,
    sender: &PacketSender,
    cancel: &CancellationToken,
) -> Result<u64, EcmError> {
    let mut relayed = 0;
    while let Some(packet) = decoder.next_packet(cancel).await? {
        tokio::select! {
            result = sender.send(packet) => match result {
                Ok(()) => relayed += 1,
                Err(e) => warn!(peer = %sender.endpoint(), ?packet, "packet dropped: {e}"),
            },
            _ = cancel.cancelled() => break,
        }
    }
    Ok(relayed)
}

// ── Tests ────────────────────────────────────────────────────────
