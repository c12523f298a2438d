use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc::UnboundedReceiver;
use image::{GenericImageView, Rgba};
use log::{debug, info, warn};

use crate::chunk::{MAX_PACKET_BYTES, chunk};
use crate::error::{Error, Result, TransportError};
use crate::protocol::{
    FooterVariant, MAX_LINES_PER_BLOCK, MediaType, ProtocolRevision, feed_lines, header, hex_dump,
};
use crate::raster::pack;
use crate::status::{ConnectionState, StatusMonitor};

/// An open, writable link to the printer.
///
/// Implement this for your BLE or mock transport.
#[async_trait]
pub trait Transport: Send {
    /// Write one unit and wait until the link acknowledges it.
    async fn write(&mut self, data: &[u8]) -> std::result::Result<(), TransportError>;
    /// Tear the link down. Errors are logged by the caller, not surfaced.
    async fn disconnect(&mut self) -> std::result::Result<(), TransportError>;
}

/// Produces a [`Transport`] by discovering and connecting to a device.
#[async_trait]
pub trait Connector: Send {
    type Link: Transport;

    async fn connect(&mut self) -> Result<Self::Link>;
}

/// Fixed pauses the firmware needs between writes.
///
/// These are not part of the protocol; the device drops data without them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// After the header, before the first block.
    pub header_settle: Duration,
    /// After each block marker, before its packets.
    pub marker_settle: Duration,
    /// After the last packet, before the footer.
    pub footer_settle: Duration,
}

impl Timing {
    pub const fn none() -> Self {
        Self {
            header_settle: Duration::ZERO,
            marker_settle: Duration::ZERO,
            footer_settle: Duration::ZERO,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            header_settle: Duration::from_millis(50),
            marker_settle: Duration::from_millis(30),
            footer_settle: Duration::from_millis(50),
        }
    }
}

/// Per-job settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrintJobParameters {
    /// Physical label width, reported back in [`PrinterDebugInfo`].
    pub width_mm: f32,
    pub height_mm: f32,
    /// Dot density; 8 px/mm is roughly 203 DPI.
    pub pixels_per_mm: f32,
    pub footer: FooterVariant,
    pub media: MediaType,
    /// Trailing blank feed, only used by [`FooterVariant::Standard`].
    pub extra_feed_mm: f32,
    pub revision: ProtocolRevision,
}

impl Default for PrintJobParameters {
    fn default() -> Self {
        Self {
            width_mm: 40.0,
            height_mm: 12.0,
            pixels_per_mm: 8.0,
            footer: FooterVariant::default(),
            media: MediaType::default(),
            extra_feed_mm: 0.0,
            revision: ProtocolRevision::default(),
        }
    }
}

/// What was actually sent for the last job. Diagnostic only.
#[derive(Debug, Clone, PartialEq)]
pub struct PrinterDebugInfo {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub bytes_per_row: usize,
    pub total_bytes: usize,
    pub width_mm: f32,
    pub height_mm: f32,
    pub pixels_per_mm: f32,
    pub header_bytes: String,
    pub footer_bytes: String,
}

/// Async driver for one printer.
///
/// - `connector`: discovers and opens the link
/// - `max_packet_bytes`: bytes per data write (default and cap: 128)
/// - `max_lines_per_block`: rows per raster command (default and cap: 255)
///
/// Methods take `&mut self`, so only one job can be in flight per printer.
/// A job cannot be cancelled once it starts writing.
pub struct Printer<C: Connector> {
    connector: C,
    link: Option<C::Link>,
    status: StatusMonitor,
    pub timing: Timing,
    pub max_packet_bytes: usize,
    pub max_lines_per_block: usize,
}

impl<C: Connector> Printer<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            link: None,
            status: StatusMonitor::new(),
            timing: Timing::default(),
            max_packet_bytes: MAX_PACKET_BYTES,
            max_lines_per_block: MAX_LINES_PER_BLOCK,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.state()
    }

    /// Stream of state transitions, see [`StatusMonitor::subscribe`].
    pub fn subscribe(&mut self) -> UnboundedReceiver<ConnectionState> {
        self.status.subscribe()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Discover the device and open the link.
    ///
    /// Does nothing if already connected. On failure the state returns to
    /// `Disconnected` and the connector's error is returned.
    pub async fn connect(&mut self) -> Result<()> {
        if self.link.is_some() {
            return Ok(());
        }
        self.status.set(ConnectionState::Connecting);
        match self.connector.connect().await {
            Ok(link) => {
                self.link = Some(link);
                self.status.set(ConnectionState::Connected);
                info!("printer connected");
                Ok(())
            }
            Err(e) => {
                self.status.set(ConnectionState::Disconnected);
                warn!("connection failed: {}", e);
                Err(e)
            }
        }
    }

    /// Close the link if there is one. Always ends `Disconnected`.
    pub async fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.disconnect().await {
                warn!("disconnect: {}", e);
            }
            info!("printer disconnected");
        }
        if self.status.state() != ConnectionState::Disconnected {
            self.status.set(ConnectionState::Disconnected);
        }
    }

    /// Print a raster that is already in feed orientation.
    ///
    /// - `raster`: RGBA image, one pixel per dot
    /// - `params`: label geometry, footer, media and protocol revision
    ///
    /// Returns what was sent on success. On a failed write the state returns
    /// to `Connected` and the error reports how many lines were delivered.
    pub async fn print<I>(&mut self, raster: &I, params: &PrintJobParameters) -> Result<PrinterDebugInfo>
    where
        I: GenericImageView<Pixel = Rgba<u8>>,
    {
        if self.link.is_none() {
            return Err(Error::NotConnected);
        }

        let bitmap = pack(raster)?;
        let bytes_per_row = u16::try_from(bitmap.bytes_per_row).map_err(|_| {
            Error::InvalidRaster(format!("{} bytes per row exceeds 65535", bitmap.bytes_per_row))
        })?;

        let header = header(params.revision, params.media);
        let footer = params
            .footer
            .encode(feed_lines(params.extra_feed_mm, params.pixels_per_mm));

        let debug_info = PrinterDebugInfo {
            canvas_width: bitmap.width,
            canvas_height: bitmap.height,
            bytes_per_row: bitmap.bytes_per_row,
            total_bytes: bitmap.data.len(),
            width_mm: params.width_mm,
            height_mm: params.height_mm,
            pixels_per_mm: params.pixels_per_mm,
            header_bytes: hex_dump(&header),
            footer_bytes: hex_dump(&footer),
        };
        debug!("print debug info: {:?}", debug_info);

        self.status.set(ConnectionState::Printing);
        let total_lines = bitmap.height;
        let mut lines_sent = 0u32;
        let result = self
            .send_job(&header, &bitmap.data, bytes_per_row, total_lines, &footer, &mut lines_sent)
            .await;
        self.status.set(ConnectionState::Connected);

        match result {
            Ok(()) => {
                info!("print complete: {} lines", total_lines);
                Ok(debug_info)
            }
            Err(source) => {
                warn!("print failed after {}/{} lines: {}", lines_sent, total_lines, source);
                Err(Error::Print {
                    lines_sent,
                    total_lines,
                    source,
                })
            }
        }
    }

    async fn send_job(
        &mut self,
        header: &[u8],
        data: &[u8],
        bytes_per_row: u16,
        total_lines: u32,
        footer: &[u8],
        lines_sent: &mut u32,
    ) -> std::result::Result<(), TransportError> {
        let timing = self.timing;
        let blocks = chunk(
            data,
            bytes_per_row,
            total_lines as usize,
            self.max_lines_per_block,
            self.max_packet_bytes,
        );
        let link = self.link.as_mut().ok_or(TransportError::Closed)?;

        link.write(header).await?;
        pause(timing.header_settle).await;

        for block in &blocks {
            link.write(&block.marker).await?;
            pause(timing.marker_settle).await;

            let mut offset = 0usize;
            for packet in &block.packets {
                link.write(packet).await?;
                offset += packet.len();
                let line = block.start_line + offset / bytes_per_row.max(1) as usize;
                debug!("printing... {}%", line * 100 / total_lines.max(1) as usize);
            }
            *lines_sent += block.lines as u32;
        }

        // Zero-length writes are not sent; some stacks reject them.
        pause(timing.footer_settle).await;
        if !footer.is_empty() {
            link.write(footer).await?;
        }
        Ok(())
    }
}

async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}
