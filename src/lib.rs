//! Phomemo label printer library: print label rasters on D30-style thermal
//! printers via BLE.
//!
//! Main modules:
//! - ble: BLE discovery and transport
//! - chunk: splitting raster data into blocks and packets
//! - printer: async driver and job parameters
//! - protocol: command bytes (headers, raster markers, footers)
//! - raster: 1bpp pixel packing
//! - status: connection state and observers

pub mod ble;
pub mod chunk;
pub mod error;
pub mod printer;
pub mod protocol;
pub mod raster;
pub mod status;

/// BLE API: scan/connect to printers
pub use ble::{BleConnector, BleLink, DeviceInfo, DeviceSelector, is_supported, scan};
pub use error::{ConnectError, Error, Result, TransportError};
/// Printer driver API
pub use printer::*;
/// Protocol enums
pub use protocol::{FooterVariant, MediaType, ProtocolRevision};
pub use raster::{PackedBitmap, canvas_size, pack, rotate_for_feed};
pub use status::{ConnectionState, StatusMonitor};
