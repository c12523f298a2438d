//! Error types for connecting to and printing on the label printer.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Main error type returned by [`Printer`](crate::Printer) operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No usable Bluetooth LE support on this system.
    #[error("Bluetooth LE is not supported on this system")]
    Unsupported,

    /// Device selection, GATT connection or characteristic lookup failed.
    ///
    /// The printer is left [`Disconnected`](crate::ConnectionState::Disconnected).
    #[error("Failed to connect: {0}")]
    Connect(#[from] ConnectError),

    /// `print` was called without an open link. Nothing was written.
    #[error("Not connected to printer")]
    NotConnected,

    /// A write failed part way through a job.
    ///
    /// `lines_sent` counts the raster lines of blocks whose packets were all
    /// acknowledged. Lines of the block in flight are not counted, but the
    /// device may still have buffered some of them.
    #[error("Print failed after {lines_sent} of {total_lines} lines: {source}")]
    Print {
        lines_sent: u32,
        total_lines: u32,
        #[source]
        source: TransportError,
    },

    #[error("Invalid raster: {0}")]
    InvalidRaster(String),
}

/// Why a connection attempt did not produce a writable link.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("no Bluetooth adapter found")]
    NoAdapter,

    /// The device selector declined every discovered device.
    #[error("device selection cancelled")]
    Cancelled,

    #[error("scan failed: {0}")]
    Scan(#[source] btleplug::Error),

    #[error("GATT connection failed: {0}")]
    Gatt(#[source] btleplug::Error),

    #[error("service {0} not found")]
    ServiceNotFound(Uuid),

    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    #[error("connection timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure of a single write on an open link.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Ble(#[from] btleplug::Error),

    #[error("link closed")]
    Closed,

    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Result type alias for printer operations.
pub type Result<T> = std::result::Result<T, Error>;
