//! Error types for Tapedeck.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using Tapedeck's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Tapedeck operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The shared module could not be loaded at all.
    #[error("failed to load plugin module: {0}")]
    Load(String),

    /// The module is missing one of the required ABI entry points.
    #[error("plugin module is missing required symbol `{symbol}`")]
    AbiMismatch {
        /// Name of the absent entry point.
        symbol: &'static str,
    },

    /// The module reports an ABI version the host does not speak.
    #[error("unsupported plugin ABI version {actual} (host expects {expected})")]
    UnsupportedVersion {
        /// Version the host was built against.
        expected: u32,
        /// Version the module reported.
        actual: u32,
    },

    /// The module's create entry point returned null.
    #[error("plugin construction returned null")]
    PluginInit,

    /// The plugin constructed fine but exposes nothing to drive.
    #[error("plugin exposes no converters")]
    NoConverters,

    /// A converter failed to produce output. Non-fatal per converter.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// The recording file could not be created.
    #[error("failed to create recording file {path}: {source}")]
    RecorderOpen {
        /// Path the recorder tried to create.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A write was attempted after the session was closed.
    #[error("recording session already closed")]
    RecorderClosed,

    /// The underlying container writer reported an error.
    #[error("recording error: {0}")]
    Recording(#[from] mcap::McapError),
}
