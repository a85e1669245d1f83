//! # Tapedeck
//!
//! A minimal plugin host: converter plugins are loaded from shared libraries
//! across a versioned C-compatible ABI, driven to produce serialized
//! messages, and their output is either printed to the console or recorded
//! into an MCAP container with embedded schemas.
//!
//! ## Architecture
//!
//! - [`plugin`]: the ABI contract (three entry points, opaque handles) and
//!   the loader that resolves and drives it.
//! - [`converter`]: the capability a plugin exposes: raw input bytes in,
//!   serialized message out, tagged with a message id, topic, and schema.
//! - [`context`]: the callback surface the host hands to a plugin so it can
//!   log and publish without knowing the destination.
//! - [`recorder`]: MCAP writing with schema/channel registration memoized
//!   per recording session.
//! - [`host`]: the session driver tying it all together.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tapedeck::context::ConsoleContext;
//! use tapedeck::host;
//!
//! let report = unsafe {
//!     host::run_module("libmy_plugin.so".as_ref(), Box::new(ConsoleContext::new()))?
//! };
//! println!("published {} message(s)", report.published);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod context;
pub mod converter;
pub mod error;
pub mod host;
pub mod plugin;
pub mod recorder;

pub use error::{Error, Result};
