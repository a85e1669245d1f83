//! Converter capability: raw input bytes to a serialized output message.

use crate::error::Result;

/// A conversion capability provided by a plugin.
///
/// A converter maps raw input bytes to one serialized output message and
/// carries the metadata the host needs to route and describe that message:
/// a stable numeric identifier, a topic name, and a schema text blob.
///
/// Converters are owned exclusively by their [`Plugin`](crate::plugin::Plugin);
/// references to them are invalidated when the owning plugin is destroyed.
pub trait Converter {
    /// Stable, plugin-defined message identifier.
    ///
    /// Not guaranteed to be globally unique across plugins.
    fn message_id(&self) -> u64;

    /// Topic the converted output is published on.
    fn topic(&self) -> String;

    /// Schema text describing the serialized output (e.g. a proto3 snippet).
    fn schema(&self) -> String;

    /// Convert raw input bytes into a serialized output message.
    ///
    /// Must be safely callable with an empty input buffer (the host's
    /// smoke-test path always passes one), must not retain references into
    /// `input` beyond the call, and must return `Err` rather than fault.
    /// The metadata accessors above must be pure and stable across repeated
    /// calls within one plugin lifetime.
    fn convert(&mut self, input: &[u8]) -> Result<Vec<u8>>;
}
