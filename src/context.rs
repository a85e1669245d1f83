//! Context capabilities the host hands to a plugin.
//!
//! A plugin emits log lines and publishes output through this interface
//! without knowing how the host disposes of it. The host picks the concrete
//! sink at construction time: console printing for smoke tests, or durable
//! MCAP recording.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use tracing::{error, info};

use crate::recorder::McapRecorder;

/// The callback surface a plugin sees.
///
/// Supplied by the host at plugin construction time; the plugin borrows it
/// for its lifetime and never owns it.
pub trait PluginContext {
    /// Emit a log line on behalf of the plugin.
    fn log(&self, message: &str);

    /// Publish a serialized payload to a named topic.
    ///
    /// The context decides the disposal; publish failures are reported by
    /// the sink, not surfaced to the plugin.
    fn publish(&self, topic: &str, payload: &[u8]);
}

/// Context sink that prints published payloads to stdout.
#[derive(Debug, Default)]
pub struct ConsoleContext;

impl ConsoleContext {
    /// Create a console sink.
    pub fn new() -> Self {
        Self
    }
}

impl PluginContext for ConsoleContext {
    fn log(&self, message: &str) {
        info!(target: "plugin", "{message}");
    }

    fn publish(&self, topic: &str, payload: &[u8]) {
        println!("topic '{}' ({} bytes)", topic, payload.len());
        println!("  {}", hex_preview(payload, 16));
    }
}

/// Schema name the recorder sink registers its log envelope under.
const LOG_SCHEMA_NAME: &str = "foxglove.Log";

/// JSON schema text for the Foxglove `Log` message.
const LOG_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "timestamp": {"type": "object"},
    "level": {"type": "integer"},
    "message": {"type": "string"},
    "name": {"type": "string"}
  }
}"#;

/// Context sink that records publications into an MCAP file.
///
/// Each published payload is wrapped in a `foxglove.Log` JSON envelope,
/// stamped with the current wall clock, and appended through the shared
/// recorder. Recording failures are logged and the session continues; the
/// caller decides whether to abort.
///
/// The recorder is shared via `Rc` because the session is single-threaded
/// by design and the owning binary closes the recorder after the plugin is
/// torn down.
pub struct RecorderContext {
    recorder: Rc<RefCell<McapRecorder>>,
}

impl RecorderContext {
    /// Create a sink backed by the given recorder.
    pub fn new(recorder: Rc<RefCell<McapRecorder>>) -> Self {
        Self { recorder }
    }
}

impl PluginContext for RecorderContext {
    fn log(&self, message: &str) {
        info!(target: "plugin", "{message}");
    }

    fn publish(&self, topic: &str, payload: &[u8]) {
        let stamp = now_ns();
        let envelope = json!({
            "timestamp": { "sec": stamp / 1_000_000_000, "nsec": stamp % 1_000_000_000 },
            "level": 1,
            "message": format!("received {} bytes", payload.len()),
            "name": "tapedeck",
        });
        let body = envelope.to_string();

        if let Err(err) = self.recorder.borrow_mut().write(
            topic,
            stamp,
            body.as_bytes(),
            LOG_SCHEMA_NAME,
            LOG_SCHEMA,
        ) {
            error!(topic, %err, "failed to record published payload");
        }
    }
}

impl std::fmt::Debug for RecorderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecorderContext").finish_non_exhaustive()
    }
}

/// Current wall-clock time in nanoseconds since the Unix epoch.
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Render the first `limit` bytes as hex, with a `..` marker when truncated.
fn hex_preview(payload: &[u8], limit: usize) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    for byte in payload.iter().take(limit) {
        let _ = write!(out, "{byte:02x} ");
    }
    if payload.len() > limit {
        out.push_str("..");
    }
    out.trim_end().to_string()
}
