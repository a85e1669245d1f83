//! MCAP recording with memoized schema and channel registration.
//!
//! The container format requires schemas before the channels that reference
//! them and channels before the messages appended to them, with identifiers
//! assigned once and never reused. Converters describe the same schema and
//! topic on every publication, so the recorder memoizes both registrations
//! per session: N writes with the same schema name and topic produce exactly
//! one schema record and one channel record.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use mcap::records::MessageHeader;
use mcap::{Channel, Schema, WriteOptions, Writer};
use tracing::debug;

use crate::error::{Error, Result};

/// Encoding tag recorded for schemas. The recorder sinks write JSON
/// envelopes, so schemas are JSON Schema text.
const SCHEMA_ENCODING: &str = "jsonschema";

/// Encoding tag recorded for message payloads.
const MESSAGE_ENCODING: &str = "json";

/// Per-channel registration state.
#[derive(Debug)]
struct ChannelState {
    id: u16,
    sequence: u32,
}

/// An MCAP recording session.
///
/// Registration tables are scoped to the instance, not the process, so
/// independent sessions never cross-contaminate identifiers. The session is
/// single-threaded; a multi-threaded extension would need to serialize
/// registration because identifier assignment is not atomic.
pub struct McapRecorder {
    writer: Writer<'static, BufWriter<File>>,
    /// Schema memoization: name → registered schema handle.
    schemas: HashMap<String, Arc<Schema<'static>>>,
    /// Channel memoization: topic → id and next sequence number.
    channels: HashMap<String, ChannelState>,
    closed: bool,
}

impl McapRecorder {
    /// Create the container file at `path`, with compression disabled.
    ///
    /// Compression stays off as a matter of policy: write-time simplicity
    /// and robustness to crashes over file size.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::RecorderOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let writer = WriteOptions::new()
            .compression(None)
            .create(BufWriter::new(file))?;

        debug!(path = %path.display(), "recording session opened");
        Ok(Self {
            writer,
            schemas: HashMap::new(),
            channels: HashMap::new(),
            closed: false,
        })
    }

    /// Append one record, registering its schema and channel on first use.
    ///
    /// A channel is only ever built from the memoized schema handle, so a
    /// channel referencing an unregistered schema is structurally
    /// impossible. Log-time and publish-time are both set to the supplied
    /// timestamp; timestamps are caller-supplied and deliberately not
    /// validated for monotonicity. Each channel carries an incrementing
    /// sequence counter.
    ///
    /// Fails with [`Error::RecorderClosed`] once the session is closed; a
    /// finalized file is immutable.
    pub fn write(
        &mut self,
        topic: &str,
        log_time_ns: u64,
        payload: &[u8],
        schema_name: &str,
        schema_text: &str,
    ) -> Result<()> {
        if self.closed {
            return Err(Error::RecorderClosed);
        }

        let schema = match self.schemas.get(schema_name) {
            Some(schema) => Arc::clone(schema),
            None => {
                let schema = Arc::new(Schema {
                    name: schema_name.to_string(),
                    encoding: SCHEMA_ENCODING.to_string(),
                    data: Cow::Owned(schema_text.as_bytes().to_vec()),
                });
                debug!(schema = schema_name, "registered schema");
                self.schemas
                    .insert(schema_name.to_string(), Arc::clone(&schema));
                schema
            }
        };

        let state = match self.channels.entry(topic.to_string()) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let channel = Channel {
                    topic: topic.to_string(),
                    schema: Some(schema),
                    message_encoding: MESSAGE_ENCODING.to_string(),
                    metadata: BTreeMap::new(),
                };
                let id = self.writer.add_channel(&channel)?;
                debug!(topic, channel_id = id, "registered channel");
                entry.insert(ChannelState { id, sequence: 0 })
            }
        };

        let header = MessageHeader {
            channel_id: state.id,
            sequence: state.sequence,
            log_time: log_time_ns,
            publish_time: log_time_ns,
        };
        self.writer.write_to_known_channel(&header, payload)?;
        state.sequence = state.sequence.wrapping_add(1);
        Ok(())
    }

    /// Flush and finalize the container so it is independently readable.
    ///
    /// Safe to call more than once; only the first call does work. Once
    /// closed, the session accepts no further writes.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.writer.finish()?;
        self.closed = true;
        debug!("recording session closed");
        Ok(())
    }
}

impl std::fmt::Debug for McapRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McapRecorder")
            .field("schemas", &self.schemas.len())
            .field("channels", &self.channels.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
