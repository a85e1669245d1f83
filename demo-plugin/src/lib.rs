//! Reference converter plugin for the tapedeck host.
//!
//! Provides a single converter that ignores its input and emits a fixed
//! protobuf-encoded `demo.DemoMessage` on `/demo/topic`. Built as both a
//! cdylib (for the host to dlopen) and an rlib (so the host's test suite can
//! exercise the exported entry points in-process).

use prost::Message;
use tapedeck::Result;
use tapedeck::converter::Converter;
use tapedeck::plugin::{ContextRef, Plugin};

/// Topic the demo converter publishes on.
pub const DEMO_TOPIC: &str = "/demo/topic";

/// Stable message identifier of the demo converter.
pub const DEMO_MESSAGE_ID: u64 = 0xDEAD_BEEF;

const DEMO_SCHEMA: &str =
    r#"syntax = "proto3"; package demo; message DemoMessage { int32 counter = 1; string text = 2; }"#;

/// Wire message emitted by [`DemoConverter`].
#[derive(Clone, PartialEq, Message)]
pub struct DemoMessage {
    /// Fixed demo counter.
    #[prost(int32, tag = "1")]
    pub counter: i32,
    /// Fixed demo text.
    #[prost(string, tag = "2")]
    pub text: String,
}

/// Converter producing a fixed `DemoMessage { counter: 42, text: "hello" }`.
#[derive(Debug, Default)]
pub struct DemoConverter;

impl Converter for DemoConverter {
    fn message_id(&self) -> u64 {
        DEMO_MESSAGE_ID
    }

    fn topic(&self) -> String {
        DEMO_TOPIC.to_string()
    }

    fn schema(&self) -> String {
        DEMO_SCHEMA.to_string()
    }

    fn convert(&mut self, _input: &[u8]) -> Result<Vec<u8>> {
        let message = DemoMessage {
            counter: 42,
            text: "hello".to_string(),
        };
        Ok(message.encode_to_vec())
    }
}

/// The demo plugin: owns exactly one [`DemoConverter`].
pub struct DemoPlugin {
    converter: DemoConverter,
}

impl DemoPlugin {
    /// Construct the plugin bound to the host context.
    pub fn new(ctx: ContextRef) -> Self {
        ctx.log("demo plugin initialized");
        Self {
            converter: DemoConverter,
        }
    }
}

impl Plugin for DemoPlugin {
    fn converters(&mut self) -> Vec<&mut dyn Converter> {
        vec![&mut self.converter]
    }
}

tapedeck::export_plugin!(|ctx: ContextRef| Some(Box::new(DemoPlugin::new(ctx))));
