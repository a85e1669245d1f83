//! End-to-end tests driving the demo plugin through the ABI entry points.
//!
//! The demo plugin is linked as an rlib, so its exported `extern "C"` entry
//! points can be exercised in-process without dlopen. A final test loads the
//! actual cdylib through the loader when the artifact is present.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use prost::Message;
use tapedeck::context::{PluginContext, RecorderContext};
use tapedeck::host;
use tapedeck::plugin::{self, ContextHandle, TAPEDECK_ABI_VERSION};
use tapedeck::recorder::McapRecorder;
use tapedeck_demo_plugin::{self as demo, DemoMessage};

#[derive(Clone, Default)]
struct CaptureContext {
    logs: Rc<RefCell<Vec<String>>>,
    published: Rc<RefCell<Vec<(String, Vec<u8>)>>>,
}

impl PluginContext for CaptureContext {
    fn log(&self, message: &str) {
        self.logs.borrow_mut().push(message.to_string());
    }

    fn publish(&self, topic: &str, payload: &[u8]) {
        self.published
            .borrow_mut()
            .push((topic.to_string(), payload.to_vec()));
    }
}

#[test]
fn abi_version_is_pure_and_matches_host() {
    assert_eq!(demo::tapedeck_plugin_abi_version(), TAPEDECK_ABI_VERSION);
    assert_eq!(
        demo::tapedeck_plugin_abi_version(),
        demo::tapedeck_plugin_abi_version()
    );
}

#[test]
fn create_rejects_null_context() {
    let raw = demo::tapedeck_plugin_create(std::ptr::null_mut());
    assert!(raw.is_null());
}

#[test]
fn full_session_over_the_abi() {
    let capture = CaptureContext::default();
    let handle = ContextHandle::new(Box::new(capture.clone()));

    let raw = demo::tapedeck_plugin_create(handle.as_raw());
    assert!(!raw.is_null());

    // SAFETY: `raw` is live and no other borrow exists.
    let report = {
        let plugin = unsafe { plugin::plugin_as_mut(raw) };
        host::drive(plugin, handle.context()).unwrap()
    };
    demo::tapedeck_plugin_destroy(raw);

    assert_eq!(report.converters, 1);
    assert_eq!(report.published, 1);
    assert_eq!(report.failed, 0);

    assert!(
        capture
            .logs
            .borrow()
            .iter()
            .any(|line| line.contains("demo plugin initialized"))
    );

    let published = capture.published.borrow();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "/demo/topic");

    let message = DemoMessage::decode(published[0].1.as_slice()).unwrap();
    assert_eq!(message.counter, 42);
    assert_eq!(message.text, "hello");
}

#[test]
fn recording_session_registers_once_and_stays_readable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.mcap");

    let recorder = Rc::new(RefCell::new(McapRecorder::create(&path).unwrap()));
    let handle = ContextHandle::new(Box::new(RecorderContext::new(Rc::clone(&recorder))));

    let raw = demo::tapedeck_plugin_create(handle.as_raw());
    assert!(!raw.is_null());
    {
        // SAFETY: `raw` is live and no other borrow exists.
        let plugin = unsafe { plugin::plugin_as_mut(raw) };
        let report = host::drive(plugin, handle.context()).unwrap();
        assert_eq!(report.published, 1);
    }
    demo::tapedeck_plugin_destroy(raw);
    recorder.borrow_mut().close().unwrap();

    let buf = std::fs::read(&path).unwrap();
    let summary = mcap::Summary::read(&buf).unwrap().expect("summary present");
    assert_eq!(summary.schemas.len(), 1);
    assert_eq!(summary.channels.len(), 1);

    let schema = summary.schemas.values().next().unwrap();
    assert_eq!(schema.name, "foxglove.Log");
    let channel = summary.channels.values().next().unwrap();
    assert_eq!(channel.topic, "/demo/topic");

    let messages: Vec<_> = mcap::MessageStream::new(&buf)
        .unwrap()
        .collect::<mcap::McapResult<_>>()
        .unwrap();
    assert_eq!(messages.len(), 1);

    let envelope: serde_json::Value = serde_json::from_slice(&messages[0].data).unwrap();
    assert_eq!(envelope["level"], 1);
    assert_eq!(envelope["name"], "tapedeck");
}

/// Locate the demo plugin cdylib in the target directory, if built.
fn demo_plugin_cdylib() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let deps = exe.parent()?;
    let debug = deps.parent()?;

    let direct = debug.join("libtapedeck_demo_plugin.so");
    if direct.exists() {
        return Some(direct);
    }
    for entry in std::fs::read_dir(deps).ok()?.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("libtapedeck_demo_plugin") && name.ends_with(".so") {
            return Some(entry.path());
        }
    }
    None
}

#[test]
fn dlopen_session_against_built_cdylib() {
    let Some(path) = demo_plugin_cdylib() else {
        eprintln!("demo plugin cdylib not built, skipping dlopen test");
        return;
    };

    let capture = CaptureContext::default();
    // SAFETY: The cdylib is this workspace's own demo plugin.
    let report = unsafe { host::run_module(&path, Box::new(capture.clone())) }.unwrap();

    assert_eq!(report.converters, 1);
    assert_eq!(report.published, 1);

    let published = capture.published.borrow();
    assert_eq!(published[0].0, "/demo/topic");
    let message = DemoMessage::decode(published[0].1.as_slice()).unwrap();
    assert_eq!(message.counter, 42);
    assert_eq!(message.text, "hello");
}
