//! Host runtime: loads a plugin module and drives its converters.
//!
//! The session is a linear state machine with no cycles:
//! load → resolve ABI → version check → construct → enumerate → convert* →
//! destroy → unload. Failures up through construction are fatal to the run;
//! per-converter failures are logged and the loop continues. Teardown runs
//! on every exit path through RAII: the plugin instance drops (calling the
//! module's destroy entry point) before the module unloads, which drops
//! before the context handle.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::context::PluginContext;
use crate::error::{Error, Result};
use crate::plugin::{ContextHandle, Plugin, PluginModule};

/// Summary of one drive pass over a plugin's converters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriveReport {
    /// Converters the plugin exposed.
    pub converters: usize,
    /// Conversions that succeeded and were handed to the context.
    pub published: usize,
    /// Conversions that failed (logged, non-fatal).
    pub failed: usize,
}

/// Drive every converter of a plugin once with an empty input buffer.
///
/// Successful output is published through the context; a failing converter
/// is logged and skipped, never aborting enumeration of the rest. A fault
/// (panic) inside a converter is not caught here; the boundary makes no
/// isolation promise for misbehaving modules.
pub fn drive(plugin: &mut dyn Plugin, context: &dyn PluginContext) -> Result<DriveReport> {
    let mut converters = plugin.converters();
    if converters.is_empty() {
        return Err(Error::NoConverters);
    }

    let mut report = DriveReport {
        converters: converters.len(),
        ..DriveReport::default()
    };
    info!(converters = report.converters, "driving converters");

    for converter in &mut converters {
        let topic = converter.topic();
        info!(
            topic = %topic,
            message_id = converter.message_id(),
            "converting"
        );
        debug!(schema = %converter.schema(), "converter schema");

        match converter.convert(&[]) {
            Ok(payload) => {
                context.publish(&topic, &payload);
                report.published += 1;
            }
            Err(err) => {
                warn!(topic = %topic, %err, "conversion failed, continuing");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Run one full session against the module at `path`.
///
/// # Safety
///
/// Loads and executes foreign code from the shared library; see
/// [`PluginModule::open`].
pub unsafe fn run_module(path: &Path, context: Box<dyn PluginContext>) -> Result<DriveReport> {
    let handle = ContextHandle::new(context);

    // SAFETY: Caller vouches for the module; forwarded contract.
    let module = unsafe { PluginModule::open(path)? };
    info!(
        path = %path.display(),
        abi_version = module.abi_version(),
        "plugin module loaded"
    );

    // SAFETY: Module was opened above; the context handle outlives the
    // instance by declaration order.
    let mut instance = unsafe { module.instantiate(&handle)? };
    drive(instance.plugin_mut(), handle.context())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::Converter;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FixedConverter {
        topic: &'static str,
        output: Result<Vec<u8>>,
    }

    impl FixedConverter {
        fn ok(topic: &'static str, bytes: &[u8]) -> Self {
            Self {
                topic,
                output: Ok(bytes.to_vec()),
            }
        }

        fn failing(topic: &'static str) -> Self {
            Self {
                topic,
                output: Err(Error::Conversion("intentional".to_string())),
            }
        }
    }

    impl Converter for FixedConverter {
        fn message_id(&self) -> u64 {
            1
        }
        fn topic(&self) -> String {
            self.topic.to_string()
        }
        fn schema(&self) -> String {
            String::new()
        }
        fn convert(&mut self, input: &[u8]) -> Result<Vec<u8>> {
            assert!(input.is_empty());
            match &self.output {
                Ok(bytes) => Ok(bytes.clone()),
                Err(_) => Err(Error::Conversion("intentional".to_string())),
            }
        }
    }

    struct TestPlugin {
        converters: Vec<FixedConverter>,
    }

    impl Plugin for TestPlugin {
        fn converters(&mut self) -> Vec<&mut dyn Converter> {
            self.converters
                .iter_mut()
                .map(|c| c as &mut dyn Converter)
                .collect()
        }
    }

    #[derive(Clone, Default)]
    struct CaptureContext {
        published: Rc<RefCell<Vec<(String, Vec<u8>)>>>,
    }

    impl PluginContext for CaptureContext {
        fn log(&self, _message: &str) {}
        fn publish(&self, topic: &str, payload: &[u8]) {
            self.published
                .borrow_mut()
                .push((topic.to_string(), payload.to_vec()));
        }
    }

    #[test]
    fn test_drive_publishes_successful_output() {
        let mut plugin = TestPlugin {
            converters: vec![FixedConverter::ok("/a", b"payload")],
        };
        let context = CaptureContext::default();

        let report = drive(&mut plugin, &context).unwrap();
        assert_eq!(report.converters, 1);
        assert_eq!(report.published, 1);
        assert_eq!(report.failed, 0);

        let published = context.published.borrow();
        assert_eq!(published[0], ("/a".to_string(), b"payload".to_vec()));
    }

    #[test]
    fn test_drive_continues_past_failing_converter() {
        let mut plugin = TestPlugin {
            converters: vec![
                FixedConverter::failing("/bad"),
                FixedConverter::ok("/good", b"ok"),
            ],
        };
        let context = CaptureContext::default();

        let report = drive(&mut plugin, &context).unwrap();
        assert_eq!(report.converters, 2);
        assert_eq!(report.published, 1);
        assert_eq!(report.failed, 1);

        let published = context.published.borrow();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "/good");
    }

    #[test]
    fn test_drive_rejects_empty_plugin() {
        let mut plugin = TestPlugin { converters: vec![] };
        let context = CaptureContext::default();

        let result = drive(&mut plugin, &context);
        assert!(matches!(result, Err(Error::NoConverters)));
    }
}
