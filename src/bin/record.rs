//! Recording tool: drives a converter plugin and records its output to MCAP.
//!
//! Usage: `tapedeck-record [MODULE_PATH] [OUTPUT_PATH]`
//!
//! Exit codes: 0 success, 1 load failure, 2 ABI resolution failure,
//! 3 no converters, 4 anything else (version mismatch, construction,
//! recorder open/write).

use std::cell::RefCell;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use tapedeck::Error;
use tapedeck::context::RecorderContext;
use tapedeck::host;
use tapedeck::recorder::McapRecorder;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_MODULE: &str = "target/debug/libtapedeck_demo_plugin.so";
const DEFAULT_OUTPUT: &str = "recording.mcap";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = env::args().skip(1);
    let module = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODULE));
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    let recorder = match McapRecorder::create(&output) {
        Ok(recorder) => Rc::new(RefCell::new(recorder)),
        Err(err) => {
            error!(%err, "failed to open recording");
            return ExitCode::from(4);
        }
    };
    let context = RecorderContext::new(Rc::clone(&recorder));

    // SAFETY: The operator chose the module path; loading it executes its code.
    let result = unsafe { host::run_module(&module, Box::new(context)) };

    // Close on every path so the container stays readable even after a
    // failed session.
    let close_result = recorder.borrow_mut().close();

    match result {
        Ok(report) => {
            if let Err(err) = close_result {
                error!(%err, "failed to finalize recording");
                return ExitCode::from(4);
            }
            info!(
                output = %output.display(),
                published = report.published,
                failed = report.failed,
                "recording written"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "session failed");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn exit_code(err: &Error) -> u8 {
    match err {
        Error::Load(_) => 1,
        Error::AbiMismatch { .. } => 2,
        Error::NoConverters => 3,
        _ => 4,
    }
}
