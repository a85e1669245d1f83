//! Console plugin host.
//!
//! Loads a converter plugin module, drives every converter once with an
//! empty input, and hexdumps published payloads to stdout.
//!
//! Usage: `tapedeck-host [MODULE_PATH]`
//!
//! Exit codes: 0 success, 1 load failure, 2 ABI resolution failure,
//! 3 version mismatch, 4 construction failure, 5 no converters.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use tapedeck::Error;
use tapedeck::context::ConsoleContext;
use tapedeck::host;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_MODULE: &str = "target/debug/libtapedeck_demo_plugin.so";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let module = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODULE));

    // SAFETY: The operator chose the module path; loading it executes its code.
    let result = unsafe { host::run_module(&module, Box::new(ConsoleContext::new())) };
    match result {
        Ok(report) => {
            info!(
                converters = report.converters,
                published = report.published,
                failed = report.failed,
                "session complete"
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
        Error::UnsupportedVersion { .. } => 3,
        Error::PluginInit => 4,
        Error::NoConverters => 5,
        _ => 1,
    }
}
