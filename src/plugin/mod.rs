//! Plugin system for dynamically loading converter plugins.
//!
//! A plugin is a shared library (.so on Linux) that exports three
//! independently resolvable entry points:
//!
//! ```c
//! uint32_t tapedeck_plugin_abi_version(void);
//! void*    tapedeck_plugin_create(void* context);
//! void     tapedeck_plugin_destroy(void* plugin);
//! ```
//!
//! The version entry point must be callable before anything else and lets
//! the host reject an incompatible module with zero side effects. The
//! create/destroy pair transfers an opaque plugin handle across the
//! boundary; the handle must only ever be destroyed by the module that
//! created it.
//!
//! # Writing a plugin (Rust)
//!
//! ```ignore
//! use tapedeck::converter::Converter;
//! use tapedeck::plugin::{ContextRef, Plugin};
//!
//! struct MyPlugin { /* converters */ }
//!
//! impl Plugin for MyPlugin {
//!     fn converters(&mut self) -> Vec<&mut dyn Converter> {
//!         vec![/* ... */]
//!     }
//! }
//!
//! tapedeck::export_plugin!(|ctx: ContextRef| Some(Box::new(MyPlugin::new(ctx))));
//! ```

mod abi;
mod loader;

use crate::converter::Converter;

pub use abi::{
    ABI_VERSION_SYMBOL, AbiVersionFn, CREATE_SYMBOL, ContextHandle, ContextRef, CreateFn,
    DESTROY_SYMBOL, DestroyFn, RawContext, RawPluginHandle, TAPEDECK_ABI_VERSION, plugin_as_mut,
    plugin_from_raw, plugin_to_raw,
};
pub use loader::{PluginInstance, PluginModule};

/// A loaded plugin's behavior: owning and enumerating converters.
///
/// Constructed by the module's create entry point with a [`ContextRef`] the
/// plugin may use for logging and publishing; the plugin must not retain
/// that context beyond its own lifetime. Destroyed exactly once by the
/// matching destroy entry point.
pub trait Plugin {
    /// Borrow all converters this plugin provides, in a stable order.
    ///
    /// The borrows are invalidated when the plugin is destroyed.
    fn converters(&mut self) -> Vec<&mut dyn Converter>;
}
