//! C-compatible ABI surface shared by hosts and plugins.
//!
//! The boundary is deliberately tiny: three free functions and two opaque
//! pointer types that cross by reference only. No structs with vtables, no
//! unwinding, no ownership transfer except the plugin handle itself. Hosts
//! and plugins must be built with the same compiler toolchain; trait objects
//! only ever cross the boundary as opaque pointers re-interpreted through
//! the helpers in this module.

use std::ffi::c_void;

use super::Plugin;
use crate::context::PluginContext;

/// Current plugin ABI version. Modules must report exactly this value to be
/// loaded; there is no forward or backward compatibility negotiation.
pub const TAPEDECK_ABI_VERSION: u32 = 1;

/// Symbol name of the version entry point.
pub const ABI_VERSION_SYMBOL: &str = "tapedeck_plugin_abi_version";
/// Symbol name of the create entry point.
pub const CREATE_SYMBOL: &str = "tapedeck_plugin_create";
/// Symbol name of the destroy entry point.
pub const DESTROY_SYMBOL: &str = "tapedeck_plugin_destroy";

/// Opaque handle to a host-owned context. Borrowed by the plugin for its
/// entire lifetime; never owned by it.
pub type RawContext = *mut c_void;

/// Opaque handle to a plugin instance. Owned by the module that created it
/// and released only through that module's destroy entry point.
pub type RawPluginHandle = *mut c_void;

/// `tapedeck_plugin_abi_version` signature.
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// `tapedeck_plugin_create` signature. Returns null on construction failure.
pub type CreateFn = unsafe extern "C" fn(RawContext) -> RawPluginHandle;

/// `tapedeck_plugin_destroy` signature. Must be called exactly once per
/// successful create, with a handle from the same module.
pub type DestroyFn = unsafe extern "C" fn(RawPluginHandle);

/// Convert a boxed plugin to an opaque handle for the C ABI.
///
/// Used by plugin modules in their create entry point. The fat trait-object
/// pointer is boxed a second time so a thin `*mut c_void` can carry it.
pub fn plugin_to_raw(plugin: Box<dyn Plugin>) -> RawPluginHandle {
    let boxed: Box<Box<dyn Plugin>> = Box::new(plugin);
    Box::into_raw(boxed) as RawPluginHandle
}

/// Convert an opaque handle back into the owning box.
///
/// Used by plugin modules in their destroy entry point.
///
/// # Safety
///
/// The handle must have been created by [`plugin_to_raw`] in the same
/// module and must not be used again afterwards.
pub unsafe fn plugin_from_raw(raw: RawPluginHandle) -> Box<dyn Plugin> {
    // SAFETY: Caller guarantees `raw` came from plugin_to_raw.
    let boxed: Box<Box<dyn Plugin>> = unsafe { Box::from_raw(raw as *mut Box<dyn Plugin>) };
    *boxed
}

/// Borrow the plugin behind an opaque handle without taking ownership.
///
/// # Safety
///
/// The handle must have been created by [`plugin_to_raw`], must not have
/// been destroyed, and no other reference to the plugin may be live for the
/// duration of the borrow.
pub unsafe fn plugin_as_mut<'a>(raw: RawPluginHandle) -> &'a mut dyn Plugin {
    // SAFETY: Caller guarantees `raw` is a live plugin_to_raw handle with
    // no aliasing borrows.
    unsafe { &mut **(raw as *mut Box<dyn Plugin>) }
}

/// Host-side owner of the context capability handed to a plugin.
///
/// Pins the `Box<dyn PluginContext>` on the heap so the raw pointer given
/// to the module stays valid even if the handle itself moves. The handle
/// must outlive every plugin instance created with its raw pointer.
pub struct ContextHandle {
    inner: Box<Box<dyn PluginContext>>,
}

impl ContextHandle {
    /// Wrap a context for handing across the ABI.
    pub fn new(context: Box<dyn PluginContext>) -> Self {
        Self {
            inner: Box::new(context),
        }
    }

    /// The raw pointer to pass to a module's create entry point.
    pub fn as_raw(&self) -> RawContext {
        &*self.inner as *const Box<dyn PluginContext> as RawContext
    }

    /// Borrow the wrapped context on the host side.
    pub fn context(&self) -> &dyn PluginContext {
        self.inner.as_ref().as_ref()
    }
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle").finish_non_exhaustive()
    }
}

/// Plugin-side view of the host context.
///
/// A thin copyable wrapper the plugin stores for its lifetime and calls
/// into whenever it wants to log or publish.
#[derive(Clone, Copy)]
pub struct ContextRef {
    raw: RawContext,
}

impl ContextRef {
    /// Reconstruct the view from the raw pointer passed to create.
    ///
    /// # Safety
    ///
    /// `raw` must come from [`ContextHandle::as_raw`] and the handle must
    /// stay alive for as long as this reference (or any copy of it) is used.
    pub unsafe fn from_raw(raw: RawContext) -> Self {
        Self { raw }
    }

    fn context(&self) -> &dyn PluginContext {
        // SAFETY: Construction contract: `raw` points at the Box pinned by
        // a live ContextHandle.
        unsafe { (*(self.raw as *const Box<dyn PluginContext>)).as_ref() }
    }

    /// Emit a log line through the host.
    pub fn log(&self, message: &str) {
        self.context().log(message);
    }

    /// Publish a serialized payload to a named topic.
    pub fn publish(&self, topic: &str, payload: &[u8]) {
        self.context().publish(topic, payload);
    }
}

impl std::fmt::Debug for ContextRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRef").finish_non_exhaustive()
    }
}

/// Define the three ABI entry points for a plugin crate.
///
/// Takes a factory expression of type
/// `fn(ContextRef) -> Option<Box<dyn Plugin>>`. The generated create entry
/// point runs the factory behind a panic barrier: a panicking or `None`
/// factory yields a null handle instead of unwinding across the boundary.
///
/// # Example
///
/// ```ignore
/// tapedeck::export_plugin!(|ctx: tapedeck::plugin::ContextRef| {
///     Some(Box::new(MyPlugin::new(ctx)))
/// });
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($factory:expr) => {
        /// Reports the ABI version this plugin was built against.
        #[unsafe(no_mangle)]
        pub extern "C" fn tapedeck_plugin_abi_version() -> u32 {
            $crate::plugin::TAPEDECK_ABI_VERSION
        }

        /// Constructs the plugin bound to the supplied host context.
        #[unsafe(no_mangle)]
        pub extern "C" fn tapedeck_plugin_create(
            context: $crate::plugin::RawContext,
        ) -> $crate::plugin::RawPluginHandle {
            if context.is_null() {
                return ::std::ptr::null_mut();
            }
            let result = ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| {
                // SAFETY: The host guarantees `context` comes from
                // ContextHandle::as_raw and outlives this plugin.
                let ctx = unsafe { $crate::plugin::ContextRef::from_raw(context) };
                let factory: fn(
                    $crate::plugin::ContextRef,
                ) -> ::std::option::Option<::std::boxed::Box<dyn $crate::plugin::Plugin>> =
                    $factory;
                factory(ctx)
            }));
            match result {
                ::std::result::Result::Ok(::std::option::Option::Some(plugin)) => {
                    $crate::plugin::plugin_to_raw(plugin)
                }
                _ => ::std::ptr::null_mut(),
            }
        }

        /// Releases a plugin created by this module.
        #[unsafe(no_mangle)]
        pub extern "C" fn tapedeck_plugin_destroy(plugin: $crate::plugin::RawPluginHandle) {
            if !plugin.is_null() {
                // SAFETY: The host passes back the handle produced by
                // tapedeck_plugin_create, exactly once.
                drop(unsafe { $crate::plugin::plugin_from_raw(plugin) });
            }
        }
    };
}
