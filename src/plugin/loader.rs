//! Dynamic plugin loading using libloading.

use std::marker::PhantomData;
use std::path::Path;

use libloading::Library;
use tracing::debug;

use super::Plugin;
use super::abi::{
    self, AbiVersionFn, ContextHandle, CreateFn, DestroyFn, RawPluginHandle,
    TAPEDECK_ABI_VERSION,
};
use crate::error::{Error, Result};

/// A loaded plugin module with its ABI entry points resolved.
///
/// Opening a module resolves all three entry points eagerly, so an
/// incompatible module ("old plugin, new host") is rejected before any
/// stateful entry point runs. The reported ABI version is probed once at
/// open time; the version entry point is required to be pure.
///
/// The module stays loaded for the lifetime of this value. Instances
/// created from it borrow it, which orders their destruction before the
/// library is unloaded.
pub struct PluginModule {
    /// The loaded library (kept alive). Must outlive the fn pointers below.
    _library: Library,
    create: CreateFn,
    destroy: DestroyFn,
    abi_version: u32,
}

impl PluginModule {
    /// Load a plugin module from a shared library path and resolve its ABI.
    ///
    /// Fails with [`Error::Load`] if the library cannot be loaded and with
    /// [`Error::AbiMismatch`] (naming the absent symbol) if any of the three
    /// entry points is missing.
    ///
    /// # Safety
    ///
    /// Loading a module executes arbitrary code from the shared library
    /// (static initializers, the version entry point). The module must be
    /// trusted and must implement the plugin ABI faithfully.
    pub unsafe fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // SAFETY: Loading a dynamic library. Caller ensures it is trusted.
        let library =
            unsafe { Library::new(path) }.map_err(|e| Error::Load(e.to_string()))?;

        // SAFETY: The library was just loaded; resolution only reads its
        // symbol table.
        let version = unsafe { resolve::<AbiVersionFn>(&library, abi::ABI_VERSION_SYMBOL)? };
        let create = unsafe { resolve::<CreateFn>(&library, abi::CREATE_SYMBOL)? };
        let destroy = unsafe { resolve::<DestroyFn>(&library, abi::DESTROY_SYMBOL)? };

        // SAFETY: The version entry point takes no arguments, requires no
        // prior initialization, and is pure by contract.
        let abi_version = unsafe { version() };
        debug!(
            path = %path.display(),
            abi_version,
            "resolved plugin entry points"
        );

        Ok(Self {
            _library: library,
            create,
            destroy,
            abi_version,
        })
    }

    /// ABI version the module reported at open time.
    pub fn abi_version(&self) -> u32 {
        self.abi_version
    }

    /// Check the module's ABI version against the host's expected constant.
    ///
    /// Exact-match policy: any other value, newer or older, is rejected
    /// with [`Error::UnsupportedVersion`] before any stateful entry point
    /// is called.
    pub fn negotiate(&self) -> Result<()> {
        check_version(self.abi_version)
    }

    /// Negotiate the ABI version and construct the plugin.
    ///
    /// The returned instance borrows both this module and the context
    /// handle, so the borrow checker enforces that destruction happens
    /// before unload and that the context outlives the plugin.
    ///
    /// # Safety
    ///
    /// Calls into foreign code. The module must uphold the create contract:
    /// return null on failure, otherwise a handle its own destroy entry
    /// point can release.
    pub unsafe fn instantiate<'m>(
        &'m self,
        context: &'m ContextHandle,
    ) -> Result<PluginInstance<'m>> {
        self.negotiate()?;

        // SAFETY: Entry point resolved from this module; context pointer is
        // pinned by the handle borrowed for 'm.
        let raw = unsafe { (self.create)(context.as_raw()) };
        if raw.is_null() {
            return Err(Error::PluginInit);
        }

        Ok(PluginInstance {
            raw,
            destroy: self.destroy,
            _owner: PhantomData,
        })
    }
}

impl std::fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginModule")
            .field("abi_version", &self.abi_version)
            .finish_non_exhaustive()
    }
}

/// A constructed plugin instance.
///
/// Dropping the instance calls the module's destroy entry point exactly
/// once, on every exit path, before the module can be unloaded.
pub struct PluginInstance<'m> {
    raw: RawPluginHandle,
    destroy: DestroyFn,
    _owner: PhantomData<(&'m PluginModule, &'m ContextHandle)>,
}

impl PluginInstance<'_> {
    /// Borrow the plugin for enumeration and driving.
    pub fn plugin_mut(&mut self) -> &mut dyn Plugin {
        // SAFETY: `raw` was produced by the module's create entry point and
        // stays valid until Drop runs; &mut self excludes other borrows.
        unsafe { abi::plugin_as_mut(self.raw) }
    }
}

impl Drop for PluginInstance<'_> {
    fn drop(&mut self) {
        // SAFETY: Paired with the create call that produced `raw`; Drop
        // runs at most once.
        unsafe { (self.destroy)(self.raw) };
    }
}

impl std::fmt::Debug for PluginInstance<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance").finish_non_exhaustive()
    }
}

/// Exact-match version policy shared by every negotiation path.
fn check_version(actual: u32) -> Result<()> {
    if actual != TAPEDECK_ABI_VERSION {
        return Err(Error::UnsupportedVersion {
            expected: TAPEDECK_ABI_VERSION,
            actual,
        });
    }
    Ok(())
}

/// Resolve one entry point, mapping a missing symbol to an actionable error.
///
/// # Safety
///
/// `T` must match the symbol's actual signature in the module.
unsafe fn resolve<T: Copy>(library: &Library, name: &'static str) -> Result<T> {
    // SAFETY: Caller guarantees the signature matches; libloading appends
    // the terminating NUL itself.
    let symbol: libloading::Symbol<'_, T> = unsafe { library.get(name.as_bytes()) }
        .map_err(|_| Error::AbiMismatch { symbol: name })?;
    Ok(*symbol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_nonexistent_module() {
        let result = unsafe { PluginModule::open("/nonexistent/libmissing_plugin.so") };
        assert!(matches!(result, Err(Error::Load(_))));
    }

    #[test]
    fn test_open_non_library_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not a shared library").unwrap();

        let result = unsafe { PluginModule::open(file.path()) };
        assert!(matches!(result, Err(Error::Load(_))));
    }

    #[test]
    fn test_foreign_library_names_missing_symbol() {
        // Any real shared library without the plugin entry points will do;
        // resolution fails on the first symbol probed, before any stateful
        // entry point could run.
        for candidate in ["libm.so.6", "libc.so.6"] {
            match unsafe { PluginModule::open(candidate) } {
                Err(Error::AbiMismatch { symbol }) => {
                    assert_eq!(symbol, abi::ABI_VERSION_SYMBOL);
                    return;
                }
                Err(Error::Load(_)) => continue,
                other => panic!("expected AbiMismatch, got {other:?}"),
            }
        }
        panic!("no foreign shared library available to load");
    }

    #[test]
    fn test_version_check_is_exact_match() {
        assert!(check_version(TAPEDECK_ABI_VERSION).is_ok());
        assert!(matches!(
            check_version(0),
            Err(Error::UnsupportedVersion {
                expected: TAPEDECK_ABI_VERSION,
                actual: 0,
            })
        ));
        assert!(matches!(
            check_version(TAPEDECK_ABI_VERSION + 1),
            Err(Error::UnsupportedVersion { .. })
        ));
    }
}
