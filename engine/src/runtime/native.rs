//! Native module loader
//!
//! Loads caller-supplied tools from native shared libraries
//! (`.so`/`.dylib`/`.dll`) via `dlopen`. The named export must be an
//! `extern "C"` constructor returning a boxed [`Tool`]:
//!
//! ```ignore
//! #[no_mangle]
//! pub extern "C" fn make_tool() -> *mut dyn sdk::Tool {
//!     Box::into_raw(Box::new(MyTool::new()))
//! }
//! ```
//!
//! Loaded libraries are kept alive for the loader's lifetime so tool
//! instances never outlive their code.

use sdk::errors::EngineError;
use sdk::tool::{ModuleLoader, Tool};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Shared-library-backed [`ModuleLoader`]
#[derive(Default)]
pub struct NativeModuleLoader {
    /// Loaded libraries (kept alive to prevent unloading)
    libraries: Mutex<Vec<libloading::Library>>,
}

impl NativeModuleLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModuleLoader for NativeModuleLoader {
    fn load(&self, module: &Path, export: &str) -> Result<Arc<dyn Tool>, EngineError> {
        info!("Loading custom tool module {}", module.display());

        let lib = unsafe {
            libloading::Library::new(module).map_err(|e| {
                EngineError::LibraryLoadFailed(format!("{}: {e}", module.display()))
            })?
        };

        let tool: Box<dyn Tool> = {
            let ctor: libloading::Symbol<unsafe extern "C" fn() -> *mut dyn Tool> = unsafe {
                lib.get(export.as_bytes()).map_err(|_| {
                    EngineError::CustomToolExportNotFound {
                        module: module.display().to_string(),
                        export: export.to_string(),
                    }
                })?
            };

            unsafe {
                let ptr = ctor();
                if ptr.is_null() {
                    return Err(EngineError::LibraryLoadFailed(format!(
                        "'{export}' returned null"
                    )));
                }
                Box::from_raw(ptr)
            }
        };

        let mut libraries = self.libraries.lock().unwrap_or_else(|e| e.into_inner());
        libraries.push(lib);

        Ok(Arc::from(tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_module_fails_to_load() {
        let loader = NativeModuleLoader::new();
        let err = match loader.load(Path::new("/no/such/libtool.so"), "make_tool") {
            Err(e) => e,
            Ok(_) => panic!("expected load to fail for missing module"),
        };
        assert!(matches!(err, EngineError::LibraryLoadFailed(_)));
    }
}
