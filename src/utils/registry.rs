//! # Function Registry
//!
//! Configuration names functions by `module` and `call`. Instead of loading
//! code at runtime, callers register every selectable function up front and
//! configuration only picks among them.
//!
//! ```
//! use fedtorch::config::FuncConfig;
//! use fedtorch::utils::registry::{get_executable_func, Registry};
//!
//! fn double(x: f64) -> f64 { x * 2.0 }
//!
//! let mut registry: Registry<fn(f64) -> f64> = Registry::new();
//! registry.register("scaling", "double", double);
//!
//! let f = get_executable_func(&registry, &FuncConfig::new("scaling", "double")).unwrap();
//! assert_eq!(f(2.0), 4.0);
//! ```

use crate::config::FuncConfig;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("Function config names neither a module nor an inline source")]
    EmptyConfig,
    #[error("No function registered as '{0}'")]
    NotFound(String),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

/// `module::call`, or just `call` for inline entries.
pub fn qualified_name(module: &str, call: &str) -> String {
    if module.is_empty() {
        call.to_string()
    } else {
        format!("{module}::{call}")
    }
}

/// Named values (usually function pointers or constructors) selectable
/// from configuration.
#[derive(Clone)]
pub struct Registry<T> {
    entries: BTreeMap<String, T>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Registry {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

impl<T: Clone> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` as `module::call`, replacing and returning any
    /// previous entry under that name.
    pub fn register(&mut self, module: &str, call: &str, value: T) -> Option<T> {
        self.entries.insert(qualified_name(module, call), value)
    }

    /// Registers a strategy that configs select with `source` + `call`.
    pub fn register_inline(&mut self, call: &str, value: T) -> Option<T> {
        self.register("", call, value)
    }

    pub fn get(&self, module: &str, call: &str) -> Option<&T> {
        self.entries.get(&qualified_name(module, call))
    }

    pub fn contains(&self, module: &str, call: &str) -> bool {
        self.get(module, call).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a [`FuncConfig`]:
    /// - a non-empty `module` selects `module::call`;
    /// - otherwise a non-empty `source` selects the inline entry `call`
    ///   (the source text itself is ignored);
    /// - with neither set the config is rejected.
    pub fn resolve(&self, func_cfg: &FuncConfig) -> Result<T, RegistryError> {
        let name = if !func_cfg.module.is_empty() {
            qualified_name(&func_cfg.module, &func_cfg.call)
        } else if !func_cfg.source.is_empty() {
            tracing::warn!(
                call = %func_cfg.call,
                "inline source is not executed; resolving registered inline strategy"
            );
            qualified_name("", &func_cfg.call)
        } else {
            return Err(RegistryError::EmptyConfig);
        };

        self.entries
            .get(&name)
            .cloned()
            .ok_or(RegistryError::NotFound(name))
    }
}

/// Resolves `func_cfg` against `registry`. See [`Registry::resolve`].
pub fn get_executable_func<T: Clone>(
    registry: &Registry<T>,
    func_cfg: &FuncConfig,
) -> Result<T, RegistryError> {
    registry.resolve(func_cfg)
}

/// Reads a whole source file into a string.
pub fn load_source_file(file_path: impl AsRef<Path>) -> Result<String, RegistryError> {
    Ok(std::fs::read_to_string(file_path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(x: i32) -> i32 {
        x * 3
    }

    fn negate(x: i32) -> i32 {
        -x
    }

    fn registry() -> Registry<fn(i32) -> i32> {
        let mut registry: Registry<fn(i32) -> i32> = Registry::new();
        registry.register("ops", "triple", triple);
        registry.register_inline("negate", negate);
        registry
    }

    #[test]
    fn module_entries_resolve_by_qualified_name() {
        let f = registry().resolve(&FuncConfig::new("ops", "triple")).unwrap();
        assert_eq!(f(2), 6);
    }

    #[test]
    fn source_configs_only_reach_inline_entries() {
        let cfg = FuncConfig {
            module: String::new(),
            call: "negate".to_string(),
            source: "def negate(x): return -x".to_string(),
        };
        assert_eq!(registry().resolve(&cfg).unwrap()(5), -5);

        let cfg = FuncConfig {
            call: "triple".to_string(),
            ..cfg
        };
        assert!(matches!(registry().resolve(&cfg), Err(RegistryError::NotFound(name)) if name == "triple"));
    }

    #[test]
    fn empty_config_is_rejected() {
        assert!(matches!(
            registry().resolve(&FuncConfig::default()),
            Err(RegistryError::EmptyConfig)
        ));
    }

    #[test]
    fn unknown_module_is_not_found() {
        let err = get_executable_func(&registry(), &FuncConfig::new("other", "triple")).unwrap_err();
        assert_eq!(err.to_string(), "No function registered as 'other::triple'");
    }

    #[test]
    fn reregistering_returns_previous() {
        let mut registry = registry();
        assert!(registry.register("ops", "triple", negate).is_some());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names().collect::<Vec<_>>(), ["negate", "ops::triple"]);
    }

    #[test]
    fn load_source_file_reads_text() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("strategy.txt");
        std::fs::write(&path, "body").unwrap();
        assert_eq!(load_source_file(&path).unwrap(), "body");
        assert!(load_source_file(dir.path().join("missing")).is_err());
    }
}
