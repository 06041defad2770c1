//! Command builder catalog.
//!
//! Builders are registered under a module path such as
//! `morphline::stdlib::fields`. A morphline's `importCommands` patterns pick
//! which of them it can use:
//!
//! | Pattern                               | Selects                                  |
//! |---------------------------------------|------------------------------------------|
//! | `**`                                  | everything                               |
//! | `morphline.**`                        | every module below `morphline`           |
//! | `morphline.stdlib.*`                  | every direct child of `morphline.stdlib` |
//! | `morphline.stdlib.fields`             | all builders of one module               |
//! | `morphline.stdlib.fields.addValues`   | a single command                         |
//!
//! `.` and `::` are interchangeable separators. Resolved sets are cached per
//! pattern list; [`Registry::register`] invalidates the cache.

mod pattern;

pub use pattern::ImportPattern;

use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::command::Command;
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::CompileResult;

/// Import spec used when a morphline declares none.
pub const DEFAULT_IMPORTS: &[&str] = &["**"];

// =============================================================================
// Builder contract
// =============================================================================

/// Where a command is being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildScope {
    command: String,
    parent: String,
    path: String,
}

impl BuildScope {
    /// Scope of a morphline's top-level commands.
    pub fn root(morphline_id: &str) -> Self {
        Self {
            command: "morphline".to_string(),
            parent: String::new(),
            path: morphline_id.to_string(),
        }
    }

    /// Scope of a command declared as `command` inside this one.
    pub fn child(&self, command: &str) -> Self {
        Self {
            command: command.to_string(),
            parent: self.command.clone(),
            path: format!("{}/{}", self.path, command),
        }
    }

    /// Name the command was declared under.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Name of the enclosing command (`morphline` at the top level).
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Slash-separated nesting path, starting with the morphline id.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Builds commands from their configuration.
///
/// One builder may serve several names (e.g. `logInfo` and `logWarn`);
/// [`BuildScope::command`] tells it which one was requested.
pub trait CommandBuilder: Send + Sync {
    fn names(&self) -> &'static [&'static str];

    /// Validate `config` and build the command. Nested command lists are
    /// built through `compiler` before the command wrapping them.
    fn build(
        &self,
        config: &ConfigNode,
        scope: &BuildScope,
        compiler: &mut Compiler,
    ) -> CompileResult<Box<dyn Command>>;
}

/// Name → builder map produced by [`Registry::discover`].
pub type BuilderSet = HashMap<String, Arc<dyn CommandBuilder>>;

// =============================================================================
// Registry
// =============================================================================

struct Entry {
    module: String,
    builder: Arc<dyn CommandBuilder>,
}

/// Catalog of command builders.
pub struct Registry {
    entries: RwLock<Vec<Entry>>,
    cache: RwLock<HashMap<Vec<String>, Arc<BuilderSet>>>,
}

/// Distinct import sets kept before the discovery cache is reset.
const MAX_CACHED_SETS: usize = 64;

static GLOBAL: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::with_builtins()));

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("registry lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("registry lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("builders", &read(&self.entries).len())
            .field("cached_sets", &read(&self.cache).len())
            .finish()
    }
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// A registry preloaded with the control-flow and standard library builders.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::flow::register_builtins(&registry);
        crate::stdlib::register_builtins(&registry);
        registry
    }

    /// Process-wide registry, created with the built-ins on first use.
    pub fn global() -> Arc<Registry> {
        Arc::clone(&GLOBAL)
    }

    /// Add a builder under `module_path` (`a::b` or `a.b`).
    pub fn register(&self, module_path: &str, builder: impl CommandBuilder + 'static) {
        self.register_arc(module_path, Arc::new(builder));
    }

    pub fn register_arc(&self, module_path: &str, builder: Arc<dyn CommandBuilder>) {
        let module = pattern::normalize(module_path);
        tracing::debug!(module = %module, names = ?builder.names(), "registering command builder");
        let mut entries = write(&self.entries);
        entries.push(Entry { module, builder });
        // cleared while entries are still locked so no discovery can cache a stale set
        write(&self.cache).clear();
    }

    /// Resolve the builders visible through `import_specs`.
    ///
    /// When two visible builders claim the same name the later registration
    /// wins.
    pub fn discover(&self, import_specs: &[String]) -> Arc<BuilderSet> {
        let key: Vec<String> = import_specs.iter().map(|s| pattern::normalize(s)).collect();
        if let Some(set) = read(&self.cache).get(&key) {
            return Arc::clone(set);
        }

        let patterns: Vec<ImportPattern> = key.iter().map(|s| ImportPattern::parse(s)).collect();
        let entries = read(&self.entries);
        let mut set = BuilderSet::new();
        for entry in entries.iter() {
            for name in entry.builder.names() {
                let visible = patterns
                    .iter()
                    .any(|p| p.matches_module(&entry.module) || p.matches_command(&entry.module, name));
                if !visible {
                    continue;
                }
                if set.insert(name.to_string(), Arc::clone(&entry.builder)).is_some() {
                    tracing::warn!(
                        command = %name,
                        module = %entry.module,
                        "duplicate command builder name, last registration wins"
                    );
                }
            }
        }

        let set = Arc::new(set);
        let mut cache = write(&self.cache);
        if cache.len() >= MAX_CACHED_SETS {
            cache.clear();
        }
        cache.insert(key, Arc::clone(&set));
        set
    }

    /// Command names visible through `import_specs`, with the module that provides each.
    pub fn list(&self, import_specs: &[String]) -> BTreeMap<String, String> {
        let patterns: Vec<ImportPattern> = import_specs
            .iter()
            .map(|s| ImportPattern::parse(&pattern::normalize(s)))
            .collect();
        let mut out = BTreeMap::new();
        for entry in read(&self.entries).iter() {
            for name in entry.builder.names() {
                if patterns
                    .iter()
                    .any(|p| p.matches_module(&entry.module) || p.matches_command(&entry.module, name))
                {
                    out.insert(name.to_string(), entry.module.clone());
                }
            }
        }
        out
    }

    /// Number of cached discovery results.
    pub fn cached_sets(&self) -> usize {
        read(&self.cache).len()
    }
}

/// `DEFAULT_IMPORTS` as owned strings.
pub fn default_imports() -> Vec<String> {
    DEFAULT_IMPORTS.iter().map(|s| s.to_string()).collect()
}
