//! Configuration → command tree.
//!
//! ```text
//! { "morphlines": [ { "id": "m1", "importCommands": [...], "commands": [ {name: {opts}}, ... ] } ] }
//!                                                            │
//!                                     Registry::discover ────┤
//!                                                            ▼
//!                                      CommandBuilder::build (children first)
//!                                                            │
//!                                                            ▼
//!                                           Morphline { Pipe [cmd, cmd, ...] }
//! ```

use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::Arc;

use crate::command::{Command, Sink};
use crate::config::{load_document, ConfigNode, Variables};
use crate::context::MorphlineContext;
use crate::error::{CompileError, CompileResult};
use crate::flow::pipe::Pipe;
use crate::morphline::Morphline;
use crate::registry::{default_imports, BuildScope, BuilderSet};

/// Options understood on a morphline node.
const MORPHLINE_KEYS: &[&str] = &["id", "importCommands", "commands"];

/// Default id of a morphline that declares none.
pub const DEFAULT_MORPHLINE_ID: &str = "morphline";

/// Builds command trees from configuration nodes.
///
/// Handed to every [`CommandBuilder`](crate::registry::CommandBuilder) so
/// that control-flow builders can compile their nested command lists.
pub struct Compiler {
    context: Arc<MorphlineContext>,
    import_specs: Vec<String>,
    builders: Arc<BuilderSet>,
    num_built: usize,
}

impl Compiler {
    /// A compiler seeing the builders selected by `import_specs`.
    pub fn new(context: Arc<MorphlineContext>, import_specs: Vec<String>) -> Self {
        let builders = context.registry().discover(&import_specs);
        Self {
            context,
            import_specs,
            builders,
            num_built: 0,
        }
    }

    pub fn context(&self) -> &Arc<MorphlineContext> {
        &self.context
    }

    pub fn import_specs(&self) -> &[String] {
        &self.import_specs
    }

    /// Number of commands built so far, nested ones included.
    pub fn num_built(&self) -> usize {
        self.num_built
    }

    /// A compiler for a nested scope that declares its own `importCommands`.
    pub fn nested(&self, import_specs: Vec<String>) -> Compiler {
        Compiler::new(Arc::clone(&self.context), import_specs)
    }

    /// Build one `{ name: { options } }` node.
    pub fn build_command(&mut self, node: &ConfigNode, parent: &BuildScope) -> CompileResult<Box<dyn Command>> {
        let Some(obj) = node.as_object() else {
            return Err(CompileError::InvalidCommand {
                path: node.path().to_string(),
                message: "expected an object of the form { commandName: { ... } }".to_string(),
            });
        };
        if obj.len() != 1 {
            return Err(CompileError::InvalidCommand {
                path: node.path().to_string(),
                message: format!("expected exactly one command name, found {}", obj.len()),
            });
        }

        let (name, options) = node
            .entries()
            .into_iter()
            .next()
            .ok_or_else(|| CompileError::InvalidCommand {
                path: node.path().to_string(),
                message: "empty command definition".to_string(),
            })?;

        let options = match options.value() {
            JsonValue::Null => ConfigNode::empty(options.path()),
            JsonValue::Object(_) => options,
            _ => {
                return Err(CompileError::InvalidCommand {
                    path: options.path().to_string(),
                    message: format!("options of '{}' must be an object", name),
                })
            }
        };

        let builder = self
            .builders
            .get(&name)
            .cloned()
            .ok_or_else(|| CompileError::UnknownCommand {
                name: name.clone(),
                imports: self.import_specs.clone(),
            })?;

        let scope = parent.child(&name);
        tracing::debug!(command = %name, parent = %scope.parent(), path = %scope.path(), "building command");
        let command = builder.build(&options, &scope, self)?;
        self.num_built += 1;
        Ok(command)
    }

    /// Build every node of a list, in order.
    pub fn build_commands(&mut self, nodes: &[ConfigNode], parent: &BuildScope) -> CompileResult<Vec<Box<dyn Command>>> {
        nodes.iter().map(|n| self.build_command(n, parent)).collect()
    }

    /// Build the list under `key` of `config`; an absent key yields no commands.
    pub fn build_list(
        &mut self,
        config: &ConfigNode,
        key: &str,
        parent: &BuildScope,
    ) -> CompileResult<Vec<Box<dyn Command>>> {
        match config.get_opt_list(key)? {
            Some(nodes) => self.build_commands(&nodes, parent),
            None => Ok(Vec::new()),
        }
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Pick the morphline node to compile out of `document`.
fn select_morphline(document: &JsonValue, morphline_id: Option<&str>) -> CompileResult<ConfigNode> {
    let root = ConfigNode::new("root", document.clone());

    if root.has("morphlines") {
        let candidates = root.get_list("morphlines")?;
        if candidates.is_empty() {
            return Err(CompileError::EmptyDocument);
        }
        return match morphline_id {
            None => Ok(candidates[0].clone()),
            Some(id) => candidates
                .into_iter()
                .find(|c| c.get_opt_string("id").ok().flatten().as_deref() == Some(id))
                .ok_or_else(|| CompileError::MorphlineNotFound(id.to_string())),
        };
    }

    if !root.has("commands") {
        return Err(CompileError::EmptyDocument);
    }
    if let Some(id) = morphline_id {
        let own = root.get_string_or("id", DEFAULT_MORPHLINE_ID)?;
        if own != id {
            return Err(CompileError::MorphlineNotFound(id.to_string()));
        }
    }
    Ok(root)
}

/// Compile a morphline out of a parsed document.
///
/// `document` is either `{ "morphlines": [...] }` (pick by `morphline_id`,
/// or the first one) or a single morphline node.
pub fn compile(
    document: &JsonValue,
    morphline_id: Option<&str>,
    sink: Box<dyn Sink>,
    context: Arc<MorphlineContext>,
) -> CompileResult<Morphline> {
    let node = select_morphline(document, morphline_id)?;
    node.validate_keys(MORPHLINE_KEYS)?;

    let id = node.get_string_or("id", DEFAULT_MORPHLINE_ID)?;
    let imports = node
        .get_opt_string_list("importCommands")?
        .unwrap_or_else(default_imports);

    let mut compiler = Compiler::new(Arc::clone(&context), imports);
    let scope = BuildScope::root(&id);
    let commands = compiler.build_list(&node, "commands", &scope)?;

    tracing::debug!(
        morphline = %id,
        top_level = commands.len(),
        total = compiler.num_built(),
        "compiled morphline"
    );

    let pipe = Pipe::unmetered(&id, commands);
    Ok(Morphline::new(id, pipe, sink, context))
}

/// Load `path` (JSON or TOML), resolve `${VARS}` from `variables`, then compile.
pub fn compile_file(
    path: &Path,
    morphline_id: Option<&str>,
    variables: &Variables,
    sink: Box<dyn Sink>,
    context: Arc<MorphlineContext>,
) -> CompileResult<Morphline> {
    let document = load_document(path, variables)?;
    compile(&document, morphline_id, sink, context)
}
