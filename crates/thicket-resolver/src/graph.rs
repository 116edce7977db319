//! The resolved module graph and its traversals.
//!
//! Modules live in a petgraph arena; a module shared by several parents is a
//! single node with several incoming edges. Children keep insertion order and
//! are unique by name. Every traversal carries an on-path guard so cycles are
//! never followed.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use thicket_core::dependency::{url_file_name, ModuleId};
use thicket_util::fs::{ensure_dir, find_file};

use crate::error::ResolveError;

/// One resolved module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub id: ModuleId,
    /// Directory holding the module's content.
    pub home: PathBuf,
    /// Entry file, relative to `home`.
    pub main: String,
    /// Backend namespace the module was fetched through; empty for project roots.
    pub namespace: String,
}

impl Module {
    pub fn entry_path(&self) -> PathBuf {
        self.home.join(&self.main)
    }

    /// `true` for the synthetic node standing for a project manifest.
    pub fn is_project(&self) -> bool {
        self.namespace.is_empty()
    }

    /// File name used when the module is flattened into one directory.
    pub fn flat_file_name(&self) -> String {
        if self.id.is_url_revision() {
            if let Some(file) = url_file_name(self.id.revision()) {
                return file.to_string();
            }
        }
        format!("{}-{}.js", self.id.name(), self.id.revision())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Position of a node in a depth-first walk.
#[derive(Debug, Clone, Copy)]
pub struct VisitContext {
    pub depth: usize,
    /// Last child of its parent.
    pub is_last: bool,
}

/// Callbacks for [`ModuleGraph::traverse`].
pub trait ModuleVisitor {
    /// Called before the node's children.
    fn visit(&mut self, graph: &ModuleGraph, idx: NodeIndex, ctx: VisitContext);

    /// Called after the node's children.
    fn end_visit(&mut self, _graph: &ModuleGraph, _idx: NodeIndex, _ctx: VisitContext) {}
}

#[derive(Debug, Default)]
pub struct ModuleGraph {
    graph: DiGraph<Module, ()>,
    /// Keyed by namespace and id: the same id from two backends, or a project
    /// named like one of its dependencies, gets two nodes.
    index: HashMap<(String, ModuleId), NodeIndex>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module, or return the existing node with the same namespace and id.
    pub fn add_module(&mut self, module: Module) -> NodeIndex {
        let key = (module.namespace.clone(), module.id.clone());
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(module);
        self.index.insert(key, idx);
        idx
    }

    /// Attach `child` under `parent`. Returns `false` when `parent` already has
    /// a child with the same name.
    pub fn add_child(&mut self, parent: NodeIndex, child: NodeIndex) -> bool {
        let name = self.graph[child].id.name().to_string();
        let taken = self
            .graph
            .edges(parent)
            .any(|e| self.graph[e.target()].id.name() == name);
        if taken {
            return false;
        }
        self.graph.add_edge(parent, child, ());
        true
    }

    pub fn find(&self, namespace: &str, id: &ModuleId) -> Option<NodeIndex> {
        self.index
            .get(&(namespace.to_string(), id.clone()))
            .copied()
    }

    pub fn module(&self, idx: NodeIndex) -> &Module {
        &self.graph[idx]
    }

    /// Children in the order they were attached.
    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .graph
            .edges(idx)
            .map(|e| (e.id(), e.target()))
            .collect();
        edges.sort_by_key(|(edge, _)| *edge);
        edges.into_iter().map(|(_, target)| target).collect()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.graph.node_weights()
    }

    /// Depth-first walk from `root`: `visit` before children, `end_visit`
    /// after. A node already on the current path is skipped.
    pub fn traverse<V: ModuleVisitor>(&self, root: NodeIndex, visitor: &mut V) {
        let mut on_path = HashSet::new();
        self.walk(
            root,
            VisitContext {
                depth: 0,
                is_last: true,
            },
            visitor,
            &mut on_path,
        );
    }

    fn walk<V: ModuleVisitor>(
        &self,
        idx: NodeIndex,
        ctx: VisitContext,
        visitor: &mut V,
        on_path: &mut HashSet<NodeIndex>,
    ) {
        if !on_path.insert(idx) {
            return;
        }
        visitor.visit(self, idx, ctx);
        let children: Vec<NodeIndex> = self
            .children(idx)
            .into_iter()
            .filter(|c| !on_path.contains(c))
            .collect();
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            let child_ctx = VisitContext {
                depth: ctx.depth + 1,
                is_last: i + 1 == count,
            };
            self.walk(child, child_ctx, visitor, on_path);
        }
        visitor.end_visit(self, idx, ctx);
        on_path.remove(&idx);
    }

    /// Indented tree listing. A module whose name was already listed at a
    /// different revision is annotated with `(resolved as name@rev)`.
    pub fn render(&self, root: NodeIndex) -> String {
        let mut renderer = TreeRenderer::default();
        self.traverse(root, &mut renderer);
        renderer.output
    }

    /// Copy every entry file reachable from `root` into `out_dir`.
    ///
    /// Only the first version met for each name is copied. Project roots are
    /// skipped. Returns the written paths in tree order.
    pub fn flatten(&self, root: NodeIndex, out_dir: &Path) -> Result<Vec<PathBuf>, ResolveError> {
        ensure_dir(out_dir)?;
        let mut flattener = Flattener {
            out_dir,
            seen: HashSet::new(),
            written: Vec::new(),
            error: None,
        };
        self.traverse(root, &mut flattener);
        match flattener.error {
            Some(e) => Err(e),
            None => Ok(flattener.written),
        }
    }

    /// Check the entry file of every module reachable from `root`, replacing
    /// `main` where a fallback file was found.
    pub fn validate(&mut self, root: NodeIndex) -> Result<(), ResolveError> {
        let mut collector = Collector::default();
        self.traverse(root, &mut collector);
        for idx in collector.nodes {
            let module = &self.graph[idx];
            if module.is_project() {
                continue;
            }
            let main = validate_entry(&module.id, &module.home, &module.main)?;
            if main != self.graph[idx].main {
                tracing::debug!("Entry file of {} is {main}", self.graph[idx].id);
                self.graph[idx].main = main;
            }
        }
        Ok(())
    }
}

/// Confirm that `main` exists under `home`.
///
/// When it does not, search `home` for `<name>.js` and then
/// `<name>-<revision>.js`; the first hit becomes the entry file.
pub fn validate_entry(id: &ModuleId, home: &Path, main: &str) -> Result<String, ResolveError> {
    if home.join(main).is_file() {
        return Ok(main.to_string());
    }
    let fallbacks = [
        format!("{}.js", id.name()),
        format!("{}-{}.js", id.name(), id.revision()),
    ];
    for candidate in &fallbacks {
        if let Some(found) = find_file(home, candidate)? {
            return Ok(found.to_string_lossy().replace('\\', "/"));
        }
    }
    Err(ResolveError::Integrity {
        id: id.to_string(),
        message: format!("entry file not found: {}", home.join(main).display()),
    })
}

#[derive(Default)]
struct TreeRenderer {
    output: String,
    /// `is_last` of every ancestor below the root.
    stack: Vec<bool>,
    first_seen: HashMap<String, ModuleId>,
}

impl ModuleVisitor for TreeRenderer {
    fn visit(&mut self, graph: &ModuleGraph, idx: NodeIndex, ctx: VisitContext) {
        let module = graph.module(idx);
        if ctx.depth > 0 {
            for last in &self.stack {
                self.output.push_str(if *last { "    " } else { "│   " });
            }
            self.output
                .push_str(if ctx.is_last { "└── " } else { "├── " });
        }
        self.output.push_str(&module.id.to_string());

        let first = self
            .first_seen
            .entry(module.id.name().to_string())
            .or_insert_with(|| module.id.clone());
        if *first != module.id {
            self.output.push_str(&format!(" (resolved as {first})"));
        }
        self.output.push('\n');

        if ctx.depth > 0 {
            self.stack.push(ctx.is_last);
        }
    }

    fn end_visit(&mut self, _graph: &ModuleGraph, _idx: NodeIndex, ctx: VisitContext) {
        if ctx.depth > 0 {
            self.stack.pop();
        }
    }
}

struct Flattener<'a> {
    out_dir: &'a Path,
    seen: HashSet<String>,
    written: Vec<PathBuf>,
    error: Option<ResolveError>,
}

impl ModuleVisitor for Flattener<'_> {
    fn visit(&mut self, graph: &ModuleGraph, idx: NodeIndex, _ctx: VisitContext) {
        let module = graph.module(idx);
        if self.error.is_some() || module.is_project() {
            return;
        }
        if !self.seen.insert(module.id.name().to_string()) {
            return;
        }
        let target = self.out_dir.join(module.flat_file_name());
        match std::fs::copy(module.entry_path(), &target) {
            Ok(_) => self.written.push(target),
            Err(e) => self.error = Some(ResolveError::Io(e)),
        }
    }
}

#[derive(Default)]
struct Collector {
    visited: HashSet<NodeIndex>,
    nodes: Vec<NodeIndex>,
}

impl ModuleVisitor for Collector {
    fn visit(&mut self, _graph: &ModuleGraph, idx: NodeIndex, _ctx: VisitContext) {
        if self.visited.insert(idx) {
            self.nodes.push(idx);
        }
    }
}
