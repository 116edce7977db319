//! The public entry point: a backend chain plus a module cache.

use std::path::Path;

use petgraph::graph::NodeIndex;
use thicket_core::dependency::{Address, DependencyDescriptor, ModuleId};
use thicket_core::manifest::PackageManifest;

use crate::backend::Backend;
use crate::cache::ModuleCache;
use crate::engine::{Engine, EngineOptions};
use crate::error::ResolveError;
use crate::graph::{Module, ModuleGraph};

/// The graph built by one resolver call and the nodes that were asked for.
#[derive(Debug)]
pub struct Resolution {
    pub graph: ModuleGraph,
    pub roots: Vec<NodeIndex>,
}

impl Resolution {
    /// Tree listing of every root, one after another.
    pub fn render(&self) -> String {
        self.roots.iter().map(|&r| self.graph.render(r)).collect()
    }

    pub fn root_modules(&self) -> impl Iterator<Item = &Module> {
        self.roots.iter().map(|&r| self.graph.module(r))
    }
}

pub struct Resolver {
    backends: Vec<Box<dyn Backend>>,
    cache: ModuleCache,
    options: EngineOptions,
}

impl Resolver {
    pub fn new(cache: ModuleCache, backends: Vec<Box<dyn Backend>>) -> Self {
        Self {
            backends,
            cache,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Resolve a command-line address such as `jquery/1.8.3`.
    pub fn resolve_path(&mut self, address: &str) -> Result<Resolution, ResolveError> {
        let parsed = Address::parse(address).ok_or_else(|| ResolveError::Address {
            address: address.to_string(),
        })?;
        self.resolve_address(&parsed)
    }

    pub fn resolve_address(&mut self, address: &Address) -> Result<Resolution, ResolveError> {
        self.resolve_all(std::slice::from_ref(address))
    }

    /// Resolve several addresses into one graph.
    ///
    /// An explicit backend in an address restricts that address to the named
    /// backend; otherwise every capable backend is tried in chain order.
    pub fn resolve_all(&mut self, addresses: &[Address]) -> Result<Resolution, ResolveError> {
        let mut engine = Engine::new(&self.backends, &mut self.cache, self.options);
        let mut roots = Vec::new();
        for address in addresses {
            let descriptor = address.descriptor();
            let idx = resolve_root(&mut engine, &descriptor, address.backend.as_deref())?;
            if !roots.contains(&idx) {
                roots.push(idx);
            }
        }
        Ok(Resolution {
            graph: engine.into_graph(),
            roots,
        })
    }

    pub fn resolve(&mut self, descriptor: &DependencyDescriptor) -> Result<Resolution, ResolveError> {
        let mut engine = Engine::new(&self.backends, &mut self.cache, self.options);
        let root = resolve_root(&mut engine, descriptor, None)?;
        Ok(Resolution {
            graph: engine.into_graph(),
            roots: vec![root],
        })
    }

    /// Resolve the dependencies of a project `package.json`.
    ///
    /// The project becomes a synthetic root node (empty namespace) whose home
    /// is the manifest's directory; it is never fetched, validated or cached.
    pub fn resolve_manifest(&mut self, path: &Path) -> Result<Resolution, ResolveError> {
        let manifest = PackageManifest::load(path).map_err(|e| ResolveError::Manifest {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let home = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let name = match manifest.name.trim() {
            "" => "project",
            name => name,
        };
        let version = match manifest.version.trim() {
            "" => "0.0.0",
            version => version,
        };

        let mut engine = Engine::new(&self.backends, &mut self.cache, self.options);
        let mut children = Vec::new();
        for (dep, expr) in manifest.effective_dependencies() {
            let descriptor = DependencyDescriptor::new(dep, expr).with_origin(path);
            if let Some(idx) = engine.resolve_descriptor(&descriptor, None)? {
                children.push(idx);
            }
        }
        for &child in &children {
            engine.graph_mut().validate(child)?;
        }

        let root = engine.graph_mut().add_module(Module {
            id: ModuleId::new(name, version),
            home,
            main: manifest.main_entry(),
            namespace: String::new(),
        });
        for child in children {
            engine.graph_mut().add_child(root, child);
        }
        tracing::debug!(
            "Resolved {} modules for {}",
            engine.graph().len().saturating_sub(1),
            path.display()
        );
        Ok(Resolution {
            graph: engine.into_graph(),
            roots: vec![root],
        })
    }
}

fn resolve_root(
    engine: &mut Engine<'_>,
    descriptor: &DependencyDescriptor,
    only: Option<&str>,
) -> Result<NodeIndex, ResolveError> {
    tracing::info!("Resolving {descriptor}");
    engine
        .resolve_descriptor(descriptor, only)?
        .ok_or_else(|| ResolveError::unresolved(descriptor.id(), "dependency cycle"))
}
