//! Depth-first resolution of one request and everything it depends on.
//!
//! An [`Engine`] lives for one resolver call. It borrows the backend chain and
//! the cache, and owns the graph being built plus the bookkeeping that keeps
//! the walk finite:
//!
//! * `in_flight` holds symbolic (`name@expr`) and concrete (`name@version`)
//!   keys currently being resolved; meeting one again means a cycle, and the
//!   dependency is treated as already satisfied.
//! * `memo` maps finished symbolic keys to their node so diamonds share it.
//!   Requests restricted to one backend are memoized under `<backend>:<key>`.
//! * `path` is the chain of concrete ids used in error messages.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use indexmap::IndexMap;
use petgraph::graph::NodeIndex;
use thicket_core::dependency::{DependencyDescriptor, ModuleId};
use thicket_core::manifest::ModuleManifest;
use thicket_util::fs::{ensure_dir, remove_home_and_empty_parent};

use crate::backend::{Backend, ResolvedRevision};
use crate::cache::{CachedModule, ModuleCache};
use crate::error::ResolveError;
use crate::expression::VersionRequest;
use crate::graph::{validate_entry, Module, ModuleGraph};

/// Knobs that change how the engine reaches backends.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// Answer only from the cache; never call `do_resolve` or `fetch`.
    pub offline: bool,
}

pub(crate) struct Engine<'r> {
    backends: &'r [Box<dyn Backend>],
    cache: &'r mut ModuleCache,
    options: EngineOptions,
    graph: ModuleGraph,
    in_flight: HashSet<String>,
    memo: HashMap<String, NodeIndex>,
    path: Vec<String>,
}

impl<'r> Engine<'r> {
    pub(crate) fn new(
        backends: &'r [Box<dyn Backend>],
        cache: &'r mut ModuleCache,
        options: EngineOptions,
    ) -> Self {
        Self {
            backends,
            cache,
            options,
            graph: ModuleGraph::new(),
            in_flight: HashSet::new(),
            memo: HashMap::new(),
            path: Vec::new(),
        }
    }

    pub(crate) fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut ModuleGraph {
        &mut self.graph
    }

    pub(crate) fn into_graph(self) -> ModuleGraph {
        self.graph
    }

    /// Resolve `descriptor`, trying each capable backend in chain order.
    ///
    /// With `only` set, just the backend of that name is considered and only
    /// modules from its namespace are reused. Returns `Ok(None)` when the
    /// descriptor is already being resolved higher up.
    pub(crate) fn resolve_descriptor(
        &mut self,
        descriptor: &DependencyDescriptor,
        only: Option<&str>,
    ) -> Result<Option<NodeIndex>, ResolveError> {
        let key = descriptor.id();
        let memo_key = match only {
            Some(name) => format!("{name}:{key}"),
            None => key.clone(),
        };
        if let Some(&idx) = self.memo.get(&memo_key) {
            return Ok(Some(idx));
        }
        if self.in_flight.contains(&key) {
            tracing::debug!("{key} is already being resolved, skipping");
            return Ok(None);
        }

        let request = VersionRequest::parse(&descriptor.version)?;

        if let Some(version) = request.pinned() {
            let id = ModuleId::new(&descriptor.name, version.as_str());
            if let Some(idx) = self.materialize(&id, only)? {
                self.memo.insert(memo_key, idx);
                return Ok(Some(idx));
            }
        }

        let backends = self.backends;
        let capable: Vec<&dyn Backend> = backends
            .iter()
            .map(|b| b.as_ref())
            .filter(|b| only.map_or(true, |name| b.name() == name))
            .filter(|b| b.can_resolve(descriptor))
            .collect();
        if capable.is_empty() {
            let reason = match only {
                Some(name) => format!("backend `{name}` is not configured or cannot resolve it"),
                None => "no configured backend can resolve it".to_string(),
            };
            return Err(ResolveError::unresolved(key, reason));
        }

        self.in_flight.insert(key.clone());
        let mut attempts = Vec::new();
        for backend in capable {
            match self.resolve_with(backend, descriptor, &request, only.is_some()) {
                Ok(Some(idx)) => {
                    self.in_flight.remove(&key);
                    self.memo.insert(memo_key, idx);
                    return Ok(Some(idx));
                }
                Ok(None) => {
                    self.in_flight.remove(&key);
                    return Ok(None);
                }
                Err(e) if e.is_not_found() => {
                    tracing::debug!("{} could not resolve {key}: {e}", backend.name());
                    attempts.push(format!("{}: {e}", backend.name()));
                }
                Err(e) => {
                    self.in_flight.remove(&key);
                    return Err(e);
                }
            }
        }
        self.in_flight.remove(&key);
        Err(ResolveError::unresolved(
            key,
            format!("tried [{}]", attempts.join("; ")),
        ))
    }

    /// `explicit` restricts cache reuse to modules `backend` itself committed.
    fn resolve_with(
        &mut self,
        backend: &dyn Backend,
        descriptor: &DependencyDescriptor,
        request: &VersionRequest,
        explicit: bool,
    ) -> Result<Option<NodeIndex>, ResolveError> {
        let revision = if self.options.offline {
            match backend.resolve_local(self.cache, descriptor, request) {
                Some(id) => ResolvedRevision::new(id, ""),
                None => {
                    return Err(ResolveError::unresolved(
                        descriptor.id(),
                        "no matching version in the cache (offline)",
                    ))
                }
            }
        } else {
            backend.do_resolve(descriptor, request)?
        };

        let id = revision.id.clone();
        let namespace = explicit.then(|| backend.name());
        if let Some(idx) = self.materialize(&id, namespace)? {
            return Ok(Some(idx));
        }
        if self.cache.is_tombstoned(backend.name(), &id) {
            return Err(ResolveError::unresolved(
                id.to_string(),
                "failed earlier in this run",
            ));
        }
        if self.options.offline {
            return Err(ResolveError::unresolved(
                id.to_string(),
                "not in the cache (offline)",
            ));
        }

        let concrete = id.to_string();
        let owned = self.in_flight.insert(concrete.clone());
        if !owned && concrete != descriptor.id() {
            tracing::debug!("{concrete} is already being resolved, skipping");
            return Ok(None);
        }

        self.path.push(concrete.clone());
        let home = self.cache.module_home(backend.name(), &id);
        let result = match self.fetch_and_commit(backend, &revision, &home) {
            Ok(idx) => Ok(Some(idx)),
            Err(e) => {
                let e = e.with_path(&self.path);
                if let Err(cleanup) = remove_home_and_empty_parent(&home) {
                    tracing::warn!("Failed to remove {}: {cleanup}", home.display());
                }
                self.cache.tombstone(backend.name(), id);
                Err(e)
            }
        };
        self.path.pop();
        if owned {
            self.in_flight.remove(&concrete);
        }
        result
    }

    fn fetch_and_commit(
        &mut self,
        backend: &dyn Backend,
        revision: &ResolvedRevision,
        home: &Path,
    ) -> Result<NodeIndex, ResolveError> {
        let id = &revision.id;
        ensure_dir(home)?;
        tracing::info!("Fetching {id} from {}", backend.name());
        let fetched = backend.fetch(revision, home)?;
        let main = validate_entry(id, home, &fetched.main)?;

        let mut children = Vec::new();
        let mut resolved = IndexMap::new();
        for (name, expr) in &fetched.dependencies {
            let child = DependencyDescriptor::new(name, expr).with_origin(home);
            match self.resolve_descriptor(&child, None)? {
                Some(idx) => {
                    let revision = self.graph.module(idx).id.revision().to_string();
                    resolved.insert(name.clone(), revision);
                    children.push(idx);
                }
                None => {
                    resolved.insert(name.clone(), expr.clone());
                }
            }
        }
        for &child in &children {
            self.graph.validate(child)?;
        }

        let manifest = ModuleManifest {
            name: id.name().to_string(),
            version: id.revision().to_string(),
            main: main.clone(),
            dependencies: resolved,
            sha256: fetched.sha256.clone(),
        };
        self.cache.commit(
            id.clone(),
            CachedModule {
                namespace: backend.name().to_string(),
                home: home.to_path_buf(),
                manifest,
            },
        )?;

        let idx = self.graph.add_module(Module {
            id: id.clone(),
            home: home.to_path_buf(),
            main,
            namespace: backend.name().to_string(),
        });
        for child in children {
            self.graph.add_child(idx, child);
        }
        Ok(idx)
    }

    /// The node for a committed module, building it and its children from the
    /// cache on first use. `None` when `id` is not committed, or was committed
    /// by a namespace other than `namespace` when one is required.
    fn materialize(
        &mut self,
        id: &ModuleId,
        namespace: Option<&str>,
    ) -> Result<Option<NodeIndex>, ResolveError> {
        let Some(cached) = self.cache.committed(id).cloned() else {
            return Ok(None);
        };
        if namespace.is_some_and(|ns| ns != cached.namespace) {
            return Ok(None);
        }
        if let Some(idx) = self.graph.find(&cached.namespace, id) {
            return Ok(Some(idx));
        }
        tracing::debug!("Using cached {id}");

        let key = id.to_string();
        let owned = self.in_flight.insert(key.clone());
        let mut children = Vec::new();
        for (name, revision) in &cached.manifest.dependencies {
            let child = DependencyDescriptor::new(name, revision).with_origin(&cached.home);
            let outcome = self.resolve_descriptor(&child, None);
            match outcome {
                Ok(Some(idx)) => children.push(idx),
                Ok(None) => {}
                Err(e) => {
                    if owned {
                        self.in_flight.remove(&key);
                    }
                    return Err(e);
                }
            }
        }
        if owned {
            self.in_flight.remove(&key);
        }

        let idx = self.graph.add_module(Module {
            id: id.clone(),
            home: cached.home,
            main: cached.manifest.main,
            namespace: cached.namespace,
        });
        for child in children {
            self.graph.add_child(idx, child);
        }
        Ok(Some(idx))
    }
}
