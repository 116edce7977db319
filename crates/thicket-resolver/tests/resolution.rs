use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use tempfile::TempDir;
use thicket_core::dependency::{Address, DependencyDescriptor, ModuleId};
use thicket_core::manifest::ModuleManifest;
use thicket_resolver::{
    Backend, EngineOptions, FetchedModule, ModuleCache, ResolveError, ResolvedRevision, Resolver,
    VersionRequest,
};

type Log = Rc<RefCell<Vec<String>>>;

#[derive(Clone, Copy)]
enum Broken {
    MissingMain,
    Transport,
}

#[derive(Clone)]
struct Release {
    version: &'static str,
    deps: Vec<(&'static str, &'static str)>,
    broken: Option<Broken>,
}

/// In-memory registry that writes `<name>.js` into the module home.
struct StubBackend {
    name: &'static str,
    packages: BTreeMap<&'static str, Vec<Release>>,
    log: Log,
}

impl StubBackend {
    fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            packages: BTreeMap::new(),
            log: Rc::clone(log),
        }
    }

    fn publish(self, name: &'static str, version: &'static str) -> Self {
        self.publish_with(name, version, &[])
    }

    fn publish_with(
        mut self,
        name: &'static str,
        version: &'static str,
        deps: &[(&'static str, &'static str)],
    ) -> Self {
        self.packages.entry(name).or_default().push(Release {
            version,
            deps: deps.to_vec(),
            broken: None,
        });
        self
    }

    fn publish_broken(mut self, name: &'static str, version: &'static str, broken: Broken) -> Self {
        self.packages.entry(name).or_default().push(Release {
            version,
            deps: Vec::new(),
            broken: Some(broken),
        });
        self
    }
}

impl Backend for StubBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn can_resolve(&self, descriptor: &DependencyDescriptor) -> bool {
        !descriptor.is_url()
    }

    fn do_resolve(
        &self,
        descriptor: &DependencyDescriptor,
        request: &VersionRequest,
    ) -> Result<ResolvedRevision, ResolveError> {
        self.log
            .borrow_mut()
            .push(format!("resolve {}:{descriptor}", self.name));
        let url = format!("stub://{}/{}", self.name, descriptor.name);
        let releases = self
            .packages
            .get(descriptor.name.as_str())
            .ok_or_else(|| ResolveError::NotFound { url: url.clone() })?;
        let version = request
            .select(releases.iter().map(|r| r.version))
            .ok_or_else(|| ResolveError::unresolved(descriptor.id(), "no matches found"))?;
        Ok(ResolvedRevision::new(
            ModuleId::new(&descriptor.name, version),
            format!("{url}/{version}"),
        ))
    }

    fn fetch(&self, revision: &ResolvedRevision, home: &Path) -> Result<FetchedModule, ResolveError> {
        let id = &revision.id;
        self.log.borrow_mut().push(format!("fetch {}:{id}", self.name));
        let release = self.packages[id.name()]
            .iter()
            .find(|r| r.version == id.revision())
            .unwrap()
            .clone();
        match release.broken {
            Some(Broken::Transport) => {
                std::fs::write(home.join("partial.tmp"), "")?;
                return Err(ResolveError::Transport {
                    url: revision.source.clone(),
                    message: "connection reset".into(),
                });
            }
            Some(Broken::MissingMain) => {
                return Ok(FetchedModule {
                    main: "missing.js".into(),
                    ..Default::default()
                });
            }
            None => {}
        }
        let main = format!("{}.js", id.name());
        std::fs::write(home.join(&main), format!("// {id}\n"))?;
        Ok(FetchedModule {
            main,
            dependencies: release
                .deps
                .iter()
                .map(|(n, e)| (n.to_string(), e.to_string()))
                .collect(),
            ..Default::default()
        })
    }
}

fn resolver(cache_dir: &Path, backends: Vec<StubBackend>) -> Resolver {
    let backends: Vec<Box<dyn Backend>> = backends
        .into_iter()
        .map(|b| Box::new(b) as Box<dyn Backend>)
        .collect();
    Resolver::new(ModuleCache::open(cache_dir).unwrap(), backends)
}

fn fetches(log: &Log) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|l| l.starts_with("fetch "))
        .cloned()
        .collect()
}

#[test]
fn resolves_exact_version_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let jam = StubBackend::new("jam", &log)
        .publish("jquery", "1.8.3")
        .publish("jquery", "1.9.0");
    let mut resolver = resolver(tmp.path(), vec![jam]);

    let resolution = resolver.resolve_path("jquery/1.8.3").unwrap();
    let root = resolution.graph.module(resolution.roots[0]);
    assert_eq!(root.id, ModuleId::new("jquery", "1.8.3"));
    assert_eq!(root.main, "jquery.js");
    assert_eq!(root.namespace, "jam");

    let home = tmp.path().join("jam").join("jquery").join("1.8.3");
    assert_eq!(root.home, home);
    assert!(home.join("jquery.js").is_file());
    let manifest = ModuleManifest::read(&home.join("module.json")).unwrap();
    assert_eq!(manifest.name, "jquery");
    assert_eq!(manifest.version, "1.8.3");
    assert_eq!(manifest.main, "jquery.js");
    assert!(manifest.dependencies.is_empty());
}

#[test]
fn latest_picks_highest_version() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let jam = StubBackend::new("jam", &log)
        .publish("jquery", "1.9.0")
        .publish("jquery", "1.10.2")
        .publish("jquery", "2.0.0-beta");
    let mut resolver = resolver(tmp.path(), vec![jam]);

    let resolution = resolver.resolve_path("jquery").unwrap();
    let root = resolution.root_modules().next().unwrap();
    assert_eq!(root.id.revision(), "2.0.0-beta");

    let resolution = resolver.resolve_path("jquery@<1.10.0").unwrap();
    let root = resolution.root_modules().next().unwrap();
    assert_eq!(root.id.revision(), "1.9.0");
}

#[test]
fn each_module_is_fetched_once() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let jam = || {
        StubBackend::new("jam", &log)
            .publish_with("app", "1.0.0", &[("a", "~1.0.0"), ("b", "1.0.0")])
            .publish_with("a", "1.0.0", &[("b", "1.0.0")])
            .publish_with("a", "1.0.2", &[("b", "1.0.0")])
            .publish("b", "1.0.0")
    };

    let mut first = resolver(tmp.path(), vec![jam()]);
    let resolution = first.resolve_path("app/1.0.0").unwrap();
    assert_eq!(
        fetches(&log),
        ["fetch jam:app@1.0.0", "fetch jam:a@1.0.2", "fetch jam:b@1.0.0"]
    );
    let tree = resolution.render();
    assert_eq!(
        tree,
        "app@1.0.0\n\
         ├── a@1.0.2\n\
         │   └── b@1.0.0\n\
         └── b@1.0.0\n"
    );

    let home = tmp.path().join("jam").join("app").join("1.0.0");
    let manifest = ModuleManifest::read(&home.join("module.json")).unwrap();
    let deps: Vec<_> = manifest
        .dependencies
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(deps, [("a", "1.0.2"), ("b", "1.0.0")]);

    // A fresh run over the same cache answers from module.json alone.
    log.borrow_mut().clear();
    let mut second = resolver(tmp.path(), vec![jam()]);
    let again = second.resolve_path("app/1.0.0").unwrap();
    assert!(log.borrow().is_empty());
    assert_eq!(again.render(), tree);
}

#[test]
fn falls_back_past_not_found_backend() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let jam = StubBackend::new("jam", &log);
    let npm = StubBackend::new("npm", &log).publish("left-pad", "1.1.3");
    let mut resolver = resolver(tmp.path(), vec![jam, npm]);

    let resolution = resolver.resolve_path("left-pad").unwrap();
    let root = resolution.root_modules().next().unwrap();
    assert_eq!(root.namespace, "npm");
    assert_eq!(
        root.home,
        tmp.path().join("npm").join("left-pad").join("1.1.3")
    );
    assert_eq!(
        *log.borrow(),
        [
            "resolve jam:left-pad@latest",
            "resolve npm:left-pad@latest",
            "fetch npm:left-pad@1.1.3"
        ]
    );
}

#[test]
fn explicit_backend_is_the_only_one_tried() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let jam = StubBackend::new("jam", &log);
    let npm = StubBackend::new("npm", &log).publish("left-pad", "1.1.3");
    let mut resolver = resolver(tmp.path(), vec![jam, npm]);

    let err = resolver.resolve_path("jam@left-pad/1.1.3").unwrap_err();
    assert!(matches!(err, ResolveError::Unresolved { .. }));
    assert_eq!(*log.borrow(), ["resolve jam:left-pad@1.1.3"]);

    let err = resolver.resolve_path("bower@left-pad/1.1.3").unwrap_err();
    assert!(err.to_string().contains("backend `bower`"));
}

#[test]
fn explicit_backend_ignores_modules_from_other_backends() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let jam = StubBackend::new("jam", &log).publish("x", "1.0.0");
    let npm = StubBackend::new("npm", &log).publish("x", "1.0.0");
    let mut resolver = resolver(tmp.path(), vec![jam, npm]);

    let addresses = [
        Address::parse("x/1.0.0").unwrap(),
        Address::parse("npm@x/1.0.0").unwrap(),
    ];
    let resolution = resolver.resolve_all(&addresses).unwrap();
    let namespaces: Vec<&str> = resolution
        .root_modules()
        .map(|m| m.namespace.as_str())
        .collect();
    assert_eq!(namespaces, ["jam", "npm"]);
    assert_eq!(fetches(&log), ["fetch jam:x@1.0.0", "fetch npm:x@1.0.0"]);
    let npm_home = tmp.path().join("npm").join("x").join("1.0.0");
    assert!(npm_home.join("x.js").is_file());

    // The module the named backend committed is reused without asking it again.
    log.borrow_mut().clear();
    let again = resolver.resolve_path("npm@x/1.0.0").unwrap();
    assert_eq!(again.root_modules().next().unwrap().home, npm_home);
    assert!(log.borrow().is_empty());
}

#[test]
fn failed_module_is_not_fetched_again_in_the_same_run() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let jam = || StubBackend::new("jam", &log).publish_broken("x", "1.0.0", Broken::MissingMain);
    let mut first = resolver(tmp.path(), vec![jam()]);

    let err = first.resolve_path("x/1.0.0").unwrap_err();
    assert!(err.to_string().contains("invalid module x@1.0.0"), "{err}");
    assert!(first.cache().is_tombstoned("jam", &ModuleId::new("x", "1.0.0")));

    let err = first.resolve_path("x/1.0.0").unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("failed earlier in this run"), "{err}");
    assert_eq!(fetches(&log), ["fetch jam:x@1.0.0"]);

    // Tombstones are not persisted: the next run tries again.
    let mut next_run = resolver(tmp.path(), vec![jam()]);
    next_run.resolve_path("x/1.0.0").unwrap_err();
    assert_eq!(fetches(&log), ["fetch jam:x@1.0.0", "fetch jam:x@1.0.0"]);
}

#[test]
fn total_failure_reports_every_attempt() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let jam = StubBackend::new("jam", &log);
    let npm = StubBackend::new("npm", &log).publish("left-pad", "1.1.3");
    let mut resolver = resolver(tmp.path(), vec![jam, npm]);

    let err = resolver.resolve_path("left-pad@>=2.0.0").unwrap_err();
    let message = err.to_string();
    assert!(err.is_not_found());
    assert!(message.contains("left-pad@>=2.0.0"), "{message}");
    assert!(message.contains("jam: stub://jam/left-pad does not exist"), "{message}");
    assert!(message.contains("npm: unable to resolve"), "{message}");
    assert!(fetches(&log).is_empty());
}

#[test]
fn failed_nested_dependency_is_rolled_back() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let jam = StubBackend::new("jam", &log)
        .publish_with("app", "1.0.0", &[("ok", "1.0.0"), ("broken", "1.0.0")])
        .publish("ok", "1.0.0")
        .publish_broken("broken", "1.0.0", Broken::Transport);
    let mut resolver = resolver(tmp.path(), vec![jam]);

    let err = resolver.resolve_path("app/1.0.0").unwrap_err();
    match &err {
        ResolveError::ResolutionPath { path, source } => {
            assert_eq!(path, "app@1.0.0 -> broken@1.0.0");
            assert!(matches!(**source, ResolveError::Transport { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let ns = tmp.path().join("jam");
    assert!(!ns.join("app").exists());
    assert!(!ns.join("broken").exists());
    assert!(ns.join("ok").join("1.0.0").join("module.json").is_file());
    assert!(resolver.cache().committed(&ModuleId::new("app", "1.0.0")).is_none());
}

#[test]
fn integrity_failure_falls_back_to_next_backend() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let jam = StubBackend::new("jam", &log).publish_broken("x", "1.0.0", Broken::MissingMain);
    let npm = StubBackend::new("npm", &log).publish("x", "1.0.0");
    let mut resolver = resolver(tmp.path(), vec![jam, npm]);

    let resolution = resolver.resolve_path("x/1.0.0").unwrap();
    let root = resolution.root_modules().next().unwrap();
    assert_eq!(root.namespace, "npm");
    assert_eq!(fetches(&log), ["fetch jam:x@1.0.0", "fetch npm:x@1.0.0"]);
    assert!(!tmp.path().join("jam").join("x").exists());
}

#[test]
fn cycles_terminate() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let jam = || {
        StubBackend::new("jam", &log)
            .publish_with("a", "1.0.0", &[("b", "1.0.0")])
            .publish_with("b", "1.0.0", &[("a", "1.0.0")])
    };

    let mut first = resolver(tmp.path(), vec![jam()]);
    let resolution = first.resolve_path("a/1.0.0").unwrap();
    assert_eq!(resolution.render(), "a@1.0.0\n└── b@1.0.0\n");
    assert_eq!(fetches(&log).len(), 2);

    let b_home = tmp.path().join("jam").join("b").join("1.0.0");
    let manifest = ModuleManifest::read(&b_home.join("module.json")).unwrap();
    assert_eq!(manifest.dependencies["a"], "1.0.0");

    let mut second = resolver(tmp.path(), vec![jam()]);
    let again = second.resolve_path("a/1.0.0").unwrap();
    assert_eq!(again.render(), "a@1.0.0\n└── b@1.0.0\n");
}

#[test]
fn diamond_is_annotated_and_flattened_first_wins() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let jam = StubBackend::new("jam", &log)
        .publish_with("backbone", "0.9.10", &[("underscore", ">=1.4.3")])
        .publish("underscore", "1.3.3")
        .publish("underscore", "1.4.4");
    let mut resolver = resolver(&tmp.path().join("cache"), vec![jam]);

    let project = tmp.path().join("app");
    std::fs::create_dir_all(&project).unwrap();
    let manifest = project.join("package.json");
    std::fs::write(
        &manifest,
        r#"{
            "name": "app",
            "version": "1.0.0",
            "dependencies": { "backbone": "0.9.10", "underscore": "1.3.3" }
        }"#,
    )
    .unwrap();

    let resolution = resolver.resolve_manifest(&manifest).unwrap();
    assert_eq!(
        resolution.render(),
        "app@1.0.0\n\
         ├── backbone@0.9.10\n\
         │   └── underscore@1.4.4\n\
         └── underscore@1.3.3 (resolved as underscore@1.4.4)\n"
    );
    let root = resolution.root_modules().next().unwrap();
    assert!(root.is_project());
    assert_eq!(root.home, project);

    let out = tmp.path().join("out");
    let written = resolution.graph.flatten(resolution.roots[0], &out).unwrap();
    assert_eq!(
        written,
        [out.join("backbone-0.9.10.js"), out.join("underscore-1.4.4.js")]
    );
    assert_eq!(
        std::fs::read_to_string(out.join("underscore-1.4.4.js")).unwrap(),
        "// underscore@1.4.4\n"
    );
}

#[test]
fn project_named_like_its_dependency_keeps_its_own_root() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let jam = StubBackend::new("jam", &log).publish("app", "1.0.0");
    let mut resolver = resolver(&tmp.path().join("cache"), vec![jam]);

    let project = tmp.path().join("app");
    std::fs::create_dir_all(&project).unwrap();
    let manifest = project.join("package.json");
    std::fs::write(
        &manifest,
        r#"{"name": "app", "version": "1.0.0", "dependencies": {"app": "1.0.0"}}"#,
    )
    .unwrap();

    let resolution = resolver.resolve_manifest(&manifest).unwrap();
    let root = resolution.root_modules().next().unwrap();
    assert!(root.is_project());
    assert_eq!(root.home, project);
    assert_eq!(resolution.render(), "app@1.0.0\n└── app@1.0.0\n");
    let children = resolution.graph.children(resolution.roots[0]);
    assert_eq!(resolution.graph.module(children[0]).namespace, "jam");
}

#[test]
fn offline_answers_from_cache_only() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let jam = || StubBackend::new("jam", &log).publish("jquery", "1.8.3");

    resolver(tmp.path(), vec![jam()])
        .resolve_path("jquery/1.8.3")
        .unwrap();
    log.borrow_mut().clear();

    let mut offline =
        resolver(tmp.path(), vec![jam()]).with_options(EngineOptions { offline: true });
    let resolution = offline.resolve_path("jquery@~1.8").unwrap();
    assert_eq!(
        resolution.root_modules().next().unwrap().id,
        ModuleId::new("jquery", "1.8.3")
    );
    assert!(log.borrow().is_empty());

    let err = offline.resolve_path("zepto").unwrap_err();
    assert!(err.to_string().contains("offline"));
    assert!(log.borrow().is_empty());
}

#[test]
fn malformed_expression_is_a_parse_error() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let mut resolver = resolver(tmp.path(), vec![StubBackend::new("jam", &log)]);

    let err = resolver.resolve_path("jquery@>>1").unwrap_err();
    assert!(matches!(err, ResolveError::Parse(_)));
    assert!(log.borrow().is_empty());
}

#[test]
fn empty_address_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let mut resolver = resolver(tmp.path(), vec![StubBackend::new("jam", &log)]);

    let err = resolver.resolve_path("  ").unwrap_err();
    assert!(matches!(err, ResolveError::Address { .. }));
}
