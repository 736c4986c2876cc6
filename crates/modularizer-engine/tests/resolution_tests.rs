//! Integration tests for the resolution engine
//!
//! Each test builds a registry from a class list and runs the engine over a
//! TOML config.

use modularizer_engine::{
    build_modules, BuildError, BuildOutcome, ClassList, ConfigFile, UnitRegistry,
};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

fn run(config: &str, classes: &str, merge: bool) -> Result<(BuildOutcome, UnitRegistry), BuildError> {
    let config = ConfigFile::from_str(config).unwrap();
    let mut registry = UnitRegistry::new();
    let list = ClassList::from_str(classes, &mut registry).unwrap();
    let outcome = build_modules(&config, &mut registry, list.optional, merge)?;
    Ok((outcome, registry))
}

fn build(config: &str, classes: &str) -> (BuildOutcome, UnitRegistry) {
    run(config, classes, true).unwrap()
}

const FOO_BAR: &str = r#"
[[module]]
name = "foo"
roots = ["com.foo.*"]

[[module]]
name = "bar"
roots = ["com.bar.*"]
"#;

#[test]
fn test_foo_requires_bar() {
    let (outcome, registry) = build(
        FOO_BAR,
        "class com.foo.Main public\nclass com.bar.Helper\ncom.foo.Main -> com.bar.Helper\n",
    );

    let bar = outcome.module_info("bar").unwrap();
    assert!(bar.requires().is_empty());

    let foo = outcome.module_info("foo").unwrap();
    assert_eq!(foo.requires().len(), 1);
    let dep = &foo.requires()[0];
    assert_eq!(dep.module_name(), "bar");
    assert!(!dep.is_optional());
    assert_eq!(dep.view(), Some("bar"));

    assert_eq!(outcome.ordered_names(), vec!["bar", "foo"]);

    let main = registry.find_klass("com.foo.Main").unwrap();
    assert_eq!(registry.klass(main).module(), outcome.table().find("foo"));
}

#[test]
fn test_declaration_order_does_not_steal_roots() {
    // bar is declared after foo; foo's closure must not take bar's root
    let (outcome, registry) = build(
        FOO_BAR,
        "class com.foo.Main\nclass com.bar.Helper\ncom.foo.Main -> com.bar.Helper\n",
    );
    let helper = registry.find_klass("com.bar.Helper").unwrap();
    assert_eq!(registry.klass(helper).module(), outcome.table().find("bar"));
}

#[test]
fn test_closure_follows_references() {
    let (outcome, registry) = build(
        FOO_BAR,
        "\
class com.foo.Main
class com.util.Strings
class com.util.Chars
com.foo.Main -> com.util.Strings
com.util.Strings -> com.util.Chars
",
    );
    let foo = outcome.table().find("foo").unwrap();
    for name in ["com.util.Strings", "com.util.Chars"] {
        let k = registry.find_klass(name).unwrap();
        assert_eq!(registry.klass(k).module(), Some(foo), "{name}");
    }
}

#[test]
fn test_split_package_edges_become_local() {
    let config = r#"
[[module]]
name = "internal"
roots = ["p.Internal*"]

[[module]]
name = "pub"
roots = ["p.Pub*"]
"#;
    let (outcome, _) = build(
        config,
        "class p.InternalA\nclass p.PubB\np.InternalA -> p.PubB\n",
    );

    assert!(outcome.split_packages().is_split("p"));
    let internal = outcome.module_info("internal").unwrap();
    let dep = internal.find_requires("pub").unwrap();
    assert!(dep.is_local());
    assert_eq!(dep.view(), Some("pub.internal"));

    let public = outcome.module_info("pub").unwrap();
    assert!(public.permits().contains("internal"));
    assert!(public.is_frozen());
}

#[test]
fn test_nested_members_merge() {
    let config = r#"
[[module]]
name = "a"
roots = ["com.a.*"]
members = ["b"]

[[module]]
name = "b"
roots = ["com.b.*"]
members = ["c"]

[[module]]
name = "c"
roots = ["com.c.*"]

[[module]]
name = "d"
roots = ["com.d.*"]
"#;
    let (outcome, registry) = build(
        config,
        "class com.a.A\nclass com.b.B\nclass com.c.C\nclass com.d.D\ncom.d.D -> com.c.C\n",
    );
    let table = outcome.table();
    let a = table.find("a").unwrap();
    let b = table.find("b").unwrap();
    let c = table.find("c").unwrap();

    let owned: Vec<&str> = table
        .get(a)
        .classes()
        .iter()
        .map(|&k| registry.klass(k).name())
        .collect();
    assert_eq!(owned.len(), 3);
    for name in ["com.a.A", "com.b.B", "com.c.C"] {
        assert!(owned.contains(&name), "{name}");
    }
    assert!(!table.is_top_level(b));
    assert!(!table.is_top_level(c));
    assert_eq!(table.group_of(c), a);

    assert!(outcome.module_info("b").is_none());
    let d = outcome.module_info("d").unwrap();
    assert_eq!(d.requires()[0].module_name(), "a");
    assert_eq!(outcome.ordered_names(), vec!["a", "d"]);
}

#[test]
fn test_no_merge_keeps_members_top_level() {
    let config = r#"
[[module]]
name = "a"
roots = ["com.a.*"]
members = ["b"]

[[module]]
name = "b"
roots = ["com.b.*"]
"#;
    let (outcome, _) = run(config, "class com.a.A\nclass com.b.B\ncom.a.A -> com.b.B\n", false).unwrap();
    let a = outcome.module_info("a").unwrap();
    assert!(a.find_requires("b").is_some());
    assert!(outcome.module_info("b").is_some());
}

#[test]
fn test_dependency_cycle_is_fatal() {
    let err = run(
        FOO_BAR,
        "class com.foo.A\nclass com.bar.B\ncom.foo.A -> com.bar.B\ncom.bar.B -> com.foo.A\n",
        true,
    )
    .unwrap_err();
    match err {
        BuildError::DependencyCycle(cycle) => assert_eq!(cycle, vec!["foo", "bar", "foo"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_optional_edge_breaks_cycle() {
    let (outcome, _) = build(
        FOO_BAR,
        "\
class com.foo.A
class com.bar.B
com.foo.A -> com.bar.B
[optional] com.bar.B -> com.foo.A
",
    );
    let bar = outcome.module_info("bar").unwrap();
    assert!(bar.find_requires("foo").unwrap().is_optional());
    assert_eq!(outcome.ordered_names(), vec!["bar", "foo"]);
}

#[test]
fn test_static_edge_clears_declared_optional() {
    let config = r#"
[[module]]
name = "foo"
roots = ["com.foo.*"]
requires = [{ name = "bar", optional = true, reexport = true }]

[[module]]
name = "bar"
roots = ["com.bar.*"]
"#;
    let (outcome, _) = build(
        config,
        "class com.foo.Main\nclass com.bar.Helper\ncom.foo.Main -> com.bar.Helper\n",
    );
    let dep = outcome.module_info("foo").unwrap().find_requires("bar").unwrap();
    assert!(!dep.is_optional());
    assert!(dep.is_public());
}

#[test]
fn test_declared_optional_stays_without_static_edge() {
    let config = r#"
[[module]]
name = "foo"
roots = ["com.foo.*"]
requires = [{ name = "bar", optional = true }]

[[module]]
name = "bar"
roots = ["com.bar.*"]
"#;
    let (outcome, _) = build(config, "class com.foo.Main\nclass com.bar.Helper\n");
    let dep = outcome.module_info("foo").unwrap().find_requires("bar").unwrap();
    assert!(dep.is_optional());
}

#[test]
fn test_excluded_reference_is_unresolved() {
    let config = r#"
[[module]]
name = "foo"
roots = ["com.foo.*"]
excludes = ["com.foo.Test*"]
"#;
    let (outcome, registry) = build(
        config,
        "class com.foo.Main\nclass com.foo.TestHelper\ncom.foo.Main -> com.foo.TestHelper\ncom.foo.Main -> com.gone.Missing\n",
    );
    let foo = outcome.table().get(outcome.table().find("foo").unwrap());
    let unresolved: Vec<&str> = foo
        .unresolved()
        .iter()
        .map(|r| registry.klass(r.referree).name())
        .collect();
    assert_eq!(unresolved.len(), 2);
    assert!(unresolved.contains(&"com.foo.TestHelper"));
    assert!(unresolved.contains(&"com.gone.Missing"));

    let helper = registry.find_klass("com.foo.TestHelper").unwrap();
    assert!(registry.klass(helper).module().is_none());
}

#[test]
fn test_unknown_module_takes_leftovers() {
    let config = r#"
[settings]
unknown-module = "misc"

[[module]]
name = "foo"
roots = ["com.foo.*"]
excludes = ["com.foo.Test*"]

[[module]]
name = "misc"
"#;
    let (outcome, registry) = build(
        config,
        "class com.foo.Main\nclass com.foo.TestHelper\nclass org.Stray\ncom.foo.Main -> com.foo.TestHelper\n",
    );
    let misc = outcome.table().find("misc").unwrap();
    for name in ["com.foo.TestHelper", "org.Stray"] {
        let k = registry.find_klass(name).unwrap();
        assert_eq!(registry.klass(k).module(), Some(misc), "{name}");
    }
    let foo = outcome.module_info("foo").unwrap();
    assert!(foo.find_requires("misc").is_some());
}

#[test]
fn test_unknown_module_must_exist() {
    let config = r#"
[settings]
unknown-module = "misc"

[[module]]
name = "foo"
"#;
    let err = run(config, "", true).unwrap_err();
    assert!(matches!(err, BuildError::UnknownModule { name, .. } if name == "misc"));
}

#[test]
fn test_internal_package_binds_internal_view() {
    let config = r#"
[settings]
exported-packages = ["com.bar.api"]

[[module]]
name = "foo"
roots = ["com.foo.*"]

[[module]]
name = "bar"
roots = ["com.bar.**"]
"#;
    let (outcome, _) = build(
        config,
        "class com.foo.Main\nclass com.bar.api.Api\nclass com.bar.impl.Impl\ncom.foo.Main -> com.bar.impl.Impl\n",
    );
    let dep = outcome.module_info("foo").unwrap().find_requires("bar").unwrap();
    assert!(dep.is_internal());
    assert_eq!(dep.view(), Some("bar.internal"));

    let bar = outcome.module_info("bar").unwrap();
    assert_eq!(
        bar.exports().into_iter().collect::<Vec<_>>(),
        vec!["com.bar.api".to_string()]
    );
}

#[test]
fn test_internal_package_without_internal_view_fails() {
    let config = r#"
[settings]
exported-packages = ["com.bar.api"]

[[module]]
name = "foo"
roots = ["com.foo.*"]

[[module]]
name = "bar"
roots = ["com.bar.**"]
internal-view = false
"#;
    let err = run(
        config,
        "class com.foo.Main\nclass com.bar.impl.Impl\ncom.foo.Main -> com.bar.impl.Impl\n",
        true,
    )
    .unwrap_err();
    assert!(matches!(err, BuildError::ViewNotFound { module, .. } if module == "foo"));
}

const VIEWS: &str = r#"
[[module]]
name = "foo"
roots = ["com.foo.*"]

[[module]]
name = "bar"
roots = ["com.bar.**"]

[[module.view]]
name = "bar.api"
exports = ["com.bar.api"]

[[module.view]]
name = "bar.spi"
exports = ["com.bar.spi"]
"#;

#[test]
fn test_named_view_selected_by_package() {
    let (outcome, _) = build(
        VIEWS,
        "class com.foo.Main\nclass com.bar.api.Api\ncom.foo.Main -> com.bar.api.Api\n",
    );
    let dep = outcome.module_info("foo").unwrap().find_requires("bar").unwrap();
    assert_eq!(dep.target(), "bar.api");
    assert_eq!(dep.view(), Some("bar.api"));
}

#[test]
fn test_conflicting_named_views_fail() {
    let (config_text, classes) = (
        VIEWS.replace(
            "roots = [\"com.foo.*\"]",
            "roots = [\"com.foo.*\"]\nrequires = [{ name = \"bar.spi\" }]",
        ),
        "class com.foo.Main\nclass com.bar.api.Api\ncom.foo.Main -> com.bar.api.Api\n",
    );
    let err = run(&config_text, classes, true).unwrap_err();
    assert!(matches!(err, BuildError::ConflictingDependence { module, .. } if module == "foo"));
}

#[test]
fn test_requires_unknown_module() {
    let config = r#"
[[module]]
name = "foo"
requires = [{ name = "nowhere" }]
"#;
    let err = run(config, "", true).unwrap_err();
    assert!(matches!(err, BuildError::UnknownModule { name, .. } if name == "nowhere"));
}

#[test]
fn test_duplicate_module() {
    let config = r#"
[[module]]
name = "foo"

[[module]]
name = "foo"
"#;
    let err = run(config, "", true).unwrap_err();
    assert!(matches!(err, BuildError::DuplicateModule(name) if name == "foo"));
}

#[test]
fn test_member_cycle() {
    let config = r#"
[[module]]
name = "a"
members = ["b"]

[[module]]
name = "b"
members = ["a"]
"#;
    let err = run(config, "", true).unwrap_err();
    assert!(matches!(err, BuildError::MemberCycle(_)));
}

#[test]
fn test_multiple_parents() {
    let config = r#"
[[module]]
name = "a"
members = ["c"]

[[module]]
name = "b"
members = ["c"]

[[module]]
name = "c"
"#;
    let err = run(config, "", true).unwrap_err();
    assert!(matches!(
        err,
        BuildError::MultipleParents { module, first, second }
            if module == "c" && first == "a" && second == "b"
    ));
}

#[test]
fn test_permits_open_to_all_requesters() {
    let config = r#"
[[module]]
name = "lib"
allow-empty = true

[[module]]
name = "friend"
requires = [{ name = "lib", local = true }]

[[module]]
name = "user"
requires = [{ name = "lib" }]
"#;
    let (outcome, _) = build(config, "");
    let lib = outcome.module_info("lib").unwrap();
    let permits: Vec<&str> = lib.permits().iter().map(String::as_str).collect();
    assert_eq!(permits, vec!["friend", "user"]);

    let friend = outcome.module_info("friend").unwrap();
    assert_eq!(friend.find_requires("lib").unwrap().view(), Some("lib.internal"));
    let user = outcome.module_info("user").unwrap();
    assert_eq!(user.find_requires("lib").unwrap().view(), Some("lib"));
}

#[test]
fn test_declared_permits_resolve_to_groups() {
    let config = r#"
[[module]]
name = "lib"
roots = ["com.lib.*"]
permits = ["tool"]

[[module]]
name = "app"
roots = ["com.app.*"]
members = ["tool"]

[[module]]
name = "tool"
roots = ["com.tool.*"]
"#;
    let (outcome, _) = build(config, "class com.lib.L\nclass com.app.A\nclass com.tool.T\ncom.tool.T -> com.lib.L\n");
    let lib = outcome.module_info("lib").unwrap();
    assert!(lib.permits().contains("app"));
    assert!(!lib.permits().contains("tool"));
}

#[test]
fn test_empty_module_is_dropped() {
    let config = r#"
[[module]]
name = "foo"
roots = ["com.foo.*"]

[[module]]
name = "ghost"
roots = ["com.ghost.*"]
"#;
    let (outcome, _) = build(config, "class com.foo.Main\n");
    assert!(outcome.module_info("ghost").is_none());
    assert_eq!(outcome.ordered_names(), vec!["foo"]);
}

#[test]
fn test_synthetic_edges() {
    let config = r#"
[settings]
base-module = "base"

[[module]]
name = "base"
roots = ["java.*"]

[[module]]
name = "foo"
roots = ["com.foo.*"]

[[dependency]]
from = "foo"
to = "base"

[[dependency]]
from = "base"
to = "foo"
optional = true
"#;
    let (outcome, _) = build(config, "class java.Object\nclass com.foo.Main\n");
    let foo = outcome.module_info("foo").unwrap();
    assert!(!foo.find_requires("base").unwrap().is_optional());
    let base = outcome.module_info("base").unwrap();
    assert!(base.requires().is_empty());
}

#[test]
fn test_dependency_from_unknown_module() {
    let config = r#"
[[module]]
name = "foo"
roots = ["com.foo.*"]

[[module]]
name = "bar"
roots = ["com.bar.*"]

[[dependency]]
from = "fooo"
to = "bar"
"#;
    let err = run(config, "class com.foo.Main\nclass com.bar.Bar\n", true).unwrap_err();
    assert!(matches!(err, BuildError::UnknownModule { name, .. } if name == "fooo"));
}

#[test]
fn test_local_synthetic_edge_is_permitted() {
    let config = r#"
[[module]]
name = "foo"
roots = ["com.foo.*"]

[[module]]
name = "bar"
roots = ["com.bar.*"]

[[dependency]]
from = "foo"
to = "bar"
local = true
reexport = true
"#;
    let (outcome, _) = build(config, "class com.foo.Main\nclass com.bar.Bar\n");
    let dep = outcome.module_info("foo").unwrap().find_requires("bar").unwrap();
    assert!(dep.is_local());
    assert!(dep.is_public());
    assert_eq!(dep.view(), Some("bar.internal"));
    assert!(outcome.module_info("bar").unwrap().permits().contains("foo"));
}

const VIEW_PERMITS: &str = r#"
[[module]]
name = "lib"
roots = ["com.lib.**"]

[[module.view]]
name = "lib.spi"
exports = ["com.lib.spi"]
permits = ["tool"]

[[module]]
name = "app"
roots = ["com.app.*"]
members = ["tool"]

[[module]]
name = "tool"
roots = ["com.tool.*"]
"#;

#[test]
fn test_view_permits_resolve_to_groups() {
    let (outcome, _) = build(
        VIEW_PERMITS,
        "class com.lib.spi.Spi\nclass com.app.A\nclass com.tool.T\n",
    );
    let lib = outcome.module_info("lib").unwrap();
    let spi = lib.views().find("lib.spi").unwrap();
    assert_eq!(spi.permits.iter().collect::<Vec<_>>(), vec!["app"]);
}

#[test]
fn test_view_permits_unknown_module() {
    let config = VIEW_PERMITS.replace("permits = [\"tool\"]", "permits = [\"no.such.module\"]");
    let err = run(&config, "class com.lib.spi.Spi\n", true).unwrap_err();
    assert!(matches!(
        err,
        BuildError::UnknownModule { name, context } if name == "no.such.module" && context.contains("lib.spi")
    ));
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_unresolved_references_are_warned() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();

    let config = r#"
[[module]]
name = "foo"
roots = ["com.foo.*"]
"#;
    tracing::subscriber::with_default(subscriber, || {
        build(config, "class com.foo.Main\ncom.foo.Main -> com.gone.X\n");
    });

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    let line = output
        .lines()
        .find(|l| l.contains("unresolved references"))
        .unwrap();
    assert!(line.contains("WARN"));
    assert!(line.contains("foo"));
}

#[test]
fn test_main_class_dependence() {
    let config = r#"
[[module]]
name = "launcher"
main-class = "com.tool.Main"
allow-empty = true

[[module]]
name = "tool"
roots = ["com.tool.*"]
"#;
    let (outcome, _) = build(config, "class com.tool.Main public\n");
    let launcher = outcome.module_info("launcher").unwrap();
    assert!(launcher.find_requires("tool").is_some());
    assert_eq!(launcher.main_class(), Some("com.tool.Main"));
}

#[test]
fn test_service_descriptor_follows_provider() {
    let config = r#"
[[module]]
name = "spi"
roots = ["com.spi.*"]

[[module]]
name = "impl"
roots = ["com.impl.*"]
"#;
    let (outcome, registry) = build(
        config,
        "class com.spi.Service\nclass com.impl.Provider\nprovider META-INF/services/com.spi.Service com.impl.Provider\n",
    );
    let descriptor = registry.find_resource("META-INF/services/com.spi.Service").unwrap();
    assert_eq!(
        registry.resource(descriptor).module(),
        outcome.table().find("impl")
    );
}

#[test]
fn test_includes_claim_without_following() {
    let config = r#"
[[module]]
name = "foo"
roots = ["com.foo.Main"]
includes = ["com.foo.extra.**", "com/foo/**"]
"#;
    let (outcome, registry) = build(
        config,
        "\
class com.foo.Main
class com.foo.extra.Plugin
class com.other.Dep
resource com/foo/app.properties 12
com.foo.extra.Plugin -> com.other.Dep
",
    );
    let foo = outcome.table().find("foo").unwrap();
    let plugin = registry.find_klass("com.foo.extra.Plugin").unwrap();
    assert_eq!(registry.klass(plugin).module(), Some(foo));
    let dep = registry.find_klass("com.other.Dep").unwrap();
    assert!(registry.klass(dep).module().is_none());
    let props = registry.find_resource("com/foo/app.properties").unwrap();
    assert_eq!(registry.resource(props).module(), Some(foo));
    assert_eq!(outcome.table().get(foo).unresolved().len(), 1);
}
