//! Integration tests for the platform aggregation variant

use modularizer_engine::{
    build_modules, BuildError, BuildOutcome, ClassList, ConfigFile, PlatformModuleBuilder,
    UnitRegistry,
};

const PLATFORM: &str = r#"
[platform]

[[module]]
name = "jdk.boot"
roots = ["java.lang.*"]

[[module]]
name = "jdk.base"
roots = ["java.util.*"]

[[module]]
name = "sun.misc"
roots = ["sun.misc.*"]

[[module]]
name = "jdk.tools"
roots = ["com.tools.*"]

[[module]]
name = "jdk.agent"
roots = ["com.agent.*"]
requires = [{ name = "jdk.boot" }]
"#;

const CLASSES: &str = "\
class java.lang.Object public
class java.util.List public
class sun.misc.Unsafe public
class com.tools.Tool public
class com.agent.Agent public
java.util.List -> java.lang.Object
com.tools.Tool -> java.lang.Object
com.tools.Tool -> java.util.List
com.tools.Tool -> sun.misc.Unsafe
com.agent.Agent -> java.lang.Object
[optional] java.lang.Object -> com.tools.Tool
";

fn build(config: &str, classes: &str) -> Result<BuildOutcome, BuildError> {
    let config = ConfigFile::from_str(config).unwrap();
    let mut registry = UnitRegistry::new();
    let list = ClassList::from_str(classes, &mut registry).unwrap();
    build_modules(&config, &mut registry, list.optional, true)
}

fn requires(outcome: &BuildOutcome, module: &str) -> Vec<String> {
    outcome
        .module_info(module)
        .unwrap()
        .requires()
        .iter()
        .map(|d| d.module_name().to_string())
        .collect()
}

#[test]
fn test_boot_is_reexported_by_base() {
    let outcome = build(PLATFORM, CLASSES).unwrap();
    let dep = outcome
        .module_info("jdk.base")
        .unwrap()
        .find_requires("jdk.boot")
        .unwrap()
        .clone();
    assert!(dep.is_public());
    assert_eq!(&outcome.ordered_names()[..2], ["jdk.boot", "jdk.base"]);
}

#[test]
fn test_boot_drops_optional_dependences() {
    let outcome = build(PLATFORM, CLASSES).unwrap();
    assert!(requires(&outcome, "jdk.boot").is_empty());
}

#[test]
fn test_internal_module_gets_public_aggregate() {
    let outcome = build(PLATFORM, CLASSES).unwrap();

    let aggregate = outcome.module_info("jdk.misc").unwrap();
    assert!(aggregate.find_requires("sun.misc").unwrap().is_public());

    let internal = outcome.module_info("sun.misc").unwrap();
    assert!(internal.permits().contains("jdk.misc"));
}

#[test]
fn test_dependences_redirect_to_exporters() {
    let outcome = build(PLATFORM, CLASSES).unwrap();
    let tools = requires(&outcome, "jdk.tools");
    assert_eq!(tools, vec!["jdk.base", "jdk.misc"]);
}

#[test]
fn test_boot_connected_module_keeps_direct_edge() {
    let outcome = build(PLATFORM, CLASSES).unwrap();
    assert_eq!(requires(&outcome, "jdk.agent"), vec!["jdk.boot"]);
}

#[test]
fn test_aggregates_reexport_public_surface() {
    let outcome = build(PLATFORM, CLASSES).unwrap();

    let jdk = requires(&outcome, "jdk");
    assert_eq!(jdk, vec!["jdk.agent", "jdk.base", "jdk.misc", "jdk.tools"]);
    let info = outcome.module_info("jdk").unwrap();
    assert!(info.requires().iter().all(|d| d.is_public()));

    let jre = requires(&outcome, "jdk.jre");
    assert_eq!(jre, vec!["jdk.agent", "jdk.base"]);
}

#[test]
fn test_order_is_valid() {
    let outcome = build(PLATFORM, CLASSES).unwrap();
    let order = outcome.order();
    for info in outcome.infos() {
        let me = order.iter().position(|&m| m == info.module()).unwrap();
        for dep in info.requires().iter().filter(|d| !d.is_optional()) {
            let them = order.iter().position(|&m| m == dep.module()).unwrap();
            assert!(them < me, "{} must precede {}", dep.module_name(), info.name());
        }
    }
}

#[test]
fn test_boot_merged_into_base_fails() {
    let config = PLATFORM.replace(
        "roots = [\"java.util.*\"]",
        "roots = [\"java.util.*\"]\nmembers = [\"jdk.boot\"]",
    );
    let err = build(&config, CLASSES).unwrap_err();
    assert!(matches!(err, BuildError::Platform(_)));
}

#[test]
fn test_missing_platform_table() {
    let config = ConfigFile::from_str("[[module]]\nname = \"jdk.boot\"\n").unwrap();
    assert!(matches!(
        PlatformModuleBuilder::from_config(&config),
        Err(BuildError::Platform(_))
    ));
}
