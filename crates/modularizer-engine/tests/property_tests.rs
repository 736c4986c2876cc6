//! Property tests over randomly wired unit graphs
//!
//! Module `mI` owns package `mI`. Edges toward a lower or equal module are
//! required, edges toward a higher module are marked optional, so the
//! required module graph is always acyclic.

use modularizer_engine::info::fixup_permits;
use modularizer_engine::{build_modules, ClassList, ConfigFile, ModuleId, ModuleInfo, UnitRegistry};
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Scenario {
    modules: usize,
    per_module: usize,
    /// (from class, to class, dangling)
    edges: Vec<(usize, usize, bool)>,
}

impl Scenario {
    fn module_of(&self, class: usize) -> usize {
        class / self.per_module
    }

    fn class_name(&self, class: usize) -> String {
        format!("m{}.C{}", self.module_of(class), class % self.per_module)
    }

    fn config(&self) -> String {
        (0..self.modules)
            .map(|m| format!("[[module]]\nname = \"m{m}\"\nroots = [\"m{m}.*\"]\n\n"))
            .collect()
    }

    fn class_list(&self) -> String {
        let mut text = String::new();
        for c in 0..self.modules * self.per_module {
            text.push_str(&format!("class {}\n", self.class_name(c)));
        }
        for &(from, to, dangling) in &self.edges {
            let source = self.class_name(from);
            if dangling {
                text.push_str(&format!("{} -> gone.G{}\n", source, to));
            } else if self.module_of(to) > self.module_of(from) {
                text.push_str(&format!("[optional] {} -> {}\n", source, self.class_name(to)));
            } else {
                text.push_str(&format!("{} -> {}\n", source, self.class_name(to)));
            }
        }
        text
    }
}

fn scenario() -> impl Strategy<Value = Scenario> {
    (1usize..6, 1usize..4).prop_flat_map(|(modules, per_module)| {
        let total = modules * per_module;
        prop::collection::vec((0..total, 0..total, prop::bool::weighted(0.15)), 0..40).prop_map(
            move |edges| Scenario {
                modules,
                per_module,
                edges,
            },
        )
    })
}

proptest! {
    #[test]
    fn every_unit_has_one_owner(s in scenario()) {
        let config = ConfigFile::from_str(&s.config()).unwrap();
        let mut registry = UnitRegistry::new();
        let list = ClassList::from_str(&s.class_list(), &mut registry).unwrap();
        let outcome = build_modules(&config, &mut registry, list.optional, true).unwrap();
        let table = outcome.table();

        for c in 0..s.modules * s.per_module {
            let k = registry.find_klass(&s.class_name(c)).unwrap();
            let expected = table.find(&format!("m{}", s.module_of(c)));
            prop_assert_eq!(registry.klass(k).module(), expected);
        }
        for klass in registry.klasses().filter(|k| !k.exists()) {
            prop_assert!(klass.module().is_none());
        }

        // no unit appears in two modules' owned sets
        let mut seen = BTreeMap::new();
        for module in table.iter() {
            for &k in module.classes() {
                prop_assert!(seen.insert(k, module.id()).is_none());
            }
        }
    }

    #[test]
    fn order_respects_required_dependences(s in scenario()) {
        let config = ConfigFile::from_str(&s.config()).unwrap();
        let mut registry = UnitRegistry::new();
        let list = ClassList::from_str(&s.class_list(), &mut registry).unwrap();
        let outcome = build_modules(&config, &mut registry, list.optional, true).unwrap();

        let order = outcome.order();
        prop_assert_eq!(order.len(), s.modules);
        let position = |id: ModuleId| order.iter().position(|&m| m == id);
        for info in outcome.infos() {
            let me = position(info.module()).unwrap();
            for dep in info.requires().iter().filter(|d| !d.is_optional()) {
                let them = position(dep.module()).unwrap();
                prop_assert!(them < me);
            }
        }

        // every required cross-module edge shows up as a dependence
        for &(from, to, dangling) in &s.edges {
            let (a, b) = (s.module_of(from), s.module_of(to));
            if dangling || b >= a {
                continue;
            }
            let info = outcome.module_info(&format!("m{a}")).unwrap();
            let dep = info.find_requires(&format!("m{b}"));
            prop_assert!(dep.is_some_and(|d| !d.is_optional()));
        }
    }

    #[test]
    fn permits_fixup_is_idempotent(s in scenario()) {
        let config = ConfigFile::from_str(&s.config()).unwrap();
        let mut registry = UnitRegistry::new();
        let list = ClassList::from_str(&s.class_list(), &mut registry).unwrap();
        let outcome = build_modules(&config, &mut registry, list.optional, true).unwrap();

        let mut infos: BTreeMap<ModuleId, ModuleInfo> = outcome
            .infos()
            .map(|info| (info.module(), info.clone()))
            .collect();
        let before: Vec<_> = infos.values().map(|i| i.permits().clone()).collect();
        prop_assert_eq!(fixup_permits(&mut infos).unwrap(), 0);
        let after: Vec<_> = infos.values().map(|i| i.permits().clone()).collect();
        prop_assert_eq!(before, after);
    }
}
