//! Module dependency graph
//!
//! Built from finalized module infos over non-optional requires:
//! - Cycle detection
//! - Dependency-first ordering

use crate::error::BuildError;
use crate::info::ModuleInfo;
use crate::module::ModuleId;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
struct GraphNode {
    name: String,
    /// Non-optional dependences
    requires: Vec<ModuleId>,
}

/// Dependency graph of top-level modules
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<ModuleId, GraphNode>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph of the non-optional requires of every module
    pub fn from_infos(infos: &BTreeMap<ModuleId, ModuleInfo>) -> Self {
        let mut graph = Self::new();
        for info in infos.values() {
            graph.add_module(info.module(), info.name());
        }
        for info in infos.values() {
            for dep in info.requires().iter().filter(|d| !d.is_optional()) {
                graph.add_dependency(info.module(), dep.module());
            }
        }
        graph
    }

    pub fn add_module(&mut self, id: ModuleId, name: &str) {
        self.nodes.entry(id).or_insert_with(|| GraphNode {
            name: name.to_string(),
            requires: Vec::new(),
        });
    }

    /// Add an edge; both ends must already be present
    pub fn add_dependency(&mut self, from: ModuleId, to: ModuleId) {
        if !self.nodes.contains_key(&to) {
            return;
        }
        if let Some(node) = self.nodes.get_mut(&from) {
            if !node.requires.contains(&to) {
                node.requires.push(to);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Detect cycles in the graph
    pub fn detect_cycles(&self) -> Result<(), BuildError> {
        self.topological_order(&[]).map(|_| ())
    }

    /// Dependencies first. `seeds` are visited before the remaining modules,
    /// which follow in id order.
    pub fn topological_order(&self, seeds: &[ModuleId]) -> Result<Vec<ModuleId>, BuildError> {
        let mut visited = BTreeSet::new();
        let mut rec_stack = BTreeSet::new();
        let mut path = Vec::new();
        let mut order = Vec::with_capacity(self.nodes.len());

        let starts = seeds
            .iter()
            .copied()
            .filter(|id| self.nodes.contains_key(id))
            .chain(self.nodes.keys().copied());
        for start in starts {
            if !visited.contains(&start) {
                self.visit(start, &mut visited, &mut rec_stack, &mut path, &mut order)?;
            }
        }
        Ok(order)
    }

    /// DFS post-order helper
    fn visit(
        &self,
        id: ModuleId,
        visited: &mut BTreeSet<ModuleId>,
        rec_stack: &mut BTreeSet<ModuleId>,
        path: &mut Vec<ModuleId>,
        order: &mut Vec<ModuleId>,
    ) -> Result<(), BuildError> {
        visited.insert(id);
        rec_stack.insert(id);
        path.push(id);

        if let Some(node) = self.nodes.get(&id) {
            for &dep in &node.requires {
                if !visited.contains(&dep) {
                    self.visit(dep, visited, rec_stack, path, order)?;
                } else if rec_stack.contains(&dep) {
                    let start = path.iter().position(|&p| p == dep).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|&p| self.name(p)).collect();
                    cycle.push(self.name(dep));
                    return Err(BuildError::DependencyCycle(cycle));
                }
            }
        }

        path.pop();
        rec_stack.remove(&id);
        order.push(id);
        Ok(())
    }

    fn name(&self, id: ModuleId) -> String {
        self.nodes
            .get(&id)
            .map(|n| n.name.clone())
            .unwrap_or_default()
    }
}
