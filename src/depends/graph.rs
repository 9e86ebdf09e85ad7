use super::Resolver;
use crate::validator::{fail_if_issues, ErrorKind, SchemaError, SchemaIssue};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Immutable set of resolvers with a precomputed dependency order.
#[derive(Clone, Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, Arc<dyn Resolver>>,
    /// Every node, dependencies before dependents
    order: Vec<String>,
}

impl fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("order", &self.order)
            .finish()
    }
}

#[derive(Default)]
pub struct DependencyGraphBuilder {
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl DependencyGraph {
    #[must_use]
    pub fn builder() -> DependencyGraphBuilder {
        DependencyGraphBuilder::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Resolver>> {
        self.nodes.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Every resolver name in dependency order
    #[must_use]
    pub fn order(&self) -> &[String] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolvers reachable from `roots`, dependencies first. Unknown roots are skipped.
    #[must_use]
    pub fn closure(&self, roots: &[String]) -> Vec<&Arc<dyn Resolver>> {
        let mut reachable = HashSet::new();
        let mut stack: Vec<&str> = roots.iter().map(String::as_str).collect();
        while let Some(name) = stack.pop() {
            let Some(node) = self.nodes.get(name) else {
                continue;
            };
            if reachable.insert(name) {
                stack.extend(node.dependencies().iter().map(String::as_str));
            }
        }
        self.order
            .iter()
            .filter(|name| reachable.contains(name.as_str()))
            .filter_map(|name| self.nodes.get(name))
            .collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

struct Topo<'a> {
    deps: &'a BTreeMap<&'a str, Vec<&'a str>>,
    marks: HashMap<&'a str, Mark>,
    stack: Vec<&'a str>,
    order: Vec<String>,
    issues: Vec<SchemaIssue>,
}

impl<'a> Topo<'a> {
    fn visit(&mut self, name: &'a str) {
        self.marks.insert(name, Mark::Visiting);
        self.stack.push(name);
        let deps = self.deps;
        for &dep in deps.get(name).map(Vec::as_slice).unwrap_or_default() {
            match self.marks.get(dep) {
                Some(Mark::Visiting) => {
                    let start = self.stack.iter().position(|n| *n == dep).unwrap_or(0);
                    self.issues.push(SchemaIssue::new(
                        dep,
                        ErrorKind::CycleDetected,
                        format!(
                            "dependency cycle: {} -> {dep}",
                            self.stack[start..].join(" -> ")
                        ),
                    ));
                }
                Some(Mark::Done) => {}
                None if deps.contains_key(dep) => self.visit(dep),
                None => {}
            }
        }
        self.stack.pop();
        self.marks.insert(name, Mark::Done);
        self.order.push(name.to_string());
    }
}

impl DependencyGraphBuilder {
    #[must_use]
    pub fn register(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    /// Register an already shared resolver.
    #[must_use]
    pub fn register_arc(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Check names, dependencies and cycles, then compute the dependency order.
    pub fn build(self) -> Result<DependencyGraph, SchemaError> {
        let mut issues = Vec::new();
        let mut nodes: HashMap<String, Arc<dyn Resolver>> = HashMap::new();
        let mut registered = Vec::with_capacity(self.resolvers.len());
        for resolver in &self.resolvers {
            let name = resolver.name().to_string();
            if nodes.contains_key(&name) {
                issues.push(SchemaIssue::new(
                    &name,
                    ErrorKind::DuplicateField,
                    format!("resolver `{name}` is registered more than once"),
                ));
                continue;
            }
            registered.push(name.clone());
            nodes.insert(name, resolver.clone());
        }

        let mut deps: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for name in &registered {
            let Some(resolver) = nodes.get(name) else {
                continue;
            };
            let mut known = Vec::new();
            for dep in resolver.dependencies() {
                if nodes.contains_key(dep) {
                    known.push(dep.as_str());
                } else {
                    issues.push(SchemaIssue::new(
                        format!("{name}.{dep}"),
                        ErrorKind::UnknownDependency,
                        format!("`{name}` depends on `{dep}`, which is not registered"),
                    ));
                }
            }
            deps.insert(name.as_str(), known);
        }

        let mut topo = Topo {
            deps: &deps,
            marks: HashMap::new(),
            stack: Vec::new(),
            order: Vec::with_capacity(nodes.len()),
            issues: Vec::new(),
        };
        for &name in deps.keys() {
            if !topo.marks.contains_key(name) {
                topo.visit(name);
            }
        }
        let Topo {
            order,
            issues: cycle_issues,
            ..
        } = topo;
        issues.extend(cycle_issues);

        fail_if_issues(issues)?;
        debug!(resolver_count = nodes.len(), order = ?order, "Dependency graph built");
        Ok(DependencyGraph { nodes, order })
    }
}
