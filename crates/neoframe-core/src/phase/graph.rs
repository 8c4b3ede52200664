use crate::error::{EngineError, EngineResult};

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_GRAPH_ID: AtomicU32 = AtomicU32::new(1);

/// Opaque phase handle. Only valid for the graph that issued it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PhaseId {
    graph: u32,
    index: u32,
}

impl PhaseId {
    /// Declaration index inside the owning graph.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

#[derive(Clone)]
struct PhaseNode {
    name: String,
    deps: Vec<u32>,
}

/// Directed acyclic graph of named phases with "depends-on" edges.
///
/// Edges are checked for cycles as they are added, and `finalize` checks again.
/// A clone keeps the graph identity, so handles stay valid across it.
#[derive(Clone)]
pub struct PhaseGraph {
    id: u32,
    nodes: Vec<PhaseNode>,
    by_name: HashMap<String, PhaseId>,
}

impl Default for PhaseGraph {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseGraph {
    pub fn new() -> Self {
        Self {
            id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Declares a phase. Declaring an existing name returns the existing handle.
    pub fn declare_phase(&mut self, name: &str) -> PhaseId {
        if let Some(&id) = self.by_name.get(name) {
            log::debug!("phase '{name}' already declared");
            return id;
        }

        let id = PhaseId {
            graph: self.id,
            index: self.nodes.len() as u32,
        };
        self.nodes.push(PhaseNode {
            name: name.to_owned(),
            deps: Vec::new(),
        });
        self.by_name.insert(name.to_owned(), id);
        id
    }

    /// Adds the edge "`phase` runs after `depends_on`".
    ///
    /// Fails with [`EngineError::Cycle`] if the edge would close a cycle; the
    /// graph is left unchanged in that case.
    pub fn add_dependency(&mut self, phase: PhaseId, depends_on: PhaseId) -> EngineResult<()> {
        self.check(phase)?;
        self.check(depends_on)?;

        if self.nodes[phase.index()].deps.contains(&depends_on.index) {
            return Ok(());
        }

        // The new edge closes a cycle iff `depends_on` already (transitively) depends on `phase`.
        if let Some(path) = self.dependency_path(depends_on.index, phase.index) {
            let mut phases: Vec<String> = Vec::with_capacity(path.len() + 1);
            phases.push(self.nodes[phase.index()].name.clone());
            phases.extend(path.iter().map(|&i| self.nodes[i as usize].name.clone()));
            return Err(EngineError::Cycle { phases });
        }

        self.nodes[phase.index()].deps.push(depends_on.index);
        Ok(())
    }

    /// Topological order; independent phases keep declaration order.
    pub fn finalize(&self) -> EngineResult<Vec<PhaseId>> {
        let n = self.nodes.len();

        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<u32>> = vec![Vec::new(); n];
        for (i, node) in self.nodes.iter().enumerate() {
            indegree[i] = node.deps.len();
            for &dep in &node.deps {
                dependents[dep as usize].push(i as u32);
            }
        }

        // Kahn's algorithm; the ready set is ordered by declaration index.
        let mut ready: BTreeSet<u32> = (0..n as u32).filter(|&i| indegree[i as usize] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(i) = ready.pop_first() {
            order.push(self.id_at(i));
            for &to in &dependents[i as usize] {
                indegree[to as usize] -= 1;
                if indegree[to as usize] == 0 {
                    ready.insert(to);
                }
            }
        }

        if order.len() != n {
            let phases = indegree
                .iter()
                .enumerate()
                .filter(|(_, d)| **d != 0)
                .map(|(i, _)| self.nodes[i].name.clone())
                .collect();
            return Err(EngineError::Cycle { phases });
        }

        if log::log_enabled!(log::Level::Debug) {
            let names: Vec<&str> = order.iter().map(|&id| self.name(id)).collect();
            log::debug!("phase order: {}", names.join(" -> "));
        }

        Ok(order)
    }

    #[inline]
    pub fn contains(&self, id: PhaseId) -> bool {
        id.graph == self.id && id.index() < self.nodes.len()
    }

    #[inline]
    pub fn name(&self, id: PhaseId) -> &str {
        match self.nodes.get(id.index()) {
            Some(node) if id.graph == self.id => &node.name,
            _ => "<foreign phase>",
        }
    }

    /// Name lookup for diagnostics.
    #[inline]
    pub fn lookup(&self, name: &str) -> Option<PhaseId> {
        self.by_name.get(name).copied()
    }

    pub fn dependencies(&self, id: PhaseId) -> impl Iterator<Item = PhaseId> + '_ {
        let deps: &[u32] = match self.nodes.get(id.index()) {
            Some(node) if id.graph == self.id => &node.deps,
            _ => &[],
        };
        deps.iter().map(move |&i| self.id_at(i))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    fn id_at(&self, index: u32) -> PhaseId {
        PhaseId {
            graph: self.id,
            index,
        }
    }

    fn check(&self, id: PhaseId) -> EngineResult<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(EngineError::other(format!(
                "phase handle {id:?} does not belong to this graph"
            )))
        }
    }

    /// Path `from -> ... -> to` following depends-on edges, if any.
    fn dependency_path(&self, from: u32, to: u32) -> Option<Vec<u32>> {
        let n = self.nodes.len();
        let mut parent: Vec<Option<u32>> = vec![None; n];
        let mut visited = vec![false; n];
        let mut stack = vec![from];
        visited[from as usize] = true;

        while let Some(cur) = stack.pop() {
            if cur == to {
                let mut path = vec![cur];
                let mut at = cur;
                while let Some(p) = parent[at as usize] {
                    path.push(p);
                    at = p;
                }
                path.reverse();
                return Some(path);
            }

            for &dep in &self.nodes[cur as usize].deps {
                if !visited[dep as usize] {
                    visited[dep as usize] = true;
                    parent[dep as usize] = Some(cur);
                    stack.push(dep);
                }
            }
        }

        None
    }
}
