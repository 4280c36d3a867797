//! Arena-based task tree model: nodes live in a flat map keyed by id, never
//! behind parent/child pointers, and every traversal below is iterative.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};

pub type TaskId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Implementing,
    Testing,
    Reviewing,
    Complete,
    Failed,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Implementing => "implementing",
            TaskState::Testing => "testing",
            TaskState::Reviewing => "reviewing",
            TaskState::Complete => "complete",
            TaskState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub parent_id: Option<TaskId>,
    pub children_ids: Vec<TaskId>,
    pub depends_on: Vec<TaskId>,
    /// Advisory `[P]` marker from the spec; the dependency graph is
    /// authoritative regardless of this flag.
    pub parallelizable: bool,
}

impl TaskNode {
    pub fn is_leaf(&self) -> bool {
        self.children_ids.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("duplicate task id: {0}")]
    DuplicateId(TaskId),
    #[error("dependency cycle detected involving {0}")]
    Cycle(TaskId),
    #[error("unknown dependency target: {0} -> {1}")]
    UnknownDependency(TaskId, TaskId),
    #[error("node {0} has no parent and is not a root")]
    OrphanNode(TaskId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTree {
    pub spec_id: String,
    pub namespace: String,
    pub nodes: BTreeMap<TaskId, TaskNode>,
    pub root_ids: Vec<TaskId>,
}

impl TaskTree {
    pub fn new(spec_id: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            spec_id: spec_id.into(),
            namespace: namespace.into(),
            nodes: BTreeMap::new(),
            root_ids: Vec::new(),
        }
    }

    /// Validate the structural invariants: unique ids (guaranteed by the map
    /// itself), no cycles, every non-root node's parent exists, every
    /// dependency target exists.
    pub fn validate(&self) -> Result<(), TreeError> {
        for node in self.nodes.values() {
            match &node.parent_id {
                Some(parent) => {
                    if !self.nodes.contains_key(parent) {
                        return Err(TreeError::OrphanNode(node.id.clone()));
                    }
                }
                None => {
                    if !self.root_ids.contains(&node.id) {
                        return Err(TreeError::OrphanNode(node.id.clone()));
                    }
                }
            }
            for dep in &node.depends_on {
                if !self.nodes.contains_key(dep) {
                    return Err(TreeError::UnknownDependency(node.id.clone(), dep.clone()));
                }
            }
        }
        if let Some(cycle_id) = self.has_cycle() {
            return Err(TreeError::Cycle(cycle_id));
        }
        Ok(())
    }

    /// All nodes with no children, in stable (BTreeMap, i.e. id-sorted)
    /// order. The spec only requires a stable order, not insertion order,
    /// since ids are globally unique and comparably ordered strings.
    pub fn leaves(&self) -> Vec<&TaskNode> {
        self.nodes.values().filter(|n| n.is_leaf()).collect()
    }

    /// Leaves whose every `depends_on` entry is already completed.
    pub fn ready_leaves(&self, completed_ids: &HashSet<TaskId>) -> Vec<&TaskNode> {
        self.leaves()
            .into_iter()
            .filter(|n| n.depends_on.iter().all(|d| completed_ids.contains(d)))
            .collect()
    }

    /// Deterministic hierarchical branch name:
    /// `{namespace}/{spec_id}/{ancestor path.../}{id}`.
    pub fn branch_name(&self, id: &TaskId) -> Option<String> {
        let mut path = self.ancestor_path(id)?;
        path.push(id.clone());
        Some(format!("{}/{}/{}", self.namespace, self.spec_id, path.join("/")))
    }

    /// Ancestor ids from root down to (but excluding) `id`.
    fn ancestor_path(&self, id: &TaskId) -> Option<Vec<TaskId>> {
        let mut chain = Vec::new();
        let mut current = self.nodes.get(id)?;
        while let Some(parent_id) = &current.parent_id {
            chain.push(parent_id.clone());
            current = self.nodes.get(parent_id)?;
        }
        chain.reverse();
        Some(chain)
    }

    /// An order respecting both parent-before-descendant and `depends_on`
    /// (Kahn's algorithm over the union of both edge sets).
    pub fn topological_order(&self) -> Result<Vec<TaskId>, TreeError> {
        let mut indegree: BTreeMap<TaskId, usize> =
            self.nodes.keys().map(|id| (id.clone(), 0)).collect();
        let mut edges: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();

        for node in self.nodes.values() {
            for child in &node.children_ids {
                edges.entry(node.id.clone()).or_default().push(child.clone());
                *indegree.entry(child.clone()).or_insert(0) += 1;
            }
            for dep in &node.depends_on {
                edges.entry(dep.clone()).or_default().push(node.id.clone());
                *indegree.entry(node.id.clone()).or_insert(0) += 1;
            }
        }

        let mut queue: VecDeque<TaskId> = indegree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(id, _)| id.clone())
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = queue.pop_front() {
            order.push(id.clone());
            if let Some(targets) = edges.get(&id) {
                for t in targets {
                    let deg = indegree.get_mut(t).expect("known node");
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(t.clone());
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck = self
                .nodes
                .keys()
                .find(|id| !order.contains(id))
                .cloned()
                .unwrap_or_default();
            return Err(TreeError::Cycle(stuck));
        }

        Ok(order)
    }

    /// Three-color DFS cycle check over the union of parent/child and
    /// dependency edges. Returns the id where a back-edge was found, if any.
    pub fn has_cycle(&self) -> Option<TaskId> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color: BTreeMap<&TaskId, Color> =
            self.nodes.keys().map(|id| (id, Color::White)).collect();

        for start in self.nodes.keys() {
            if color[start] != Color::White {
                continue;
            }
            let mut stack: Vec<(&TaskId, usize)> = vec![(start, 0)];
            color.insert(start, Color::Gray);

            while let Some((id, idx)) = stack.pop() {
                let node = match self.nodes.get(id) {
                    Some(n) => n,
                    None => continue,
                };
                let mut neighbors: Vec<&TaskId> = node.children_ids.iter().collect();
                neighbors.extend(node.depends_on.iter());

                if idx < neighbors.len() {
                    stack.push((id, idx + 1));
                    let next = neighbors[idx];
                    match color.get(next).copied() {
                        Some(Color::White) => {
                            color.insert(next, Color::Gray);
                            stack.push((next, 0));
                        }
                        Some(Color::Gray) => return Some(next.clone()),
                        _ => {}
                    }
                } else {
                    color.insert(id, Color::Black);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: &str, parent: Option<&str>, deps: &[&str]) -> TaskNode {
        TaskNode {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            parent_id: parent.map(|s| s.into()),
            children_ids: vec![],
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
            parallelizable: false,
        }
    }

    fn sample_tree() -> TaskTree {
        let mut tree = TaskTree::new("demo", "feature");
        let mut phase1 = leaf("phase1", None, &[]);
        phase1.children_ids = vec!["T001".into(), "T002".into()];
        tree.nodes.insert("phase1".into(), phase1);
        tree.root_ids.push("phase1".into());
        tree.nodes
            .insert("T001".into(), leaf("T001", Some("phase1"), &[]));
        tree.nodes
            .insert("T002".into(), leaf("T002", Some("phase1"), &["T001"]));
        tree
    }

    #[test]
    fn validates_clean_tree() {
        assert!(sample_tree().validate().is_ok());
    }

    #[test]
    fn leaves_excludes_phase_nodes() {
        let tree = sample_tree();
        let ids: Vec<&str> = tree.leaves().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["T001", "T002"]);
    }

    #[test]
    fn ready_leaves_respects_dependencies() {
        let tree = sample_tree();
        let none_done = HashSet::new();
        assert_eq!(tree.ready_leaves(&none_done).len(), 1);

        let mut done = HashSet::new();
        done.insert("T001".to_string());
        let ready = tree.ready_leaves(&done);
        assert_eq!(ready.len(), 2);
    }

    #[test]
    fn branch_name_joins_ancestor_path() {
        let tree = sample_tree();
        assert_eq!(
            tree.branch_name(&"T001".to_string()).unwrap(),
            "feature/demo/phase1/T001"
        );
        assert_eq!(
            tree.branch_name(&"phase1".to_string()).unwrap(),
            "feature/demo/phase1"
        );
    }

    #[test]
    fn topological_order_respects_hierarchy_and_dependencies() {
        let tree = sample_tree();
        let order = tree.topological_order().unwrap();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("phase1") < pos("T001"));
        assert!(pos("T001") < pos("T002"));
    }

    #[test]
    fn detects_dependency_cycle() {
        let mut tree = sample_tree();
        tree.nodes.get_mut("T001").unwrap().depends_on = vec!["T002".into()];
        assert!(tree.has_cycle().is_some());
        assert!(tree.validate().is_err());
    }

    #[test]
    fn rejects_unknown_dependency() {
        let mut tree = sample_tree();
        tree.nodes.get_mut("T001").unwrap().depends_on = vec!["T999".into()];
        assert!(matches!(
            tree.validate(),
            Err(TreeError::UnknownDependency(_, _))
        ));
    }
}
