//! Pure, stateless dependency-graph queries over a task snapshot.
//!
//! A [`Graph`] is built from a snapshot and discarded after use; it caches
//! nothing between operations and holds no reference to the task store.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::task::{Task, TaskStatus};

/// Why a task cannot start yet, from [`Graph::can_start`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockReason {
    pub id: Uuid,
    pub status: TaskStatus,
}

/// Result of [`Graph::can_start`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartCheck {
    pub can_start: bool,
    pub blocked_by: Vec<BlockReason>,
    pub reason: String,
}

/// A task entry blocked from starting, from [`Graph::blocked_tasks`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedTask {
    pub id: Uuid,
    pub blocked_by: Vec<BlockReason>,
}

/// Errors raised by graph algorithms that require acyclicity.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("dependency cycle detected")]
    Cycle,
    #[error("task {0} depends on unknown task {1}")]
    MissingDependency(Uuid, Uuid),
}

#[derive(Debug, Clone)]
struct GraphNode {
    id: Uuid,
    status: TaskStatus,
    priority: u8,
    dependencies: HashSet<Uuid>,
    order: usize,
}

/// An in-memory DAG built from a snapshot of a project's tasks.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: HashMap<Uuid, GraphNode>,
    dependents: HashMap<Uuid, Vec<Uuid>>,
}

impl Graph {
    /// Builds a graph from a task snapshot, indexing dependents for
    /// constant-time successor lookup.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut nodes = HashMap::with_capacity(tasks.len());
        let mut dependents: HashMap<Uuid, Vec<Uuid>> = HashMap::new();

        for (order, task) in tasks.iter().enumerate() {
            nodes.insert(
                task.id,
                GraphNode {
                    id: task.id,
                    status: task.status,
                    priority: task.priority,
                    dependencies: task.dependencies.clone(),
                    order,
                },
            );
        }
        for node in nodes.values() {
            for dep in &node.dependencies {
                dependents.entry(*dep).or_default().push(node.id);
            }
        }

        Self { nodes, dependents }
    }

    fn completed_from_status(&self) -> HashSet<Uuid> {
        self.nodes
            .values()
            .filter(|n| n.status.satisfies_dependents())
            .map(|n| n.id)
            .collect()
    }

    /// Whether the graph contains any cycle.
    pub fn has_cycles(&self) -> bool {
        !self.cycles().is_empty()
    }

    /// Enumerates simple cycles via DFS with a recursion stack. Each cycle is
    /// reported once, as the sequence of task IDs that close the loop.
    pub fn cycles(&self) -> Vec<Vec<Uuid>> {
        let mut mark: HashMap<Uuid, Mark> = self.nodes.keys().map(|id| (*id, Mark::Unvisited)).collect();
        let mut stack: Vec<Uuid> = Vec::new();
        let mut found: Vec<Vec<Uuid>> = Vec::new();

        let mut ids: Vec<Uuid> = self.nodes.keys().copied().collect();
        ids.sort();

        for start in ids {
            if mark[&start] == Mark::Unvisited {
                self.dfs_cycle(start, &mut mark, &mut stack, &mut found);
            }
        }
        found
    }

    fn dfs_cycle(&self, id: Uuid, mark: &mut HashMap<Uuid, Mark>, stack: &mut Vec<Uuid>, found: &mut Vec<Vec<Uuid>>) {
        mark.insert(id, Mark::InStack);
        stack.push(id);

        if let Some(node) = self.nodes.get(&id) {
            let mut deps: Vec<Uuid> = node.dependencies.iter().copied().collect();
            deps.sort();
            for dep in deps {
                match mark.get(&dep) {
                    Some(Mark::InStack) => {
                        let start_pos = stack.iter().position(|x| *x == dep).unwrap_or(0);
                        let mut cycle: Vec<Uuid> = stack[start_pos..].to_vec();
                        cycle.push(dep);
                        found.push(cycle);
                    }
                    Some(Mark::Done) => {}
                    _ => self.dfs_cycle(dep, mark, stack, found),
                }
            }
        }

        stack.pop();
        mark.insert(id, Mark::Done);
    }

    /// Kahn's algorithm; fails if the graph is cyclic.
    pub fn topological_order(&self) -> Result<Vec<Uuid>, GraphError> {
        let mut in_degree: HashMap<Uuid, usize> = self.nodes.keys().map(|id| (*id, 0)).collect();
        for node in self.nodes.values() {
            for dep in &node.dependencies {
                if !self.nodes.contains_key(dep) {
                    return Err(GraphError::MissingDependency(node.id, *dep));
                }
            }
            *in_degree.get_mut(&node.id).unwrap() += node.dependencies.len();
        }

        let mut queue: VecDeque<Uuid> = self.sorted_ids_where(|n| in_degree[&n.id] == 0);
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = queue.pop_front() {
            order.push(id);
            if let Some(deps) = self.dependents.get(&id) {
                let mut newly_ready: Vec<Uuid> = Vec::new();
                for dependent in deps {
                    let degree = in_degree.get_mut(dependent).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        newly_ready.push(*dependent);
                    }
                }
                newly_ready.sort_by_key(|id| (self.nodes[id].priority, self.nodes[id].order));
                for id in newly_ready {
                    queue.push_back(id);
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(GraphError::Cycle);
        }
        Ok(order)
    }

    /// Groups tasks into parallel execution levels: level 0 has no
    /// predecessors, level k's predecessors all lie in levels < k. Each
    /// level is sorted by priority ascending, then insertion order.
    pub fn execution_levels(&self) -> Result<Vec<Vec<Uuid>>, GraphError> {
        let mut level_of: HashMap<Uuid, usize> = HashMap::new();
        for id in self.topological_order()? {
            let node = &self.nodes[&id];
            let level = node
                .dependencies
                .iter()
                .map(|d| level_of.get(d).copied().unwrap_or(0) + 1)
                .max()
                .unwrap_or(0);
            level_of.insert(id, level);
        }

        let max_level = level_of.values().copied().max().unwrap_or(0);
        let mut levels: Vec<Vec<Uuid>> = vec![Vec::new(); max_level + 1];
        for (id, level) in &level_of {
            levels[*level].push(*id);
        }
        for level in &mut levels {
            level.sort_by_key(|id| (self.nodes[id].priority, self.nodes[id].order));
        }
        Ok(levels)
    }

    /// Every task whose dependency set is not fully satisfied by `completed`
    /// (defaulting to tasks with status `Done`) and is not itself completed.
    pub fn blocked_tasks(&self, completed: Option<&HashSet<Uuid>>) -> Vec<BlockedTask> {
        let owned;
        let completed = match completed {
            Some(c) => c,
            None => {
                owned = self.completed_from_status();
                &owned
            }
        };

        let mut out = Vec::new();
        let mut ids: Vec<Uuid> = self.nodes.keys().copied().collect();
        ids.sort();
        for id in ids {
            if completed.contains(&id) {
                continue;
            }
            let blocked_by: Vec<BlockReason> = self.nodes[&id]
                .dependencies
                .iter()
                .filter(|d| !completed.contains(*d))
                .map(|d| BlockReason {
                    id: *d,
                    status: self.nodes.get(d).map(|n| n.status).unwrap_or(TaskStatus::Todo),
                })
                .collect();
            if !blocked_by.is_empty() {
                out.push(BlockedTask { id, blocked_by });
            }
        }
        out
    }

    /// Whether a single task can start right now, with a human-readable reason.
    pub fn can_start(&self, id: Uuid, completed: Option<&HashSet<Uuid>>) -> StartCheck {
        let owned;
        let completed = match completed {
            Some(c) => c,
            None => {
                owned = self.completed_from_status();
                &owned
            }
        };

        let Some(node) = self.nodes.get(&id) else {
            return StartCheck {
                can_start: false,
                blocked_by: Vec::new(),
                reason: "task not found".to_string(),
            };
        };

        if node.status == TaskStatus::Done {
            return StartCheck {
                can_start: false,
                blocked_by: Vec::new(),
                reason: "already completed".to_string(),
            };
        }
        if node.status == TaskStatus::InProgress {
            return StartCheck {
                can_start: false,
                blocked_by: Vec::new(),
                reason: "already in progress".to_string(),
            };
        }

        let blocked_by: Vec<BlockReason> = node
            .dependencies
            .iter()
            .filter(|d| !completed.contains(*d))
            .map(|d| BlockReason {
                id: *d,
                status: self.nodes.get(d).map(|n| n.status).unwrap_or(TaskStatus::Todo),
            })
            .collect();

        if blocked_by.is_empty() {
            StartCheck {
                can_start: true,
                blocked_by,
                reason: "all dependencies satisfied".to_string(),
            }
        } else {
            let reason = format!("waiting for {} dependencies to complete", blocked_by.len());
            StartCheck {
                can_start: false,
                blocked_by,
                reason,
            }
        }
    }

    /// Tasks neither `Done` nor `InProgress` whose dependencies are all
    /// satisfied, ordered by priority ascending then insertion order.
    pub fn ready_tasks(&self, completed: Option<&HashSet<Uuid>>) -> Vec<Uuid> {
        let owned;
        let completed = match completed {
            Some(c) => c,
            None => {
                owned = self.completed_from_status();
                &owned
            }
        };

        let mut ready: Vec<&GraphNode> = self
            .nodes
            .values()
            .filter(|n| !matches!(n.status, TaskStatus::Done | TaskStatus::InProgress))
            .filter(|n| n.dependencies.iter().all(|d| completed.contains(d)))
            .collect();
        ready.sort_by_key(|n| (n.priority, n.order));
        ready.into_iter().map(|n| n.id).collect()
    }

    /// Direct successors of `id`.
    pub fn dependents(&self, id: Uuid) -> Vec<Uuid> {
        self.dependents.get(&id).cloned().unwrap_or_default()
    }

    /// A longest path through the DAG by node count, empty if cyclic.
    /// Ties break on the lexicographically smallest sequence of IDs.
    pub fn critical_path(&self) -> Vec<Uuid> {
        let Ok(order) = self.topological_order() else {
            return Vec::new();
        };

        let mut best_len: HashMap<Uuid, usize> = HashMap::new();
        let mut best_prev: HashMap<Uuid, Option<Uuid>> = HashMap::new();

        for id in &order {
            let node = &self.nodes[id];
            let mut len = 1;
            let mut prev = None;
            let mut deps: Vec<Uuid> = node.dependencies.iter().copied().collect();
            deps.sort();
            for dep in deps {
                let dep_len = best_len.get(&dep).copied().unwrap_or(1);
                if dep_len + 1 > len {
                    len = dep_len + 1;
                    prev = Some(dep);
                }
            }
            best_len.insert(*id, len);
            best_prev.insert(*id, prev);
        }

        let Some(mut current) = order
            .iter()
            .copied()
            .max_by_key(|id| (best_len[id], std::cmp::Reverse(*id)))
        else {
            return Vec::new();
        };

        let mut path = vec![current];
        while let Some(Some(prev)) = best_prev.get(&current) {
            path.push(*prev);
            current = *prev;
        }
        path.reverse();
        path
    }

    fn sorted_ids_where(&self, pred: impl Fn(&GraphNode) -> bool) -> VecDeque<Uuid> {
        let mut ids: Vec<&GraphNode> = self.nodes.values().filter(|n| pred(n)).collect();
        ids.sort_by_key(|n| (n.priority, n.order));
        ids.into_iter().map(|n| n.id).collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InStack,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::task::AgentRole;
    use std::collections::HashSet;

    fn make_task(id: Uuid, priority: u8, deps: &[Uuid], status: TaskStatus) -> Task {
        let mut task = Task::new(Uuid::new_v4(), "t", "d", vec![], AgentRole::Backend, priority, deps.iter().copied().collect());
        task.id = id;
        task.status = status;
        task
    }

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn diamond_topological_order_respects_edges() {
        let id = ids(4);
        let tasks = vec![
            make_task(id[0], 2, &[], TaskStatus::Todo),
            make_task(id[1], 2, &[id[0]], TaskStatus::Todo),
            make_task(id[2], 2, &[id[0]], TaskStatus::Todo),
            make_task(id[3], 2, &[id[1], id[2]], TaskStatus::Todo),
        ];
        let graph = Graph::from_tasks(&tasks);
        let order = graph.topological_order().unwrap();
        let pos = |x: Uuid| order.iter().position(|v| *v == x).unwrap();
        assert!(pos(id[0]) < pos(id[1]));
        assert!(pos(id[0]) < pos(id[2]));
        assert!(pos(id[1]) < pos(id[3]));
        assert!(pos(id[2]) < pos(id[3]));
    }

    #[test]
    fn execution_levels_group_diamond_correctly() {
        let id = ids(4);
        let tasks = vec![
            make_task(id[0], 2, &[], TaskStatus::Todo),
            make_task(id[1], 2, &[id[0]], TaskStatus::Todo),
            make_task(id[2], 2, &[id[0]], TaskStatus::Todo),
            make_task(id[3], 2, &[id[1], id[2]], TaskStatus::Todo),
        ];
        let graph = Graph::from_tasks(&tasks);
        let levels = graph.execution_levels().unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0], vec![id[0]]);
        assert_eq!(levels[2], vec![id[3]]);
    }

    #[test]
    fn cycle_is_detected() {
        let id = ids(2);
        let tasks = vec![
            make_task(id[0], 2, &[id[1]], TaskStatus::Todo),
            make_task(id[1], 2, &[id[0]], TaskStatus::Todo),
        ];
        let graph = Graph::from_tasks(&tasks);
        assert!(graph.has_cycles());
        assert!(graph.topological_order().is_err());
        assert!(graph.execution_levels().is_err());
    }

    #[test]
    fn ready_tasks_excludes_done_and_in_progress_and_respects_priority() {
        let id = ids(3);
        let tasks = vec![
            make_task(id[0], 1, &[], TaskStatus::Done),
            make_task(id[1], 3, &[id[0]], TaskStatus::Todo),
            make_task(id[2], 1, &[id[0]], TaskStatus::Todo),
        ];
        let graph = Graph::from_tasks(&tasks);
        let ready = graph.ready_tasks(None);
        assert_eq!(ready, vec![id[2], id[1]]);
    }

    #[test]
    fn can_start_reports_reasons_matching_original_semantics() {
        let id = ids(2);
        let tasks = vec![
            make_task(id[0], 2, &[], TaskStatus::Todo),
            make_task(id[1], 2, &[id[0]], TaskStatus::Todo),
        ];
        let graph = Graph::from_tasks(&tasks);

        let blocked = graph.can_start(id[1], None);
        assert!(!blocked.can_start);
        assert_eq!(blocked.reason, "waiting for 1 dependencies to complete");

        let mut completed = HashSet::new();
        completed.insert(id[0]);
        let unblocked = graph.can_start(id[1], Some(&completed));
        assert!(unblocked.can_start);
        assert_eq!(unblocked.reason, "all dependencies satisfied");
    }

    #[test]
    fn can_start_reports_already_completed_and_in_progress() {
        let id = ids(2);
        let tasks = vec![
            make_task(id[0], 2, &[], TaskStatus::Done),
            make_task(id[1], 2, &[], TaskStatus::InProgress),
        ];
        let graph = Graph::from_tasks(&tasks);
        assert_eq!(graph.can_start(id[0], None).reason, "already completed");
        assert_eq!(graph.can_start(id[1], None).reason, "already in progress");
    }

    #[test]
    fn blocked_tasks_lists_unsatisfied_predecessors() {
        let id = ids(3);
        let tasks = vec![
            make_task(id[0], 2, &[], TaskStatus::Todo),
            make_task(id[1], 2, &[id[0]], TaskStatus::Todo),
            make_task(id[2], 2, &[id[0], id[1]], TaskStatus::Todo),
        ];
        let graph = Graph::from_tasks(&tasks);
        let blocked = graph.blocked_tasks(None);
        assert_eq!(blocked.len(), 2);
    }

    #[test]
    fn critical_path_follows_longest_chain() {
        let id = ids(4);
        let tasks = vec![
            make_task(id[0], 2, &[], TaskStatus::Todo),
            make_task(id[1], 2, &[id[0]], TaskStatus::Todo),
            make_task(id[2], 2, &[id[1]], TaskStatus::Todo),
            make_task(id[3], 2, &[id[0]], TaskStatus::Todo),
        ];
        let graph = Graph::from_tasks(&tasks);
        let path = graph.critical_path();
        assert_eq!(path, vec![id[0], id[1], id[2]]);
    }

    #[test]
    fn dependents_returns_direct_successors_only() {
        let id = ids(3);
        let tasks = vec![
            make_task(id[0], 2, &[], TaskStatus::Todo),
            make_task(id[1], 2, &[id[0]], TaskStatus::Todo),
            make_task(id[2], 2, &[id[1]], TaskStatus::Todo),
        ];
        let graph = Graph::from_tasks(&tasks);
        assert_eq!(graph.dependents(id[0]), vec![id[1]]);
    }

    #[test]
    fn empty_graph_is_trivially_complete() {
        let graph = Graph::from_tasks(&[]);
        assert!(!graph.has_cycles());
        assert!(graph.ready_tasks(None).is_empty());
        assert!(graph.blocked_tasks(None).is_empty());
        assert!(graph.critical_path().is_empty());
    }
}
