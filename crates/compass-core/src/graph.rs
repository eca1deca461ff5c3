//! Dependency graph analysis for a plan's tasks.
//!
//! [`DependencyGraph`] is a derived read-model: it is rebuilt from a task
//! snapshot on demand and never stored. It answers ordering questions
//! (topological sort, critical path), partitions tasks into
//! ready/waiting/blocked, and detects dependency cycles.
//!
//! All walks are cycle-safe. Nodes live in a map keyed by task id, and an
//! insertion-order vector is kept alongside so every traversal and tie-break
//! is deterministic for a given task order.

use std::collections::{HashMap, HashSet};

use crate::models::{Task, TaskStatus};

/// Per-task metadata computed at graph-build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    /// Task id
    pub id: String,
    /// Direct dependency ids (forward edges)
    pub dependencies: Vec<String>,
    /// Ids of tasks that depend on this one (reverse edges)
    pub dependents: Vec<String>,
    /// Longest dependency chain below this node; 0 when it has none. A
    /// back-edge inside a cycle contributes 0 instead of recursing.
    pub depth: usize,
    /// Task status mirrored at build time
    pub status: TaskStatus,
}

/// Cycle detection result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleInfo {
    /// Whether a dependency cycle exists
    pub has_cycle: bool,
    /// The cycle with both endpoints present (closing edge at the end);
    /// empty when there is no cycle
    pub cycle_path: Vec<String>,
}

/// Scheduling partition of the not-yet-settled tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOrder {
    /// Tasks that can execute now, sorted by ascending depth
    pub ready: Vec<String>,
    /// Tasks still waiting on unfinished dependencies
    pub waiting: Vec<String>,
    /// Tasks with at least one failed dependency
    pub blocked: Vec<String>,
    /// Topological order over all nodes regardless of status (partial when
    /// the graph has a cycle)
    pub sorted_order: Vec<String>,
}

/// Result of checking new dependencies against the existing tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyValidation {
    /// True when every referenced id exists
    pub valid: bool,
    /// One message per dangling dependency id
    pub errors: Vec<String>,
}

/// Reports dependency ids that do not (yet) exist in the plan.
///
/// Dangling ids are legal at task creation time, so this is advisory: the
/// store never rejects them, but planners can surface the messages before
/// committing a plan revision.
pub fn validate_dependencies(existing: &[Task], dependencies: &[String]) -> DependencyValidation {
    let existing_ids: HashSet<&str> = existing.iter().map(|t| t.id.as_str()).collect();

    let errors: Vec<String> = dependencies
        .iter()
        .filter(|dep| !existing_ids.contains(dep.as_str()))
        .map(|dep| format!("Dependency \"{dep}\" does not exist"))
        .collect();

    DependencyValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Dependency analysis over one plan's tasks.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, DependencyNode>,
    /// Task insertion order; fixes iteration order for every walk.
    order: Vec<String>,
}

impl DependencyGraph {
    /// Builds the graph from a task snapshot.
    ///
    /// Forward edges come straight from each task's dependency list; reverse
    /// edges are wired for every dependency that resolves to a known task.
    /// Dangling dependency ids stay in the forward list but get no reverse
    /// edge. Depths are computed once here.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut graph = Self::default();

        for task in tasks {
            graph.order.push(task.id.clone());
            graph.nodes.insert(
                task.id.clone(),
                DependencyNode {
                    id: task.id.clone(),
                    dependencies: task.dependencies.clone(),
                    dependents: Vec::new(),
                    depth: 0,
                    status: task.status,
                },
            );
        }

        for task in tasks {
            for dep_id in &task.dependencies {
                if let Some(dep_node) = graph.nodes.get_mut(dep_id) {
                    dep_node.dependents.push(task.id.clone());
                }
            }
        }

        graph.compute_depths();
        graph
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Gets a node by task id.
    pub fn node(&self, task_id: &str) -> Option<&DependencyNode> {
        self.nodes.get(task_id)
    }

    /// All nodes in task insertion order.
    pub fn nodes(&self) -> Vec<&DependencyNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id)).collect()
    }

    /// Overrides the mirrored status of a node, so execution order can be
    /// re-derived without rebuilding from tasks.
    pub fn update_status(&mut self, task_id: &str, status: TaskStatus) {
        if let Some(node) = self.nodes.get_mut(task_id) {
            node.status = status;
        }
    }

    fn compute_depths(&mut self) {
        let mut memo: HashMap<String, usize> = HashMap::new();

        for id in &self.order {
            let mut path: HashSet<String> = HashSet::new();
            Self::depth_of(&self.nodes, id, &mut memo, &mut path);
        }

        for (id, depth) in memo {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.depth = depth;
            }
        }
    }

    /// Memoized longest-chain depth. `path` is the explicit recursion stack:
    /// revisiting a node already on it means a back-edge, which contributes
    /// depth 0 rather than recursing forever.
    fn depth_of(
        nodes: &HashMap<String, DependencyNode>,
        id: &str,
        memo: &mut HashMap<String, usize>,
        path: &mut HashSet<String>,
    ) -> usize {
        if path.contains(id) {
            return 0;
        }
        if let Some(depth) = memo.get(id) {
            return *depth;
        }

        let Some(node) = nodes.get(id) else {
            return 0;
        };
        if node.dependencies.is_empty() {
            memo.insert(id.to_string(), 0);
            return 0;
        }

        path.insert(id.to_string());
        let mut max_depth = 0;
        for dep_id in &node.dependencies {
            if nodes.contains_key(dep_id) {
                max_depth = max_depth.max(Self::depth_of(nodes, dep_id, memo, path) + 1);
            }
        }
        path.remove(id);

        memo.insert(id.to_string(), max_depth);
        max_depth
    }

    /// Detects a dependency cycle, if any.
    ///
    /// Runs a DFS with an explicit recursion stack; the first back-edge
    /// found yields the cycle path with the closing node repeated at the
    /// end (a 3-cycle produces a 4-element path). Deterministic for a fixed
    /// task order.
    pub fn detect_cycle(&self) -> CycleInfo {
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack: HashSet<String> = HashSet::new();
        let mut path: Vec<String> = Vec::new();

        for id in &self.order {
            if !visited.contains(id) {
                if let Some(cycle) = self.cycle_dfs(id, &mut visited, &mut stack, &mut path) {
                    return CycleInfo {
                        has_cycle: true,
                        cycle_path: cycle,
                    };
                }
            }
        }

        CycleInfo {
            has_cycle: false,
            cycle_path: Vec::new(),
        }
    }

    fn cycle_dfs(
        &self,
        id: &str,
        visited: &mut HashSet<String>,
        stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(id.to_string());
        stack.insert(id.to_string());
        path.push(id.to_string());

        if let Some(node) = self.nodes.get(id) {
            for dep_id in &node.dependencies {
                if !self.nodes.contains_key(dep_id) {
                    continue;
                }
                if !visited.contains(dep_id) {
                    if let Some(cycle) = self.cycle_dfs(dep_id, visited, stack, path) {
                        return Some(cycle);
                    }
                } else if stack.contains(dep_id) {
                    // Back-edge: the cycle is the path suffix starting at the
                    // revisited node, closed by repeating it.
                    let start = path.iter().position(|p| p == dep_id).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..].to_vec();
                    cycle.push(dep_id.clone());
                    return Some(cycle);
                }
            }
        }

        path.pop();
        stack.remove(id);
        None
    }

    /// Topological order over all nodes (dependencies first).
    ///
    /// If a cycle is hit mid-sort the nodes visited so far are returned as a
    /// partial order; callers that need completeness must check
    /// [`DependencyGraph::detect_cycle`] first.
    pub fn topological_sort(&self) -> Vec<String> {
        let mut result: Vec<String> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut in_progress: HashSet<String> = HashSet::new();

        for id in &self.order {
            if !visited.contains(id)
                && !self.sort_visit(id, &mut visited, &mut in_progress, &mut result)
            {
                return result;
            }
        }

        result
    }

    fn sort_visit(
        &self,
        id: &str,
        visited: &mut HashSet<String>,
        in_progress: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) -> bool {
        if in_progress.contains(id) {
            return false;
        }
        if visited.contains(id) {
            return true;
        }

        in_progress.insert(id.to_string());
        if let Some(node) = self.nodes.get(id) {
            for dep_id in &node.dependencies {
                if self.nodes.contains_key(dep_id)
                    && !self.sort_visit(dep_id, visited, in_progress, result)
                {
                    return false;
                }
            }
        }
        in_progress.remove(id);

        visited.insert(id.to_string());
        result.push(id.to_string());
        true
    }

    /// Partitions the unsettled tasks into ready, waiting, and blocked.
    ///
    /// Completed, failed, skipped, and running tasks are excluded. A task is
    /// blocked when any dependency failed, ready when every dependency is
    /// completed or skipped, and waiting otherwise (including unresolvable
    /// dangling dependencies). Ready tasks are sorted by ascending depth with
    /// discovery-order ties.
    pub fn execution_order(&self) -> ExecutionOrder {
        let mut ready: Vec<String> = Vec::new();
        let mut waiting: Vec<String> = Vec::new();
        let mut blocked: Vec<String> = Vec::new();

        for id in &self.order {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if node.status.is_settled() || node.status == TaskStatus::Running {
                continue;
            }

            let has_failed_dep = node.dependencies.iter().any(|dep_id| {
                self.nodes
                    .get(dep_id)
                    .is_some_and(|dep| dep.status == TaskStatus::Failed)
            });
            if has_failed_dep {
                blocked.push(id.clone());
                continue;
            }

            if self.dependencies_satisfied(node) {
                ready.push(id.clone());
            } else {
                waiting.push(id.clone());
            }
        }

        // Stable sort keeps discovery order among equal depths.
        ready.sort_by_key(|id| self.nodes.get(id).map_or(0, |n| n.depth));

        ExecutionOrder {
            ready,
            waiting,
            blocked,
            sorted_order: self.topological_sort(),
        }
    }

    fn dependencies_satisfied(&self, node: &DependencyNode) -> bool {
        node.dependencies.iter().all(|dep_id| {
            self.nodes
                .get(dep_id)
                .is_some_and(|dep| dep.status.is_satisfied())
        })
    }

    /// True when the task exists and has no unfinished dependencies.
    pub fn can_execute(&self, task_id: &str) -> bool {
        self.nodes
            .get(task_id)
            .is_some_and(|node| self.dependencies_satisfied(node))
    }

    /// Transitive dependents of `task_id`: everything that becomes
    /// unreachable if it fails. Cycle-safe via a visited set.
    pub fn blocked_by_failure(&self, task_id: &str) -> Vec<String> {
        let mut result: Vec<String> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        self.collect_dependents(task_id, &mut visited, &mut result);
        result
    }

    fn collect_dependents(
        &self,
        id: &str,
        visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        for dep_id in &node.dependents {
            if visited.insert(dep_id.clone()) {
                result.push(dep_id.clone());
                self.collect_dependents(dep_id, visited, result);
            }
        }
    }

    /// Direct dependents of `task_id` that are currently blocked and would
    /// become executable once `task_id` completes (every *other* dependency
    /// already completed or skipped).
    pub fn unblocked_on_complete(&self, task_id: &str) -> Vec<String> {
        let Some(node) = self.nodes.get(task_id) else {
            return Vec::new();
        };

        node.dependents
            .iter()
            .filter(|dep_id| {
                let Some(dependent) = self.nodes.get(dep_id.as_str()) else {
                    return false;
                };
                if dependent.status != TaskStatus::Blocked {
                    return false;
                }
                dependent.dependencies.iter().all(|other_id| {
                    other_id == task_id
                        || self
                            .nodes
                            .get(other_id)
                            .is_some_and(|other| other.status.is_satisfied())
                })
            })
            .cloned()
            .collect()
    }

    /// Transitive dependencies of a task, in discovery order.
    pub fn ancestors(&self, task_id: &str) -> Vec<String> {
        let mut result: Vec<String> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        self.collect_edges(task_id, &mut visited, &mut result, true);
        result
    }

    /// Transitive dependents of a task, in discovery order.
    pub fn descendants(&self, task_id: &str) -> Vec<String> {
        let mut result: Vec<String> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        self.collect_edges(task_id, &mut visited, &mut result, false);
        result
    }

    fn collect_edges(
        &self,
        id: &str,
        visited: &mut HashSet<String>,
        result: &mut Vec<String>,
        forward: bool,
    ) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let edges = if forward {
            &node.dependencies
        } else {
            &node.dependents
        };
        for next_id in edges {
            if visited.insert(next_id.clone()) {
                result.push(next_id.clone());
                self.collect_edges(next_id, visited, result, forward);
            }
        }
    }

    /// The longest dependency chain through the graph, forward-ordered.
    ///
    /// Walks backward from the deepest node, at each step taking the
    /// dependency with the greatest depth. Ties pick the first match in the
    /// dependency list; that tie-break is arbitrary but stable. A graph
    /// whose maximum depth is 0 yields an empty path.
    pub fn critical_path(&self) -> Vec<String> {
        let mut max_depth = 0;
        let mut deepest: Option<&str> = None;

        for id in &self.order {
            if let Some(node) = self.nodes.get(id) {
                if node.depth > max_depth {
                    max_depth = node.depth;
                    deepest = Some(id);
                }
            }
        }

        let Some(start) = deepest else {
            return Vec::new();
        };

        let mut path: Vec<String> = vec![start.to_string()];
        let mut current = start.to_string();
        // Guards the backward walk against cycles.
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(current.clone());

        loop {
            let Some(node) = self.nodes.get(&current) else {
                break;
            };

            let mut best: Option<(&String, usize)> = None;
            for dep_id in &node.dependencies {
                if let Some(dep) = self.nodes.get(dep_id) {
                    let deeper = match best {
                        Some((_, depth)) => dep.depth > depth,
                        None => true,
                    };
                    if deeper {
                        best = Some((dep_id, dep.depth));
                    }
                }
            }

            let Some((next, _)) = best else {
                break;
            };
            if !seen.insert(next.clone()) {
                break;
            }
            path.insert(0, next.clone());
            current = next.clone();
        }

        path
    }
}
