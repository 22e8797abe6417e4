//! The Dependency Engine: pure, stateless functions over a Task set.
//! Every function here takes `&[Task]` (or an id) and
//! returns a value; none of them touch the Store.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::{
    error::{Result, TaskError},
    models::{Priority, Task, TaskStatus},
};

/// Depth-first cycle detection with a "visiting" set. Returns the cycle
/// path (by title) if one exists.
pub fn detect_cycle(tasks: &[Task]) -> Option<Vec<String>> {
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();

    fn visit<'a>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a Task>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match marks.get(id) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|&x| x == id).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..]
                    .iter()
                    .map(|&tid| by_id.get(tid).map(|t| t.title.clone()).unwrap_or_else(|| tid.to_string()))
                    .collect();
                cycle.push(by_id.get(id).map(|t| t.title.clone()).unwrap_or_else(|| id.to_string()));
                return Some(cycle);
            }
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        stack.push(id);
        if let Some(task) = by_id.get(id) {
            for dep in &task.dependencies {
                if let Some(cycle) = visit(dep.as_str(), by_id, marks, stack) {
                    return Some(cycle);
                }
            }
        }
        stack.pop();
        marks.insert(id, Mark::Done);
        None
    }

    for task in tasks {
        if !matches!(marks.get(task.id.as_str()), Some(Mark::Done)) {
            if let Some(cycle) = visit(task.id.as_str(), &by_id, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

/// Raised before every `put` that changes `dependencies`.
/// `candidate` is the full task set *as it would be after* the write.
pub fn check_write_would_cycle(candidate: &[Task]) -> Result<()> {
    if let Some(cycle) = detect_cycle(candidate) {
        return Err(TaskError::cycle_would_form(cycle.join(" -> ")));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validates a task set, returning `{ valid, errors[], warnings[] }`.
pub fn validate(tasks: &[Task]) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    for task in tasks {
        for dep in &task.dependencies {
            if dep == &task.id {
                errors.push(format!("task '{}' depends on itself", task.title));
                continue;
            }
            match by_id.get(dep.as_str()) {
                None => errors.push(format!(
                    "task '{}' depends on missing task id {}",
                    task.title, dep
                )),
                Some(dep_task) => {
                    if dep_task.status == TaskStatus::Done {
                        warnings.push(format!(
                            "task '{}' depends on already-completed task '{}'",
                            task.title, dep_task.title
                        ));
                    }
                }
            }
        }
    }

    if let Some(cycle) = detect_cycle(tasks) {
        errors.push(format!("dependency cycle: {}", cycle.join(" -> ")));
    }

    for task in tasks {
        let depth = dependency_chain_depth(task, &by_id, &mut HashSet::new());
        if depth > 10 {
            warnings.push(format!(
                "task '{}' has a dependency chain depth of {} (> 10)",
                task.title, depth
            ));
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn dependency_chain_depth<'a>(
    task: &'a Task,
    by_id: &HashMap<&'a str, &'a Task>,
    visiting: &mut HashSet<&'a str>,
) -> usize {
    if !visiting.insert(task.id.as_str()) {
        return 0; // cycle; validate() reports it separately
    }
    let depth = task
        .dependencies
        .iter()
        .filter_map(|d| by_id.get(d.as_str()))
        .map(|dep| 1 + dependency_chain_depth(dep, by_id, visiting))
        .max()
        .unwrap_or(0);
    visiting.remove(task.id.as_str());
    depth
}

/// Kahn's algorithm with priority tie-break (high > medium > low), then
/// `createdAt` ascending, then `id` ascending as a final deterministic
/// key.
pub fn topological_sort(tasks: &[Task]) -> Result<Vec<String>> {
    if detect_cycle(tasks).is_some() {
        return Err(TaskError::validation("CycleDetected"));
    }

    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut in_degree: HashMap<&str, usize> = tasks.iter().map(|t| (t.id.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for task in tasks {
        for dep in &task.dependencies {
            if by_id.contains_key(dep.as_str()) {
                *in_degree.get_mut(task.id.as_str()).unwrap() += 1;
                dependents.entry(dep.as_str()).or_default().push(task.id.as_str());
            }
        }
    }

    let tie_break = |a: &&Task, b: &&Task| {
        b.priority
            .cmp(&a.priority)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    };

    let mut ready: Vec<&Task> = tasks
        .iter()
        .filter(|t| in_degree[t.id.as_str()] == 0)
        .collect();
    ready.sort_by(tie_break);

    let mut order = Vec::with_capacity(tasks.len());
    while let Some(next) = ready.first().copied() {
        ready.remove(0);
        order.push(next.id.clone());
        if let Some(deps) = dependents.get(next.id.as_str()) {
            for &d in deps {
                let e = in_degree.get_mut(d).unwrap();
                *e -= 1;
                if *e == 0 {
                    ready.push(by_id[d]);
                }
            }
        }
        ready.sort_by(tie_break);
    }

    Ok(order)
}

/// Priority-only fallback sort used by callers when [`topological_sort`]
/// reports `CycleDetected`.
pub fn priority_only_sort(tasks: &[Task]) -> Vec<String> {
    let mut sorted: Vec<&Task> = tasks.iter().collect();
    sorted.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
    sorted.into_iter().map(|t| t.id.clone()).collect()
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CriticalPathReport {
    pub path: Vec<String>,
    pub length: usize,
    pub bottlenecks: Vec<String>,
    pub slack: HashMap<String, usize>,
}

/// Longest path from any root (no incoming dependents) to any leaf (no
/// dependencies), by unit weight (no duration field is modeled). Slack is
/// `latest_start - earliest_start` per node; bottlenecks are nodes on the
/// critical path whose removal would shorten it, i.e. every node with
/// slack 0 and out-degree-into-critical-path > 0.
pub fn critical_path(tasks: &[Task]) -> Result<CriticalPathReport> {
    if detect_cycle(tasks).is_some() {
        return Err(TaskError::validation("CycleDetected"));
    }
    let order = topological_sort(tasks)?;
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    // earliest_finish[id] = 1 + max(earliest_finish[dep] for dep in deps), 0 if no deps
    let mut earliest: HashMap<&str, usize> = HashMap::new();
    for id in &order {
        let task = by_id[id.as_str()];
        let e = task
            .dependencies
            .iter()
            .filter_map(|d| earliest.get(d.as_str()).copied())
            .max()
            .map(|m| m + 1)
            .unwrap_or(0);
        earliest.insert(id.as_str(), e);
    }

    let length = earliest.values().copied().max().unwrap_or(0);

    // latest[id] = min(latest[dependent]) - 1 over dependents, else `length`
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for task in tasks {
        for dep in &task.dependencies {
            dependents.entry(dep.as_str()).or_default().push(task.id.as_str());
        }
    }
    let mut latest: HashMap<&str, usize> = HashMap::new();
    for id in order.iter().rev() {
        let deps_of_dependents = dependents
            .get(id.as_str())
            .into_iter()
            .flatten()
            .filter_map(|d| latest.get(d).copied());
        let l = deps_of_dependents.min().map(|m| m.saturating_sub(1)).unwrap_or(length);
        latest.insert(id.as_str(), l);
    }

    let slack: HashMap<String, usize> = order
        .iter()
        .map(|id| {
            let e = earliest[id.as_str()];
            let l = latest[id.as_str()];
            (id.clone(), l.saturating_sub(e))
        })
        .collect();

    let critical_nodes: Vec<String> = order
        .iter()
        .filter(|id| slack[id.as_str()] == 0)
        .cloned()
        .collect();

    let bottlenecks: Vec<String> = critical_nodes
        .iter()
        .filter(|id| {
            dependents
                .get(id.as_str())
                .map(|ds| ds.iter().any(|d| slack.get(*d).copied() == Some(0)))
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    Ok(CriticalPathReport {
        path: critical_nodes,
        length,
        bottlenecks,
        slack,
    })
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ImpactReport {
    /// Tasks blocked by this one (forward transitive closure: things that
    /// depend on `id`, directly or transitively).
    pub blocked_by_this: Vec<String>,
    /// Tasks this one blocks on (reverse closure: `id`'s own dependency
    /// chain).
    pub blocks_on: Vec<String>,
}

pub fn impact_analysis(tasks: &[Task], id: &str) -> ImpactReport {
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for task in tasks {
        for dep in &task.dependencies {
            dependents.entry(dep.as_str()).or_default().push(task.id.as_str());
        }
    }

    let mut blocked_by_this = Vec::new();
    let mut seen = HashSet::new();
    let mut frontier = vec![id];
    while let Some(cur) = frontier.pop() {
        if let Some(ds) = dependents.get(cur) {
            for &d in ds {
                if seen.insert(d) {
                    blocked_by_this.push(d.to_string());
                    frontier.push(d);
                }
            }
        }
    }

    let mut blocks_on = Vec::new();
    let mut seen2 = HashSet::new();
    let mut frontier2 = vec![id];
    while let Some(cur) = frontier2.pop() {
        if let Some(task) = by_id.get(cur) {
            for dep in &task.dependencies {
                if seen2.insert(dep.as_str()) {
                    blocks_on.push(dep.clone());
                    frontier2.push(dep.as_str());
                }
            }
        }
    }

    ImpactReport {
        blocked_by_this,
        blocks_on,
    }
}

/// Used only by tests and fixtures to stamp deterministic `created_at`
/// ordering without depending on wall-clock granularity.
pub fn stamp(base: DateTime<Utc>, offset_secs: i64) -> DateTime<Utc> {
    base + chrono::Duration::seconds(offset_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTask;

    fn task(id: &str, title: &str, priority: Priority, deps: &[&str], created_at: DateTime<Utc>) -> Task {
        let mut t = Task::from_new(
            NewTask {
                title: title.to_string(),
                priority: Some(priority),
                dependencies: Some(deps.iter().map(|s| s.to_string()).collect()),
                ..Default::default()
            },
            created_at,
        );
        t.id = id.to_string();
        t
    }

    #[test]
    fn detects_no_cycle_in_a_valid_chain() {
        let base = Utc::now();
        let t1 = task("t1", "A", Priority::High, &[], base);
        let t2 = task("t2", "B", Priority::Medium, &["t1"], stamp(base, 1));
        assert!(detect_cycle(&[t1, t2]).is_none());
    }

    #[test]
    fn detects_a_direct_cycle() {
        let base = Utc::now();
        let t1 = task("t1", "A", Priority::High, &["t2"], base);
        let t2 = task("t2", "B", Priority::Medium, &["t1"], stamp(base, 1));
        let cycle = detect_cycle(&[t1, t2]).expect("cycle expected");
        assert!(cycle.contains(&"A".to_string()));
        assert!(cycle.contains(&"B".to_string()));
    }

    #[test]
    fn validate_flags_missing_dependency_and_self_dependency() {
        let base = Utc::now();
        let t1 = task("t1", "A", Priority::High, &["missing"], base);
        let mut t2 = task("t2", "B", Priority::Medium, &[], stamp(base, 1));
        t2.dependencies.insert("t2".to_string());
        let report = validate(&[t1, t2]);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn validate_warns_on_dependency_to_done_task() {
        let base = Utc::now();
        let mut done = task("t1", "A", Priority::High, &[], base);
        done.status = TaskStatus::Done;
        let t2 = task("t2", "B", Priority::Medium, &["t1"], stamp(base, 1));
        let report = validate(&[done, t2]);
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn topological_sort_orders_s1_chain_correctly() {
        let base = Utc::now();
        let t1 = task("t1", "A", Priority::High, &[], base);
        let t2 = task("t2", "B", Priority::Medium, &["t1"], stamp(base, 1));
        let order = topological_sort(&[t2.clone(), t1.clone()]).unwrap();
        assert_eq!(order, vec!["t1".to_string(), "t2".to_string()]);
    }

    #[test]
    fn topological_sort_breaks_ties_by_priority_then_created_at() {
        let base = Utc::now();
        let low = task("low", "Low", Priority::Low, &[], stamp(base, 0));
        let high = task("high", "High", Priority::High, &[], stamp(base, 1));
        let order = topological_sort(&[low, high]).unwrap();
        assert_eq!(order, vec!["high".to_string(), "low".to_string()]);
    }

    #[test]
    fn topological_sort_reports_cycle_detected_on_cyclic_input() {
        let base = Utc::now();
        let t1 = task("t1", "A", Priority::High, &["t2"], base);
        let t2 = task("t2", "B", Priority::Medium, &["t1"], stamp(base, 1));
        let err = topological_sort(&[t1, t2]).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn impact_analysis_reports_forward_and_reverse_closure() {
        let base = Utc::now();
        let t1 = task("t1", "A", Priority::High, &[], base);
        let t2 = task("t2", "B", Priority::Medium, &["t1"], stamp(base, 1));
        let t3 = task("t3", "C", Priority::Medium, &["t2"], stamp(base, 2));
        let tasks = vec![t1, t2, t3];
        let impact = impact_analysis(&tasks, "t1");
        assert!(impact.blocked_by_this.contains(&"t2".to_string()));
        assert!(impact.blocked_by_this.contains(&"t3".to_string()));
        assert!(impact.blocks_on.is_empty());
    }

    #[test]
    fn critical_path_identifies_full_chain_as_critical_with_zero_slack() {
        let base = Utc::now();
        let t1 = task("t1", "A", Priority::High, &[], base);
        let t2 = task("t2", "B", Priority::Medium, &["t1"], stamp(base, 1));
        let report = critical_path(&[t1, t2]).unwrap();
        assert_eq!(report.length, 1);
        assert_eq!(report.slack["t1"], 0);
        assert_eq!(report.slack["t2"], 0);
    }
}
