//! Pure cost rollup over the task forest.
//!
//! Recomputes, for every task, the subtree total: the task's own cost plus
//! the cost of all transitive descendants. Leaves keep their own cost. The
//! computation never touches persistence; the incremental counterpart lives
//! in [`super::propagate`].

use std::collections::HashMap;

use uuid::Uuid;

use super::models::Task;

/// Recompute rollup costs for a flat set of tasks.
///
/// The returned set contains exactly the input tasks (no ordering
/// guarantee); only the `cost` field changes, and only for tasks with
/// descendants. A task whose parent is missing from the working set is
/// treated as a root rather than failing the whole computation.
pub fn recompute(tasks: Vec<Task>) -> Vec<Task> {
    let mut own_cost: HashMap<Uuid, i64> = HashMap::with_capacity(tasks.len());
    for task in &tasks {
        own_cost.insert(task.id, task.cost);
    }

    // Adjacency and effective parents. A dangling parent reference makes
    // the child an effective root.
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    let mut effective_parent: HashMap<Uuid, Uuid> = HashMap::new();
    let mut roots: Vec<Uuid> = Vec::new();
    for task in &tasks {
        match task.parent_id.filter(|p| own_cost.contains_key(p)) {
            Some(parent) => {
                children.entry(parent).or_default().push(task.id);
                effective_parent.insert(task.id, parent);
            }
            None => roots.push(task.id),
        }
    }

    // Depth-first preorder with an explicit stack, then fold the totals
    // upward in reverse so every child is accumulated before its parent.
    let mut order: Vec<Uuid> = Vec::with_capacity(tasks.len());
    let mut stack: Vec<Uuid> = roots;
    while let Some(id) = stack.pop() {
        order.push(id);
        if let Some(kids) = children.get(&id) {
            stack.extend(kids.iter().copied());
        }
    }

    let mut totals = own_cost;
    for id in order.iter().rev() {
        if let Some(parent) = effective_parent.get(id) {
            let subtree = totals[id];
            if let Some(parent_total) = totals.get_mut(parent) {
                *parent_total += subtree;
            }
        }
    }

    tasks
        .into_iter()
        .map(|mut task| {
            if let Some(total) = totals.get(&task.id) {
                task.cost = *total;
            }
            task
        })
        .collect()
}
