//! Dependency resolution: run this once per execution before any step runs.
//!
//! Steps are ordered by a depth-first walk over `depends_on`, in the order
//! they appear in the workflow.  Every step lands after all of its
//! dependencies; independent steps keep the order the walk produces and get
//! no other priority.
//!
//! `depends_on` entries naming no step are skipped here.  The engine later
//! treats such a step as having unmet dependencies.

use std::collections::{HashMap, HashSet};

use crate::{EngineError, models::{WorkflowDefinition, WorkflowStep}};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Return the steps in an order where every step follows its dependencies.
///
/// # Errors
/// - [`EngineError::CircularDependency`] naming the first step re-entered
///   while still being visited.  Sorting stops at that point.
pub fn resolve_order(steps: &[WorkflowStep]) -> Result<Vec<&WorkflowStep>, EngineError> {
    let mut by_id: HashMap<&str, &WorkflowStep> = HashMap::with_capacity(steps.len());
    for step in steps {
        by_id.entry(step.id.as_str()).or_insert(step);
    }

    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(steps.len());
    let mut sorted: Vec<&WorkflowStep> = Vec::with_capacity(steps.len());

    for step in steps {
        visit(step, &by_id, &mut marks, &mut sorted)?;
    }

    Ok(sorted)
}

fn visit<'w>(
    step: &'w WorkflowStep,
    by_id: &HashMap<&'w str, &'w WorkflowStep>,
    marks: &mut HashMap<&'w str, Mark>,
    sorted: &mut Vec<&'w WorkflowStep>,
) -> Result<(), EngineError> {
    match marks.get(step.id.as_str()) {
        Some(Mark::Visited) => return Ok(()),
        Some(Mark::Visiting) => return Err(EngineError::CircularDependency(step.id.clone())),
        None => {}
    }

    marks.insert(step.id.as_str(), Mark::Visiting);

    for dep_id in &step.depends_on {
        if let Some(&dep) = by_id.get(dep_id.as_str()) {
            visit(dep, by_id, marks, sorted)?;
        }
    }

    marks.insert(step.id.as_str(), Mark::Visited);
    sorted.push(step);
    Ok(())
}

// ---------------------------------------------------------------------------
// Static validation
// ---------------------------------------------------------------------------

/// A structural problem found by [`validate`].  None of these stop `execute`;
/// they explain what it will do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Two or more steps share an ID; only the first is ever resolved.
    DuplicateStepId(String),
    /// A `depends_on` entry references a step that doesn't exist, so the
    /// dependent step will be skipped.
    UnknownDependency { step_id: String, dependency: String },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateStepId(id) => write!(f, "duplicate step ID: '{id}'"),
            Self::UnknownDependency { step_id, dependency } => write!(
                f,
                "step '{step_id}' depends on unknown step '{dependency}' and will be skipped"
            ),
        }
    }
}

/// Inspect a workflow without running it.
///
/// Returns the resolved execution order (step IDs) and any diagnostics.
///
/// # Errors
/// - [`EngineError::CircularDependency`] if the graph has a cycle.
pub fn validate(workflow: &WorkflowDefinition) -> Result<(Vec<String>, Vec<Diagnostic>), EngineError> {
    let mut diagnostics = Vec::new();

    let mut seen: HashSet<&str> = HashSet::new();
    for step in &workflow.steps {
        if !seen.insert(step.id.as_str()) {
            diagnostics.push(Diagnostic::DuplicateStepId(step.id.clone()));
        }
    }

    for step in &workflow.steps {
        for dep in &step.depends_on {
            if !seen.contains(dep.as_str()) {
                diagnostics.push(Diagnostic::UnknownDependency {
                    step_id: step.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    let order = resolve_order(&workflow.steps)?
        .into_iter()
        .map(|s| s.id.clone())
        .collect();

    Ok((order, diagnostics))
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StepKind;
    use serde_json::Value;

    fn step(id: &str, deps: &[&str]) -> WorkflowStep {
        WorkflowStep::new(id, StepKind::Wait, Value::Null).depends_on(deps.iter().copied())
    }

    fn ids(steps: Vec<&WorkflowStep>) -> Vec<&str> {
        steps.into_iter().map(|s| s.id.as_str()).collect()
    }

    fn position(order: &[&str], id: &str) -> usize {
        order.iter().position(|s| *s == id).unwrap()
    }

    #[test]
    fn independent_steps_keep_declaration_order() {
        let steps = vec![step("a", &[]), step("b", &[]), step("c", &[])];
        assert_eq!(ids(resolve_order(&steps).unwrap()), vec!["a", "b", "c"]);
    }

    #[test]
    fn dependencies_are_pulled_ahead() {
        // declared c, b, a but c → b → a
        let steps = vec![step("c", &["b"]), step("b", &["a"]), step("a", &[])];
        assert_eq!(ids(resolve_order(&steps).unwrap()), vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_places_every_step_after_its_dependencies() {
        //   A
        //  / \
        // B   C
        //  \ /
        //   D
        let steps = vec![
            step("d", &["b", "c"]),
            step("c", &["a"]),
            step("b", &["a"]),
            step("a", &[]),
        ];
        let order = ids(resolve_order(&steps).unwrap());

        assert_eq!(order.len(), 4);
        for s in &steps {
            for dep in &s.depends_on {
                assert!(position(&order, dep) < position(&order, &s.id), "{dep} before {}", s.id);
            }
        }
    }

    #[test]
    fn dangling_dependency_is_ignored() {
        let steps = vec![step("a", &["ghost"]), step("b", &["a"])];
        assert_eq!(ids(resolve_order(&steps).unwrap()), vec!["a", "b"]);
    }

    #[test]
    fn two_step_cycle_is_detected() {
        let steps = vec![step("a", &["b"]), step("b", &["a"])];
        assert_eq!(
            resolve_order(&steps).unwrap_err(),
            EngineError::CircularDependency("a".into())
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let steps = vec![step("solo", &["solo"])];
        assert!(matches!(resolve_order(&steps), Err(EngineError::CircularDependency(id)) if id == "solo"));
    }

    #[test]
    fn cycle_behind_acyclic_prefix_is_detected() {
        // x is fine; y → z → w → y is not
        let steps = vec![step("x", &[]), step("y", &["z"]), step("z", &["w"]), step("w", &["y"])];
        assert!(matches!(resolve_order(&steps), Err(EngineError::CircularDependency(_))));
    }

    #[test]
    fn validate_reports_duplicates_and_unknown_dependencies() {
        let workflow = WorkflowDefinition::new(
            "wf",
            "wf",
            vec![step("a", &[]), step("a", &[]), step("b", &["missing"])],
        );
        let (order, diagnostics) = validate(&workflow).unwrap();

        assert_eq!(order, vec!["a", "b"]);
        assert_eq!(
            diagnostics,
            vec![
                Diagnostic::DuplicateStepId("a".into()),
                Diagnostic::UnknownDependency { step_id: "b".into(), dependency: "missing".into() },
            ]
        );
    }
}
