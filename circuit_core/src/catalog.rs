//! Built-in workout plans.
//!
//! These ship with the binary so a session can be run without writing a
//! plan file first.

use crate::{ExerciseStep, WorkoutPlan};
use once_cell::sync::Lazy;

/// Cached default catalog - built once and reused
static DEFAULT_CATALOG: Lazy<Vec<WorkoutPlan>> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static [WorkoutPlan] {
    &DEFAULT_CATALOG
}

/// Look up a built-in plan by id
pub fn find_plan(id: &str) -> Option<&'static WorkoutPlan> {
    DEFAULT_CATALOG.iter().find(|p| p.id == id)
}

fn steps(names: &[&str]) -> Vec<ExerciseStep> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| ExerciseStep::new(*name, i as i32 + 1))
        .collect()
}

/// Builds the default catalog of sample plans
pub fn build_default_catalog() -> Vec<WorkoutPlan> {
    vec![
        WorkoutPlan {
            id: "full_body_circuit".into(),
            name: "Full-Body Circuit".into(),
            steps: steps(&["Squats", "Push-ups", "Walking lunges", "Bent-over rows", "Plank"]),
            rounds_enabled: true,
            rounds_quantity: 3,
        },
        WorkoutPlan {
            id: "core_blast".into(),
            name: "Core Blast".into(),
            steps: steps(&["Dead bug", "Side plank (left)", "Side plank (right)", "Hollow hold"]),
            rounds_enabled: true,
            rounds_quantity: 2,
        },
        WorkoutPlan {
            id: "leg_day".into(),
            name: "Leg Day".into(),
            steps: steps(&["Back squat", "Romanian deadlift", "Bulgarian split squat", "Calf raises"]),
            rounds_enabled: false,
            rounds_quantity: 1,
        },
        WorkoutPlan {
            id: "open_run".into(),
            name: "Open Run".into(),
            steps: vec![],
            rounds_enabled: false,
            rounds_quantity: 1,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_catalog_validates() {
        for plan in get_default_catalog() {
            assert!(plan.validate().is_empty(), "plan {} invalid", plan.id);
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<_> = get_default_catalog().iter().map(|p| &p.id).collect();
        assert_eq!(ids.len(), get_default_catalog().len());
    }

    #[test]
    fn test_find_plan() {
        assert_eq!(find_plan("core_blast").map(|p| p.total_rounds()), Some(2));
        assert!(find_plan("nope").is_none());
        assert!(find_plan("open_run").unwrap().steps.is_empty());
    }
}
