//! Loading and validating workout plan files.
//!
//! Plans are TOML documents:
//!
//! ```toml
//! id = "core_circuit"
//! name = "Core Circuit"
//! rounds_enabled = true
//! rounds_quantity = 3
//!
//! [[steps]]
//! name = "Plank"
//! order = 1
//!
//! [[steps]]
//! name = "Dead bug"
//! order = 2
//! ```

use crate::{Error, Result, WorkoutPlan};
use std::collections::HashSet;
use std::path::Path;

impl WorkoutPlan {
    /// Load a plan from a TOML file and reject it if it has errors
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let plan = Self::from_toml_str(&contents)?;
        tracing::info!("Loaded plan '{}' from {:?}", plan.id, path);
        Ok(plan)
    }

    /// Parse a plan from TOML text and reject it if it has errors
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let plan: WorkoutPlan = toml::from_str(contents)?;

        let errors = plan.validate();
        if !errors.is_empty() {
            return Err(Error::PlanValidation(errors.join("; ")));
        }

        for warning in plan.warnings() {
            tracing::warn!("Plan '{}': {}", plan.id, warning);
        }
        Ok(plan)
    }

    /// Problems that make the plan unusable
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.id.trim().is_empty() {
            errors.push("Plan has empty ID".to_string());
        }
        if self.name.trim().is_empty() {
            errors.push(format!("Plan '{}' has empty name", self.id));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if step.name.trim().is_empty() {
                errors.push(format!("Plan '{}': step {} has empty name", self.id, i + 1));
            }
        }
        if self.rounds_enabled && self.rounds_quantity == 0 {
            errors.push(format!(
                "Plan '{}': rounds are enabled but rounds_quantity is 0",
                self.id
            ));
        }

        errors
    }

    /// Tolerated oddities worth telling the user about
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();

        for step in &self.steps {
            if !seen.insert(step.order) {
                warnings.push(format!(
                    "order {} is used more than once; file order breaks the tie",
                    step.order
                ));
            }
        }
        if self.steps.is_empty() {
            warnings.push("no steps; the session runs as a single timed block".to_string());
        }

        warnings
    }
}
