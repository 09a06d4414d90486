//! Core domain types for the Circuit workout system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Workout plans and their exercise steps
//! - Split and completion records produced by a session
//! - Heart-rate zones and summaries
//! - Observable session state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Plan Types
// ============================================================================

/// One exercise entry within a workout plan
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExerciseStep {
    pub name: String,
    pub order: i32,
}

impl ExerciseStep {
    pub fn new(name: impl Into<String>, order: i32) -> Self {
        Self {
            name: name.into(),
            order,
        }
    }
}

/// A user-built workout: ordered exercises, optionally repeated in rounds
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkoutPlan {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub steps: Vec<ExerciseStep>,
    #[serde(default)]
    pub rounds_enabled: bool,
    #[serde(default = "default_rounds_quantity")]
    pub rounds_quantity: u32,
}

fn default_rounds_quantity() -> u32 {
    1
}

impl WorkoutPlan {
    /// Steps in session order (stable sort by `order`, ties keep insertion order)
    pub fn ordered_steps(&self) -> Vec<ExerciseStep> {
        let mut steps = self.steps.clone();
        steps.sort_by_key(|s| s.order);
        steps
    }

    /// Number of rounds a session runs through
    pub fn total_rounds(&self) -> u32 {
        if self.rounds_enabled {
            self.rounds_quantity.max(1)
        } else {
            1
        }
    }
}

// ============================================================================
// Session Output Types
// ============================================================================

/// Recorded duration of a single completed step
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SplitRecord {
    pub duration_seconds: f64,
    pub step_index: usize,
}

/// Aggregated heart-rate readings for one session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HeartRateSummary {
    pub average_bpm: f64,
    pub min_bpm: f64,
    pub max_bpm: f64,
    pub samples: u32,
}

/// A finished workout, written to history exactly once
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompletionRecord {
    pub id: Uuid,
    pub plan_id: String,
    pub plan_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_minutes: f64,
    pub splits: Vec<SplitRecord>,
    /// True when the user ended the workout before the last step
    #[serde(default)]
    pub early: bool,
    #[serde(default)]
    pub rounds_completed: u32,
    #[serde(default)]
    pub heart_rate: Option<HeartRateSummary>,
}

// ============================================================================
// Heart Rate
// ============================================================================

/// Training zone derived from a reading as a share of maximum heart rate
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum HeartRateZone {
    Rest,
    Zone1,
    Zone2,
    Zone3,
    Zone4,
    Zone5,
}

impl HeartRateZone {
    /// Classify `bpm` against `max_bpm`
    ///
    /// Bands: <50% rest, 50-60% zone 1, 60-70% zone 2, 70-80% zone 3,
    /// 80-90% zone 4, 90%+ zone 5.
    pub fn from_bpm(bpm: f64, max_bpm: u32) -> Self {
        if max_bpm == 0 {
            return HeartRateZone::Rest;
        }
        let ratio = bpm / f64::from(max_bpm);
        match ratio {
            r if r >= 0.9 => HeartRateZone::Zone5,
            r if r >= 0.8 => HeartRateZone::Zone4,
            r if r >= 0.7 => HeartRateZone::Zone3,
            r if r >= 0.6 => HeartRateZone::Zone2,
            r if r >= 0.5 => HeartRateZone::Zone1,
            _ => HeartRateZone::Rest,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HeartRateZone::Rest => "rest",
            HeartRateZone::Zone1 => "zone 1 (very light)",
            HeartRateZone::Zone2 => "zone 2 (light)",
            HeartRateZone::Zone3 => "zone 3 (moderate)",
            HeartRateZone::Zone4 => "zone 4 (hard)",
            HeartRateZone::Zone5 => "zone 5 (maximum)",
        }
    }
}

/// Device the session runs on; decides which optional side channels exist
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceProfile {
    #[default]
    Phone,
    Watch,
}

impl DeviceProfile {
    /// Wearables sample heart rate themselves and can keep a summary
    pub fn is_wearable(&self) -> bool {
        matches!(self, DeviceProfile::Watch)
    }
}

// ============================================================================
// Session State Types
// ============================================================================

/// Lifecycle of a workout session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    NotStarted,
    Running,
    Paused,
    /// Final bookkeeping in progress (record built, history write pending)
    Completing,
    /// Terminal: completion record was produced
    Completed,
    /// Terminal: dismissed without saving
    Ended,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Ended)
    }

    /// Running or paused
    pub fn is_active(&self) -> bool {
        matches!(self, SessionPhase::Running | SessionPhase::Paused)
    }
}

/// Point-in-time copy of session state for display
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub elapsed_seconds: f64,
    pub step_index: usize,
    pub step_name: Option<String>,
    pub total_steps: usize,
    pub current_round: u32,
    pub total_rounds: u32,
    pub splits_recorded: usize,
    pub heart_rate_bpm: Option<f64>,
    pub heart_rate_zone: Option<HeartRateZone>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            phase: SessionPhase::NotStarted,
            elapsed_seconds: 0.0,
            step_index: 0,
            step_name: None,
            total_steps: 0,
            current_round: 1,
            total_rounds: 1,
            splits_recorded: 0,
            heart_rate_bpm: None,
            heart_rate_zone: None,
        }
    }
}
