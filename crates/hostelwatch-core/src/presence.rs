//! Containment tracking and transition detection.
//!
//! [`PresenceEvaluator`] owns the last-known [`ContainmentState`] and turns
//! each successful [`GeofenceResult`] into a [`Transition`]. Failed checks are
//! never fed to the evaluator, so they cannot flip containment.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::geofence::GeofenceResult;

/// Last-known classification of the tracked device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainmentState {
    /// Inside the hostel geofence.
    Inside,
    /// Outside the hostel geofence.
    Outside,
    /// No successful check yet.
    #[default]
    Unknown,
}

impl ContainmentState {
    const fn from_inside(is_in_hostel: bool) -> Self {
        if is_in_hostel {
            Self::Inside
        } else {
            Self::Outside
        }
    }
}

impl std::fmt::Display for ContainmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inside => f.write_str("inside"),
            Self::Outside => f.write_str("outside"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Change in containment between consecutive successful checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transition {
    /// Now inside; previously outside or unknown.
    Entered,
    /// Now outside; previously inside or unknown.
    Exited,
    /// Same classification as the previous check.
    Unchanged,
}

/// Result of evaluating one geofence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// The computed transition.
    pub transition: Transition,

    /// Whether the "outside the geofence" alert should fire for this check.
    pub alert: bool,
}

/// Tracks containment across successful geofence checks.
#[derive(Debug, Clone, Default)]
pub struct PresenceEvaluator {
    state: ContainmentState,
    last_result: Option<GeofenceResult>,
}

impl PresenceEvaluator {
    /// Creates an evaluator in the [`ContainmentState::Unknown`] state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current containment state.
    #[must_use]
    pub const fn state(&self) -> ContainmentState {
        self.state
    }

    /// The result that produced the current state, if any.
    #[must_use]
    pub const fn last_result(&self) -> Option<&GeofenceResult> {
        self.last_result.as_ref()
    }

    /// Computes the transition `result` would cause, without storing it.
    ///
    /// The first observation is always a transition, so an initial status is
    /// rendered even when the device never moves. The alert fires only on an
    /// [`Transition::Exited`] computed here, never while stably outside.
    #[must_use]
    pub const fn assess(&self, result: &GeofenceResult) -> Evaluation {
        let next = ContainmentState::from_inside(result.is_in_hostel);
        let transition = match (self.state, next) {
            (ContainmentState::Inside, ContainmentState::Inside)
            | (ContainmentState::Outside, ContainmentState::Outside) => Transition::Unchanged,
            (_, ContainmentState::Inside) => Transition::Entered,
            (_, _) => Transition::Exited,
        };

        Evaluation {
            transition,
            alert: matches!(transition, Transition::Exited),
        }
    }

    /// Compares `result` with the stored state, then stores the new state.
    pub fn evaluate(&mut self, result: &GeofenceResult) -> Evaluation {
        let previous = self.state;
        let evaluation = self.assess(result);
        let next = ContainmentState::from_inside(result.is_in_hostel);

        self.state = next;
        self.last_result = Some(*result);

        if evaluation.transition == Transition::Unchanged {
            debug!(state = %next, distance_m = result.distance_meters, "containment_unchanged");
        } else {
            info!(
                from = %previous,
                to = %next,
                transition = ?evaluation.transition,
                distance_m = result.distance_meters,
                alert = evaluation.alert,
                "containment_transition"
            );
        }

        evaluation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geofence::Coordinates;

    fn result(is_in_hostel: bool) -> GeofenceResult {
        GeofenceResult {
            current_location: Coordinates::from([12.9, 77.6]),
            hostel_location: Coordinates::from([12.9, 77.6]),
            distance_meters: if is_in_hostel { 0.0 } else { 500.0 },
            is_in_hostel,
        }
    }

    #[test]
    fn test_starts_unknown() {
        let evaluator = PresenceEvaluator::new();
        assert_eq!(evaluator.state(), ContainmentState::Unknown);
        assert!(evaluator.last_result().is_none());
    }

    #[test]
    fn test_first_result_is_always_a_transition() {
        let mut inside = PresenceEvaluator::new();
        assert_eq!(inside.evaluate(&result(true)).transition, Transition::Entered);

        let mut outside = PresenceEvaluator::new();
        let evaluation = outside.evaluate(&result(false));
        assert_eq!(evaluation.transition, Transition::Exited);
        assert!(evaluation.alert);
    }

    #[test]
    fn test_equal_consecutive_results_are_unchanged() {
        let mut evaluator = PresenceEvaluator::new();
        evaluator.evaluate(&result(true));
        assert_eq!(
            evaluator.evaluate(&result(true)).transition,
            Transition::Unchanged
        );

        evaluator.evaluate(&result(false));
        let evaluation = evaluator.evaluate(&result(false));
        assert_eq!(evaluation.transition, Transition::Unchanged);
        assert!(!evaluation.alert);
    }

    #[test]
    fn test_state_follows_latest_result() {
        let sequence = [true, true, false, true, false, false, true];
        let mut evaluator = PresenceEvaluator::new();
        for (n, &inside) in sequence.iter().enumerate() {
            evaluator.evaluate(&result(inside));
            let expected = if inside {
                ContainmentState::Inside
            } else {
                ContainmentState::Outside
            };
            assert_eq!(evaluator.state(), expected, "after result {}", n + 1);
        }
    }

    #[test]
    fn test_alert_fires_once_per_exit() {
        let sequence = [true, false, false, false, true, false, false];
        let mut evaluator = PresenceEvaluator::new();
        let alerts = sequence
            .iter()
            .filter(|&&inside| evaluator.evaluate(&result(inside)).alert)
            .count();
        assert_eq!(alerts, 2);
    }

    #[test]
    fn test_assess_leaves_state_alone() {
        let mut evaluator = PresenceEvaluator::new();
        let first = evaluator.assess(&result(false));
        assert_eq!(first.transition, Transition::Exited);
        assert_eq!(evaluator.assess(&result(false)), first);
        assert_eq!(evaluator.state(), ContainmentState::Unknown);
        assert!(evaluator.last_result().is_none());

        assert_eq!(evaluator.evaluate(&result(false)), first);
        assert_eq!(
            evaluator.assess(&result(false)).transition,
            Transition::Unchanged
        );
    }

    #[test]
    fn test_transition_table() {
        let mut evaluator = PresenceEvaluator::new();
        let observed: Vec<Transition> = [false, true, true, false]
            .iter()
            .map(|&inside| evaluator.evaluate(&result(inside)).transition)
            .collect();
        assert_eq!(
            observed,
            vec![
                Transition::Exited,
                Transition::Entered,
                Transition::Unchanged,
                Transition::Exited
            ]
        );
    }
}
