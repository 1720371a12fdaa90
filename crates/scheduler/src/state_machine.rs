use funnel_core::error::{DispatchError, DispatchResult};
use funnel_core::types::CampaignStatus;
use serde::{Deserialize, Serialize};

/// Describes a single valid transition in the campaign lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: CampaignStatus,
    pub to: CampaignStatus,
    pub trigger: String,
}

/// Guards the campaign lifecycle by enforcing a finite set of valid
/// transitions. A paused campaign can only resume; it never returns to
/// draft.
#[derive(Debug, Clone)]
pub struct CampaignStateMachine {
    pub transitions: Vec<StateTransition>,
}

impl CampaignStateMachine {
    pub fn new() -> Self {
        let transitions = vec![
            // Draft ->
            StateTransition {
                from: CampaignStatus::Draft,
                to: CampaignStatus::Scheduled,
                trigger: "schedule".to_string(),
            },
            StateTransition {
                from: CampaignStatus::Draft,
                to: CampaignStatus::Active,
                trigger: "activate_immediately".to_string(),
            },
            // Scheduled ->
            StateTransition {
                from: CampaignStatus::Scheduled,
                to: CampaignStatus::Active,
                trigger: "schedule_due".to_string(),
            },
            // Active ->
            StateTransition {
                from: CampaignStatus::Active,
                to: CampaignStatus::Paused,
                trigger: "pause".to_string(),
            },
            StateTransition {
                from: CampaignStatus::Active,
                to: CampaignStatus::Completed,
                trigger: "all_recipients_terminal".to_string(),
            },
            StateTransition {
                from: CampaignStatus::Active,
                to: CampaignStatus::Failed,
                trigger: "configuration_error".to_string(),
            },
            // Paused ->
            StateTransition {
                from: CampaignStatus::Paused,
                to: CampaignStatus::Active,
                trigger: "resume".to_string(),
            },
        ];

        Self { transitions }
    }

    /// Returns `true` if the given transition is allowed.
    pub fn can_transition(&self, from: CampaignStatus, to: CampaignStatus) -> bool {
        self.transitions
            .iter()
            .any(|t| t.from == from && t.to == to)
    }

    /// Validates a transition, returning the target status on success.
    pub fn transition(
        &self,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> DispatchResult<CampaignStatus> {
        if self.can_transition(from, to) {
            Ok(to)
        } else {
            Err(DispatchError::validation(format!(
                "invalid campaign transition from {:?} to {:?}",
                from, to
            )))
        }
    }
}

impl Default for CampaignStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_happy_path() {
        let sm = CampaignStateMachine::new();
        assert!(sm.can_transition(CampaignStatus::Draft, CampaignStatus::Scheduled));
        assert!(sm.can_transition(CampaignStatus::Scheduled, CampaignStatus::Active));
        assert!(sm.can_transition(CampaignStatus::Active, CampaignStatus::Paused));
        assert!(sm.can_transition(CampaignStatus::Paused, CampaignStatus::Active));
        assert!(sm.can_transition(CampaignStatus::Active, CampaignStatus::Completed));
        assert!(sm.can_transition(CampaignStatus::Active, CampaignStatus::Failed));
    }

    #[test]
    fn test_paused_never_returns_to_draft() {
        let sm = CampaignStateMachine::new();
        assert!(!sm.can_transition(CampaignStatus::Paused, CampaignStatus::Draft));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let sm = CampaignStateMachine::new();
        for to in [
            CampaignStatus::Draft,
            CampaignStatus::Scheduled,
            CampaignStatus::Active,
            CampaignStatus::Paused,
        ] {
            assert!(!sm.can_transition(CampaignStatus::Completed, to));
            assert!(!sm.can_transition(CampaignStatus::Failed, to));
        }
    }

    #[test]
    fn test_invalid_transition_is_validation_error() {
        let sm = CampaignStateMachine::new();
        let result = sm.transition(CampaignStatus::Paused, CampaignStatus::Draft);
        assert!(matches!(result, Err(DispatchError::Validation(_))));
    }
}
