//! Target resolver — materializes a campaign's audience selector into the
//! ordered recipient list for one dispatch cycle.
//!
//! Resolution is recomputed fresh on every cycle, so leads that arrive after
//! campaign creation are picked up automatically.

use std::collections::HashSet;
use std::sync::Arc;

use funnel_core::error::{DispatchError, DispatchResult};
use funnel_core::types::{AudienceScope, AudienceSelector, Recipient};
use tracing::debug;

use crate::submissions::SubmissionStore;

pub struct TargetResolver {
    submissions: Arc<dyn SubmissionStore>,
}

impl TargetResolver {
    pub fn new(submissions: Arc<dyn SubmissionStore>) -> Self {
        Self { submissions }
    }

    /// Resolve the selector into recipients, ordered ascending by submission
    /// time. Duplicate identities are collapsed (first submission wins).
    ///
    /// Fails with `NotFound` when the source quiz does not exist; an empty
    /// audience is not an error.
    pub fn resolve(&self, selector: &AudienceSelector) -> DispatchResult<Vec<Recipient>> {
        let submissions = self
            .submissions
            .get_submissions(selector.source_quiz_id)
            .ok_or_else(|| {
                DispatchError::not_found(format!("quiz {} not found", selector.source_quiz_id))
            })?;

        let mut recipients: Vec<Recipient> = submissions
            .into_iter()
            .filter(|s| match selector.scope {
                AudienceScope::All => true,
                AudienceScope::Completed => s.is_complete,
                AudienceScope::Abandoned => !s.is_complete,
            })
            .filter(|s| match selector.min_date {
                Some(min_date) => s.submitted_at >= min_date,
                None => true,
            })
            .map(|s| Recipient {
                identity: s.identity,
                variables: s.variables,
                is_complete: s.is_complete,
                submitted_at: s.submitted_at,
            })
            .collect();

        recipients.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));

        let mut seen: HashSet<String> = HashSet::new();
        recipients.retain(|r| seen.insert(r.identity.clone()));

        debug!(
            quiz_id = %selector.source_quiz_id,
            scope = ?selector.scope,
            count = recipients.len(),
            "Audience resolved"
        );

        Ok(recipients)
    }
}
