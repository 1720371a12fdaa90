//! Audience resolution — turns a campaign's audience selector into a concrete
//! ordered list of recipients at dispatch time.

pub mod resolver;
pub mod submissions;

pub use resolver::TargetResolver;
pub use submissions::{InMemorySubmissionStore, Submission, SubmissionStore};
