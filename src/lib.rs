pub mod accomplishments;
pub mod aggregator;
pub mod catalog;
pub mod drafts;
pub mod engine;
pub mod error;
pub mod models;
pub mod rating_parser;
pub mod service;
pub mod state_machine;

pub use accomplishments::{AccomplishmentSet, MIN_ACCOMPLISHMENTS};
pub use aggregator::{AggregationPolicy, RatingAggregator, RatingSummary};
pub use catalog::RatingCatalog;
pub use drafts::{DraftStore, MemoryDraftStore, ReviewDraft, SqliteDraftStore};
pub use engine::{FetchSequencer, FetchTicket, ReviewContext, ReviewEngine, WorkingRatings};
pub use error::{EngineError, TransportError, ValidationError};
pub use rating_parser::{ParsedRatings, RatingParser, RatingSource};
pub use service::{Notifier, NullNotifier, ReviewService, Severity};
pub use state_machine::{
    EmployeeConfirmation, ItemRatingDraft, ManagerReviewSubmission, RejectionResolution,
    ReviewStateMachine, SelfRatingSubmission,
};
