use crate::models::{KpiStatus, PeriodType, ReviewStatus};
use thiserror::Error;

/// A guard or payload check that blocks a lifecycle transition. Always
/// recovered locally and surfaced as a user-facing message; the review state
/// is left untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("at least {required} accomplishments are required, found {found}")]
    AccomplishmentMinimum { required: usize, found: usize },

    #[error("accomplishment {position} needs a title and a rating")]
    AccomplishmentIncomplete { position: usize },

    #[error("item \"{name}\" has not been rated")]
    UnratedItem { item_id: i64, name: String },

    #[error("a signature is required")]
    MissingSignature,

    #[error("a review date is required")]
    MissingReviewDate,

    #[error("a rejection note is required")]
    MissingRejectionNote,

    #[error("confirm that the review can be approved without a physical meeting")]
    MeetingConfirmationRequired,

    #[error("employee self-rating is not enabled for {period} KPIs")]
    SelfRatingDisabled { period: PeriodType },

    #[error("cannot {event} while the review is {status:?}")]
    InvalidTransition {
        event: &'static str,
        status: ReviewStatus,
    },

    #[error("cannot acknowledge a KPI that is {status:?}")]
    KpiNotPending { status: KpiStatus },
}

/// Transport failure from the external review service. The message is
/// surfaced verbatim; the engine never retries.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct TransportError(pub String);

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("review service error: {0}")]
    Transport(#[from] TransportError),

    #[error("draft storage error: {0}")]
    Storage(#[from] sqlx::Error),
}
