use crate::error::TransportError;
use crate::models::{
    DepartmentFeatures, ItemRatingRecord, Kpi, KpiReview, PeriodType, RatingOption,
};
use crate::state_machine::{
    EmployeeConfirmation, ManagerReviewSubmission, RejectionResolution, SelfRatingSubmission,
};
use async_trait::async_trait;

/// The external review system the engine talks to. Implementations own the
/// wire format and timeouts; the engine never retries a failed call.
#[async_trait]
pub trait ReviewService: Send + Sync {
    async fn get_kpi(&self, kpi_id: i64) -> Result<Kpi, TransportError>;

    async fn get_review(&self, kpi_id: i64) -> Result<KpiReview, TransportError>;

    async fn get_item_ratings(&self, review_id: i64)
        -> Result<Vec<ItemRatingRecord>, TransportError>;

    async fn get_rating_options(
        &self,
        period: PeriodType,
    ) -> Result<Vec<RatingOption>, TransportError>;

    async fn get_department_features(&self) -> Result<DepartmentFeatures, TransportError>;

    async fn post_acknowledgement(
        &self,
        kpi_id: i64,
        signature: &str,
    ) -> Result<(), TransportError>;

    async fn post_self_rating(
        &self,
        kpi_id: i64,
        payload: &SelfRatingSubmission,
    ) -> Result<(), TransportError>;

    async fn post_manager_review(
        &self,
        review_id: i64,
        payload: &ManagerReviewSubmission,
    ) -> Result<(), TransportError>;

    async fn post_employee_confirmation(
        &self,
        review_id: i64,
        payload: &EmployeeConfirmation,
    ) -> Result<(), TransportError>;

    async fn post_rejection(&self, review_id: i64, note: &str) -> Result<(), TransportError>;

    async fn post_rejection_resolution(
        &self,
        review_id: i64,
        payload: &RejectionResolution,
    ) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// User-facing message sink injected into the engine, so validation and
/// transport failures reach the UI without the engine touching any global
/// notification mechanism.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}

/// Notifier that drops everything, for headless callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _severity: Severity, _message: &str) {}
}
