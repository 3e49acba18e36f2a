use crate::accomplishments::AccomplishmentSet;
use crate::aggregator::{AggregationPolicy, RatingAggregator, RatingSummary};
use crate::catalog::RatingCatalog;
use crate::drafts::{DraftStore, ReviewDraft};
use crate::error::{EngineError, TransportError, ValidationError};
use crate::models::{
    DepartmentFeatures, ItemRatingRecord, Kpi, KpiReview, RaterRole,
};
use crate::rating_parser::{RatingParser, RatingSource};
use crate::service::{Notifier, ReviewService, Severity};
use crate::state_machine::{
    EmployeeConfirmation, ManagerReviewSubmission, RejectionResolution, ReviewStateMachine,
    SelfRatingSubmission,
};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Cooperative at-most-one-outstanding-request bookkeeping. Starting a fetch
/// for a resource invalidates every earlier ticket for the same resource;
/// a completion holding a stale ticket discards its result.
#[derive(Debug, Default)]
pub struct FetchSequencer {
    generations: Mutex<HashMap<String, u64>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: String,
    generation: u64,
}

impl FetchSequencer {
    pub fn begin(&self, key: &str) -> FetchTicket {
        let mut generations = self.generations.lock().expect("fetch sequencer poisoned");
        let generation = generations
            .entry(key.to_string())
            .and_modify(|g| *g += 1)
            .or_insert(1);
        FetchTicket {
            key: key.to_string(),
            generation: *generation,
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        let generations = self.generations.lock().expect("fetch sequencer poisoned");
        generations.get(&ticket.key).copied() == Some(ticket.generation)
    }
}

/// One role's editable view of the item ratings, materialized from whichever
/// source the parser found authoritative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingRatings {
    pub ratings: BTreeMap<i64, f64>,
    pub comments: BTreeMap<i64, String>,
    pub flat_comment: Option<String>,
}

impl WorkingRatings {
    fn from_source(source: &RatingSource) -> Self {
        WorkingRatings {
            ratings: source.ratings().cloned().unwrap_or_default(),
            comments: source.comments().cloned().unwrap_or_default(),
            flat_comment: source.flat_comment().map(str::to_string),
        }
    }
}

/// Everything the UI needs to render and edit one KPI review.
#[derive(Debug, Clone)]
pub struct ReviewContext {
    pub kpi: Kpi,
    pub review: KpiReview,
    pub features: DepartmentFeatures,
    pub catalog: RatingCatalog,
    pub policy: AggregationPolicy,
    pub employee: WorkingRatings,
    pub manager: WorkingRatings,
    pub accomplishments: AccomplishmentSet,
}

impl ReviewContext {
    pub fn working(&self, role: RaterRole) -> &WorkingRatings {
        match role {
            RaterRole::Employee => &self.employee,
            RaterRole::Manager => &self.manager,
        }
    }

    pub fn set_rating(&mut self, role: RaterRole, item_id: i64, rating: f64) {
        let side = match role {
            RaterRole::Employee => &mut self.employee,
            RaterRole::Manager => &mut self.manager,
        };
        side.ratings.insert(item_id, rating);
    }

    pub fn set_comment(&mut self, role: RaterRole, item_id: i64, comment: String) {
        let side = match role {
            RaterRole::Employee => &mut self.employee,
            RaterRole::Manager => &mut self.manager,
        };
        side.comments.insert(item_id, comment);
    }
}

/// Front door of the review engine. Owns the external service, the draft
/// store and the notifier; every mutation validates first, posts second and
/// applies the local transition only after the service accepted it.
pub struct ReviewEngine<S, D, N> {
    service: S,
    drafts: D,
    notifier: N,
    fetches: FetchSequencer,
}

impl<S, D, N> ReviewEngine<S, D, N>
where
    S: ReviewService,
    D: DraftStore,
    N: Notifier,
{
    pub fn new(service: S, drafts: D, notifier: N) -> Self {
        ReviewEngine {
            service,
            drafts,
            notifier,
            fetches: FetchSequencer::default(),
        }
    }

    /// Fetch everything needed to render one KPI review. Returns `Ok(None)`
    /// when a newer fetch for the same KPI was started while this one was in
    /// flight; the caller just drops the stale result.
    pub async fn load_context(&self, kpi_id: i64) -> Result<Option<ReviewContext>, EngineError> {
        let ticket = self.fetches.begin(&format!("review-context:{kpi_id}"));

        let kpi = self.fetch(self.service.get_kpi(kpi_id).await)?;
        let review = self.fetch(self.service.get_review(kpi_id).await)?;
        let period = kpi.period.period_type;
        let options = self.fetch(self.service.get_rating_options(period).await)?;
        let features = self.fetch(self.service.get_department_features().await)?;

        if !self.fetches.is_current(&ticket) {
            tracing::debug!("dropping superseded fetch for kpi {kpi_id}");
            return Ok(None);
        }

        let parsed = RatingParser::parse(&review);
        let accomplishments =
            AccomplishmentSet::from_records(review.id, review.accomplishments.clone());
        Ok(Some(ReviewContext {
            catalog: RatingCatalog::from_options(period, options),
            policy: AggregationPolicy::for_period(&features, period),
            employee: WorkingRatings::from_source(&parsed.employee),
            manager: WorkingRatings::from_source(&parsed.manager),
            accomplishments,
            kpi,
            review,
            features,
        }))
    }

    /// Raw per-item rating history for HR views, straight from the service.
    pub async fn item_rating_history(
        &self,
        review_id: i64,
    ) -> Result<Vec<ItemRatingRecord>, EngineError> {
        self.fetch(self.service.get_item_ratings(review_id).await)
    }

    /// Live summary over the current working state, recomputed as the user
    /// edits ratings and accomplishments.
    pub fn summarize(&self, ctx: &ReviewContext, role: RaterRole) -> RatingSummary {
        RatingAggregator::new(
            &ctx.kpi.items,
            &ctx.working(role).ratings,
            ctx.accomplishments.as_slice(),
            &ctx.catalog,
            role,
        )
        .summarize(ctx.policy)
    }

    pub async fn acknowledge_kpi(
        &self,
        ctx: &mut ReviewContext,
        signature: &str,
    ) -> Result<(), EngineError> {
        let mut next = ctx.kpi.clone();
        ReviewStateMachine::acknowledge_kpi(&mut next, signature, Utc::now())
            .map_err(|e| self.validation_failed(e))?;
        self.service
            .post_acknowledgement(ctx.kpi.id, signature)
            .await
            .map_err(|e| self.transport_failed(e))?;
        ctx.kpi = next;
        Ok(())
    }

    /// Validate and submit the employee self-rating. The scalar summary is
    /// recomputed here from the payload, the transition runs on a copy, and
    /// only a successful post commits it and clears the draft.
    pub async fn submit_self_rating(
        &self,
        ctx: &mut ReviewContext,
        mut payload: SelfRatingSubmission,
    ) -> Result<(), EngineError> {
        let period = ctx.kpi.period.period_type;
        if !ctx.features.self_rating_enabled(period) {
            return Err(self.validation_failed(ValidationError::SelfRatingDisabled { period }));
        }

        let ratings = payload.ratings_by_item();
        let average = RatingAggregator::new(
            &ctx.kpi.items,
            &ratings,
            &payload.accomplishments,
            &ctx.catalog,
            RaterRole::Employee,
        )
        .average_rating();
        payload.employee_rating = ctx.catalog.quantize(average);

        let mut next = ctx.review.clone();
        ReviewStateMachine::submit_self_rating(&mut next, &ctx.kpi.items, &payload)
            .map_err(|e| self.validation_failed(e))?;
        self.service
            .post_self_rating(ctx.kpi.id, &payload)
            .await
            .map_err(|e| self.transport_failed(e))?;

        ctx.review = next;
        ctx.accomplishments =
            AccomplishmentSet::from_records(ctx.review.id, payload.accomplishments.clone());
        ctx.employee.ratings = ratings;
        ctx.employee.comments = payload
            .item_ratings
            .iter()
            .map(|(id, draft)| (*id, draft.comment.clone()))
            .collect();

        // The draft is advisory; a failure to clear it must not undo a
        // submission the service already accepted.
        if let Err(err) = self.drafts.clear(ctx.kpi.id).await {
            tracing::warn!("failed to clear draft for kpi {}: {err}", ctx.kpi.id);
        }
        Ok(())
    }

    pub async fn submit_manager_review(
        &self,
        ctx: &mut ReviewContext,
        mut payload: ManagerReviewSubmission,
    ) -> Result<(), EngineError> {
        let ratings: BTreeMap<i64, f64> = payload
            .item_ratings
            .iter()
            .map(|(id, draft)| (*id, draft.rating))
            .collect();
        let average = RatingAggregator::new(
            &ctx.kpi.items,
            &ratings,
            &payload.accomplishments,
            &ctx.catalog,
            RaterRole::Manager,
        )
        .average_rating();
        payload.manager_rating = ctx.catalog.quantize(average);

        let mut next = ctx.review.clone();
        ReviewStateMachine::submit_manager_review(&mut next, &payload)
            .map_err(|e| self.validation_failed(e))?;
        self.service
            .post_manager_review(ctx.review.id, &payload)
            .await
            .map_err(|e| self.transport_failed(e))?;

        ctx.review = next;
        ctx.accomplishments =
            AccomplishmentSet::from_records(ctx.review.id, payload.accomplishments.clone());
        ctx.manager.ratings = ratings;
        Ok(())
    }

    /// Employee approves the manager's assessment. When the employee declares
    /// that no physical meeting took place, the caller must have obtained an
    /// explicit secondary confirmation first; the meeting record itself never
    /// gates the transition.
    pub async fn approve_review(
        &self,
        ctx: &mut ReviewContext,
        payload: EmployeeConfirmation,
    ) -> Result<(), EngineError> {
        if let Some(meeting) = &payload.physical_meeting {
            if !meeting.occurred && !payload.no_meeting_confirmed {
                return Err(self.validation_failed(ValidationError::MeetingConfirmationRequired));
            }
        }

        let mut next = ctx.review.clone();
        ReviewStateMachine::approve(&mut next, &payload).map_err(|e| self.validation_failed(e))?;
        self.service
            .post_employee_confirmation(ctx.review.id, &payload)
            .await
            .map_err(|e| self.transport_failed(e))?;
        ctx.review = next;
        Ok(())
    }

    pub async fn reject_review(
        &self,
        ctx: &mut ReviewContext,
        note: &str,
    ) -> Result<(), EngineError> {
        let mut next = ctx.review.clone();
        ReviewStateMachine::reject(&mut next, note, Utc::now())
            .map_err(|e| self.validation_failed(e))?;
        self.service
            .post_rejection(ctx.review.id, note)
            .await
            .map_err(|e| self.transport_failed(e))?;
        ctx.review = next;
        Ok(())
    }

    pub async fn resolve_rejection(
        &self,
        ctx: &mut ReviewContext,
        resolution: RejectionResolution,
    ) -> Result<(), EngineError> {
        let mut next = ctx.review.clone();
        ReviewStateMachine::resolve_rejection(&mut next, &resolution)
            .map_err(|e| self.validation_failed(e))?;
        self.service
            .post_rejection_resolution(ctx.review.id, &resolution)
            .await
            .map_err(|e| self.transport_failed(e))?;
        ctx.review = next;
        Ok(())
    }

    pub async fn save_draft(&self, kpi_id: i64, draft: &ReviewDraft) -> Result<(), EngineError> {
        self.drafts.save(kpi_id, draft).await
    }

    pub async fn load_draft(&self, kpi_id: i64) -> Option<ReviewDraft> {
        self.drafts.load(kpi_id).await
    }

    pub async fn discard_draft(&self, kpi_id: i64) -> Result<(), EngineError> {
        self.drafts.clear(kpi_id).await
    }

    fn fetch<T>(&self, result: Result<T, TransportError>) -> Result<T, EngineError> {
        result.map_err(|e| self.transport_failed(e))
    }

    fn validation_failed(&self, err: ValidationError) -> EngineError {
        self.notifier.notify(Severity::Warning, &err.to_string());
        EngineError::Validation(err)
    }

    fn transport_failed(&self, err: TransportError) -> EngineError {
        self.notifier.notify(Severity::Error, &err.0);
        EngineError::Transport(err)
    }
}
