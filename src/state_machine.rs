use crate::aggregator::validate_self_rating;
use crate::error::ValidationError;
use crate::models::{
    Accomplishment, Kpi, KpiItem, KpiReview, KpiStatus, PhysicalMeeting, Reflections,
    RejectionResolvedStatus, ReviewStatus, StoredItemRating,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One item rating as entered in a form, before it is written to the
/// structured store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRatingDraft {
    pub rating: f64,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfRatingSubmission {
    pub item_ratings: BTreeMap<i64, ItemRatingDraft>,
    pub accomplishments: Vec<Accomplishment>,
    #[serde(default)]
    pub reflections: Reflections,
    pub employee_rating: f64,
    pub signature: String,
    pub review_date: Option<DateTime<Utc>>,
    pub submitted_at: DateTime<Utc>,
}

impl SelfRatingSubmission {
    pub fn ratings_by_item(&self) -> BTreeMap<i64, f64> {
        self.item_ratings
            .iter()
            .map(|(id, draft)| (*id, draft.rating))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerReviewSubmission {
    pub item_ratings: BTreeMap<i64, ItemRatingDraft>,
    /// Accomplishment records with the manager's annotations filled in.
    pub accomplishments: Vec<Accomplishment>,
    pub manager_rating: f64,
    pub signature: Option<String>,
    /// Whether this department routes the review through an explicit
    /// employee confirmation step.
    pub requires_employee_confirmation: bool,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeConfirmation {
    pub signature: String,
    pub confirmed_at: DateTime<Utc>,
    pub physical_meeting: Option<PhysicalMeeting>,
    /// Set once the caller has obtained the secondary confirmation that the
    /// employee really wants to approve without a physical meeting.
    #[serde(default)]
    pub no_meeting_confirmed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionResolution {
    pub note: Option<String>,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
}

/// The authoritative transition rules for a KPI and its review. Every
/// function checks its guards first and mutates only after they all pass, so
/// a rejected event leaves the record exactly as it was.
pub struct ReviewStateMachine;

impl ReviewStateMachine {
    /// KPI Pending -> Acknowledged. The employee signs off on the KPI before
    /// any review activity starts.
    pub fn acknowledge_kpi(
        kpi: &mut Kpi,
        signature: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        if kpi.status != KpiStatus::Pending {
            return Err(ValidationError::KpiNotPending { status: kpi.status });
        }
        if signature.trim().is_empty() {
            return Err(ValidationError::MissingSignature);
        }
        kpi.status = KpiStatus::Acknowledged;
        kpi.acknowledgement_signature = Some(signature.to_string());
        kpi.acknowledged_at = Some(at);
        Ok(())
    }

    /// Review Pending -> EmployeeSubmitted. Stores the structured employee
    /// ratings, the accomplishment list and the reflection text. Only the
    /// structured shape is ever written; the legacy comment fields stay
    /// read-only.
    pub fn submit_self_rating(
        review: &mut KpiReview,
        items: &[KpiItem],
        payload: &SelfRatingSubmission,
    ) -> Result<(), ValidationError> {
        if review.review_status != ReviewStatus::Pending {
            return Err(ValidationError::InvalidTransition {
                event: "submit a self-rating",
                status: review.review_status,
            });
        }
        validate_self_rating(
            items,
            &payload.accomplishments,
            &payload.ratings_by_item(),
            Some(&payload.signature),
            payload.review_date,
        )?;

        review.item_ratings.employee = Self::to_stored(&payload.item_ratings);
        review.accomplishments = payload.accomplishments.clone();
        review.reflections = payload.reflections.clone();
        review.employee_rating = Some(payload.employee_rating);
        review.employee_signature = Some(payload.signature.clone());
        review.employee_signed_at = Some(payload.submitted_at);
        review.review_date = payload.review_date;
        review.review_status = ReviewStatus::EmployeeSubmitted;
        Ok(())
    }

    /// Review EmployeeSubmitted -> ManagerSubmitted, or straight to
    /// AwaitingEmployeeConfirmation when the department requires the employee
    /// to confirm.
    pub fn submit_manager_review(
        review: &mut KpiReview,
        payload: &ManagerReviewSubmission,
    ) -> Result<(), ValidationError> {
        if review.review_status != ReviewStatus::EmployeeSubmitted {
            return Err(ValidationError::InvalidTransition {
                event: "submit a manager review",
                status: review.review_status,
            });
        }

        review.item_ratings.manager = Self::to_stored(&payload.item_ratings);
        review.accomplishments = payload.accomplishments.clone();
        review.manager_rating = Some(payload.manager_rating);
        review.manager_signature = payload.signature.clone();
        review.manager_signed_at = Some(payload.submitted_at);
        review.review_status = if payload.requires_employee_confirmation {
            ReviewStatus::AwaitingEmployeeConfirmation
        } else {
            ReviewStatus::ManagerSubmitted
        };
        Ok(())
    }

    /// Confirmation step -> Completed. The physical-meeting record rides
    /// along for HR visibility; it never gates the approval itself.
    pub fn approve(
        review: &mut KpiReview,
        payload: &EmployeeConfirmation,
    ) -> Result<(), ValidationError> {
        Self::require_confirmation_step(review, "approve")?;
        if payload.signature.trim().is_empty() {
            return Err(ValidationError::MissingSignature);
        }

        review.confirmation_signature = Some(payload.signature.clone());
        review.confirmed_at = Some(payload.confirmed_at);
        review.physical_meeting = payload.physical_meeting.clone();
        review.review_status = ReviewStatus::Completed;
        Ok(())
    }

    /// Confirmation step -> Rejected, with an unresolved resolution sub-state.
    pub fn reject(
        review: &mut KpiReview,
        note: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        Self::require_confirmation_step(review, "reject")?;
        if note.trim().is_empty() {
            return Err(ValidationError::MissingRejectionNote);
        }

        review.employee_rejection_note = Some(note.to_string());
        review.rejected_at = Some(at);
        review.rejection_resolved_status = Some(RejectionResolvedStatus::Unresolved);
        review.review_status = ReviewStatus::Rejected;
        Ok(())
    }

    /// Marks a rejected review as resolved by HR. The review stays in the
    /// Rejected state; only the resolution sub-state changes.
    pub fn resolve_rejection(
        review: &mut KpiReview,
        resolution: &RejectionResolution,
    ) -> Result<(), ValidationError> {
        if review.review_status != ReviewStatus::Rejected {
            return Err(ValidationError::InvalidTransition {
                event: "resolve a rejection",
                status: review.review_status,
            });
        }

        review.rejection_resolved_status = Some(RejectionResolvedStatus::Resolved);
        review.rejection_resolution_note = resolution.note.clone();
        review.rejection_resolved_by = Some(resolution.resolved_by.clone());
        review.rejection_resolved_at = Some(resolution.resolved_at);
        Ok(())
    }

    fn require_confirmation_step(
        review: &KpiReview,
        event: &'static str,
    ) -> Result<(), ValidationError> {
        match review.review_status {
            ReviewStatus::ManagerSubmitted | ReviewStatus::AwaitingEmployeeConfirmation => Ok(()),
            status => Err(ValidationError::InvalidTransition { event, status }),
        }
    }

    fn to_stored(drafts: &BTreeMap<i64, ItemRatingDraft>) -> BTreeMap<String, StoredItemRating> {
        drafts
            .iter()
            .map(|(id, draft)| {
                (
                    id.to_string(),
                    StoredItemRating {
                        rating: serde_json::json!(draft.rating),
                        comment: Some(draft.comment.clone()),
                        rating_kind: None,
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PeriodType, RejectionResolvedStatus, ReviewPeriod};
    use chrono::Utc;

    fn kpi() -> Kpi {
        Kpi {
            id: 1,
            employee_id: 42,
            title: "Q3 goals".to_string(),
            period: ReviewPeriod {
                period_type: PeriodType::Quarterly,
                quarter: Some(3),
                year: 2024,
            },
            status: KpiStatus::Pending,
            items: vec![KpiItem {
                id: 1,
                name: "Close tickets".to_string(),
                target_value: Some("100".to_string()),
                measure_unit: Some("tickets".to_string()),
                goal_weight: Some("100%".to_string()),
                is_qualitative: false,
                exclude_from_calculation: false,
                actual_value: None,
                current_performance_status: None,
            }],
            acknowledgement_signature: None,
            acknowledged_at: None,
        }
    }

    fn accomplishments() -> Vec<Accomplishment> {
        (1..=2)
            .map(|i| Accomplishment {
                review_id: 1,
                title: format!("Win {i}"),
                employee_rating: Some(1.25),
                item_order: i,
                ..Accomplishment::default()
            })
            .collect()
    }

    fn self_rating() -> SelfRatingSubmission {
        let mut item_ratings = BTreeMap::new();
        item_ratings.insert(
            1,
            ItemRatingDraft {
                rating: 1.25,
                comment: "on track".to_string(),
            },
        );
        SelfRatingSubmission {
            item_ratings,
            accomplishments: accomplishments(),
            reflections: Reflections::default(),
            employee_rating: 1.25,
            signature: "employee".to_string(),
            review_date: Some(Utc::now()),
            submitted_at: Utc::now(),
        }
    }

    fn manager_review(requires_confirmation: bool) -> ManagerReviewSubmission {
        let mut item_ratings = BTreeMap::new();
        item_ratings.insert(
            1,
            ItemRatingDraft {
                rating: 1.50,
                comment: "exceeded".to_string(),
            },
        );
        ManagerReviewSubmission {
            item_ratings,
            accomplishments: accomplishments(),
            manager_rating: 1.50,
            signature: Some("manager".to_string()),
            requires_employee_confirmation: requires_confirmation,
            submitted_at: Utc::now(),
        }
    }

    fn review_at(status: ReviewStatus) -> KpiReview {
        let mut review = KpiReview::new(1, 1);
        review.review_status = status;
        review
    }

    #[test]
    fn test_acknowledge_requires_signature() {
        let mut kpi = kpi();
        let err = ReviewStateMachine::acknowledge_kpi(&mut kpi, "  ", Utc::now()).unwrap_err();
        assert_eq!(err, ValidationError::MissingSignature);
        assert_eq!(kpi.status, KpiStatus::Pending);

        ReviewStateMachine::acknowledge_kpi(&mut kpi, "employee", Utc::now()).unwrap();
        assert_eq!(kpi.status, KpiStatus::Acknowledged);
        assert!(kpi.acknowledged_at.is_some());
    }

    #[test]
    fn test_acknowledge_twice_is_rejected() {
        let mut kpi = kpi();
        ReviewStateMachine::acknowledge_kpi(&mut kpi, "employee", Utc::now()).unwrap();
        let err = ReviewStateMachine::acknowledge_kpi(&mut kpi, "employee", Utc::now()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::KpiNotPending {
                status: KpiStatus::Acknowledged
            }
        );
    }

    #[test]
    fn test_self_rating_writes_structured_shape_only() {
        let kpi = kpi();
        let mut review = review_at(ReviewStatus::Pending);
        ReviewStateMachine::submit_self_rating(&mut review, &kpi.items, &self_rating()).unwrap();

        assert_eq!(review.review_status, ReviewStatus::EmployeeSubmitted);
        assert_eq!(review.employee_rating, Some(1.25));
        assert!(review.item_ratings.employee.contains_key("1"));
        assert!(review.employee_comment.is_none());
        assert_eq!(review.accomplishments.len(), 2);
        assert!(review.employee_signed_at.is_some());
    }

    #[test]
    fn test_self_rating_validation_failure_leaves_review_untouched() {
        let kpi = kpi();
        let mut review = review_at(ReviewStatus::Pending);
        let mut payload = self_rating();
        payload.accomplishments.truncate(1);

        let err =
            ReviewStateMachine::submit_self_rating(&mut review, &kpi.items, &payload).unwrap_err();
        assert!(matches!(err, ValidationError::AccomplishmentMinimum { .. }));
        assert_eq!(review.review_status, ReviewStatus::Pending);
        assert!(review.item_ratings.employee.is_empty());
        assert!(review.employee_rating.is_none());
    }

    #[test]
    fn test_self_rating_from_wrong_state_is_rejected() {
        let kpi = kpi();
        let mut review = review_at(ReviewStatus::Completed);
        let err = ReviewStateMachine::submit_self_rating(&mut review, &kpi.items, &self_rating())
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTransition { .. }));
    }

    #[test]
    fn test_manager_review_routes_by_confirmation_flag() {
        let mut review = review_at(ReviewStatus::EmployeeSubmitted);
        ReviewStateMachine::submit_manager_review(&mut review, &manager_review(false)).unwrap();
        assert_eq!(review.review_status, ReviewStatus::ManagerSubmitted);
        assert_eq!(review.manager_rating, Some(1.50));
        assert!(review.item_ratings.manager.contains_key("1"));

        let mut review = review_at(ReviewStatus::EmployeeSubmitted);
        ReviewStateMachine::submit_manager_review(&mut review, &manager_review(true)).unwrap();
        assert_eq!(
            review.review_status,
            ReviewStatus::AwaitingEmployeeConfirmation
        );
    }

    #[test]
    fn test_approve_without_signature_keeps_state() {
        let mut review = review_at(ReviewStatus::ManagerSubmitted);
        let payload = EmployeeConfirmation {
            signature: "".to_string(),
            confirmed_at: Utc::now(),
            physical_meeting: None,
            no_meeting_confirmed: false,
        };
        let err = ReviewStateMachine::approve(&mut review, &payload).unwrap_err();
        assert_eq!(err, ValidationError::MissingSignature);
        assert_eq!(review.review_status, ReviewStatus::ManagerSubmitted);
        assert!(review.confirmation_signature.is_none());
    }

    #[test]
    fn test_approve_records_meeting_and_completes() {
        let mut review = review_at(ReviewStatus::AwaitingEmployeeConfirmation);
        let payload = EmployeeConfirmation {
            signature: "employee".to_string(),
            confirmed_at: Utc::now(),
            physical_meeting: Some(PhysicalMeeting {
                occurred: true,
                note: Some("met on Tuesday".to_string()),
            }),
            no_meeting_confirmed: false,
        };
        ReviewStateMachine::approve(&mut review, &payload).unwrap();
        assert_eq!(review.review_status, ReviewStatus::Completed);
        assert_eq!(
            review.physical_meeting.as_ref().map(|m| m.occurred),
            Some(true)
        );
    }

    #[test]
    fn test_reject_requires_note() {
        let mut review = review_at(ReviewStatus::ManagerSubmitted);
        let err = ReviewStateMachine::reject(&mut review, "   ", Utc::now()).unwrap_err();
        assert_eq!(err, ValidationError::MissingRejectionNote);
        assert_eq!(review.review_status, ReviewStatus::ManagerSubmitted);

        ReviewStateMachine::reject(&mut review, "ratings do not match my records", Utc::now())
            .unwrap();
        assert_eq!(review.review_status, ReviewStatus::Rejected);
        assert_eq!(
            review.rejection_resolved_status,
            Some(RejectionResolvedStatus::Unresolved)
        );
    }

    #[test]
    fn test_resolution_only_from_rejected() {
        let resolution = RejectionResolution {
            note: Some("talked it through".to_string()),
            resolved_by: "hr".to_string(),
            resolved_at: Utc::now(),
        };

        let mut review = review_at(ReviewStatus::Completed);
        let err = ReviewStateMachine::resolve_rejection(&mut review, &resolution).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTransition { .. }));

        let mut review = review_at(ReviewStatus::Rejected);
        ReviewStateMachine::resolve_rejection(&mut review, &resolution).unwrap();
        assert_eq!(review.review_status, ReviewStatus::Rejected);
        assert_eq!(
            review.rejection_resolved_status,
            Some(RejectionResolvedStatus::Resolved)
        );
        assert_eq!(review.rejection_resolved_by.as_deref(), Some("hr"));
    }
}
