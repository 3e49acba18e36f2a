use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiStatus {
    Pending,
    Acknowledged,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    EmployeeSubmitted,
    ManagerSubmitted,
    AwaitingEmployeeConfirmation,
    Completed,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Quarterly,
    Yearly,
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodType::Quarterly => write!(f, "quarterly"),
            PeriodType::Yearly => write!(f, "yearly"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingType {
    Quarterly,
    Yearly,
    Qualitative,
}

impl RatingType {
    pub fn matches_period(&self, period: PeriodType) -> bool {
        matches!(
            (self, period),
            (RatingType::Quarterly, PeriodType::Quarterly)
                | (RatingType::Yearly, PeriodType::Yearly)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaterRole {
    Employee,
    Manager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionResolvedStatus {
    Resolved,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPeriod {
    pub period_type: PeriodType,
    pub quarter: Option<u8>,
    pub year: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kpi {
    pub id: i64,
    pub employee_id: i64,
    pub title: String,
    pub period: ReviewPeriod,
    pub status: KpiStatus,
    #[serde(default)]
    pub items: Vec<KpiItem>,
    pub acknowledgement_signature: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiItem {
    pub id: i64,
    pub name: String,
    pub target_value: Option<String>,
    pub measure_unit: Option<String>,
    /// Raw goal weight as stored upstream, e.g. "60" or "60%".
    pub goal_weight: Option<String>,
    #[serde(default)]
    pub is_qualitative: bool,
    #[serde(default)]
    pub exclude_from_calculation: bool,
    pub actual_value: Option<String>,
    pub current_performance_status: Option<String>,
}

impl KpiItem {
    /// Whether this item participates in rating aggregation.
    pub fn is_included(&self) -> bool {
        !self.is_qualitative && !self.exclude_from_calculation
    }

    pub fn goal_weight_fraction(&self) -> f64 {
        self.goal_weight
            .as_deref()
            .map(GoalWeight::parse)
            .map(|w| w.fraction())
            .unwrap_or(0.0)
    }
}

/// Goal weight normalized at the model boundary: the canonical in-memory
/// representation is a fraction in 0.0..=1.0 range, parsed once from the
/// upstream string form ("60", "60%", " 60 % ").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalWeight(f64);

impl GoalWeight {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim().trim_end_matches('%').trim();
        let fraction = trimmed.parse::<f64>().map(|v| v / 100.0).unwrap_or(0.0);
        GoalWeight(fraction)
    }

    pub fn fraction(&self) -> f64 {
        self.0
    }
}

/// One entry of the structured rating store, as the review service sends it.
/// Ratings arrive as either JSON numbers or numeric strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredItemRating {
    #[serde(default)]
    pub rating: serde_json::Value,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, rename = "type")]
    pub rating_kind: Option<String>,
}

/// The canonical rating store on a review, keyed by item id (string keys on
/// the wire). Legacy reviews leave both maps empty and embed their ratings in
/// the comment fields instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemRatings {
    #[serde(default)]
    pub employee: BTreeMap<String, StoredItemRating>,
    #[serde(default)]
    pub manager: BTreeMap<String, StoredItemRating>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflections {
    #[serde(default)]
    pub major_accomplishments: Option<String>,
    #[serde(default)]
    pub disappointments: Option<String>,
    #[serde(default)]
    pub improvement_needed: Option<String>,
    #[serde(default)]
    pub future_plan: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalMeeting {
    pub occurred: bool,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiReview {
    pub id: i64,
    pub kpi_id: i64,
    pub review_status: ReviewStatus,
    pub employee_rating: Option<f64>,
    pub manager_rating: Option<f64>,
    #[serde(default)]
    pub item_ratings: ItemRatings,
    pub employee_comment: Option<String>,
    pub manager_comment: Option<String>,
    #[serde(default)]
    pub reflections: Reflections,
    #[serde(default)]
    pub accomplishments: Vec<Accomplishment>,
    pub employee_signature: Option<String>,
    pub employee_signed_at: Option<DateTime<Utc>>,
    pub review_date: Option<DateTime<Utc>>,
    pub manager_signature: Option<String>,
    pub manager_signed_at: Option<DateTime<Utc>>,
    pub confirmation_signature: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub physical_meeting: Option<PhysicalMeeting>,
    pub employee_rejection_note: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_resolved_status: Option<RejectionResolvedStatus>,
    pub rejection_resolution_note: Option<String>,
    pub rejection_resolved_by: Option<String>,
    pub rejection_resolved_at: Option<DateTime<Utc>>,
}

impl KpiReview {
    pub fn new(id: i64, kpi_id: i64) -> Self {
        KpiReview {
            id,
            kpi_id,
            review_status: ReviewStatus::Pending,
            employee_rating: None,
            manager_rating: None,
            item_ratings: ItemRatings::default(),
            employee_comment: None,
            manager_comment: None,
            reflections: Reflections::default(),
            accomplishments: Vec::new(),
            employee_signature: None,
            employee_signed_at: None,
            review_date: None,
            manager_signature: None,
            manager_signed_at: None,
            confirmation_signature: None,
            confirmed_at: None,
            physical_meeting: None,
            employee_rejection_note: None,
            rejected_at: None,
            rejection_resolved_status: None,
            rejection_resolution_note: None,
            rejection_resolved_by: None,
            rejection_resolved_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Accomplishment {
    pub review_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub employee_rating: Option<f64>,
    #[serde(default)]
    pub employee_comment: Option<String>,
    pub manager_rating: Option<f64>,
    #[serde(default)]
    pub manager_comment: Option<String>,
    pub item_order: i32,
}

impl Accomplishment {
    pub fn rating_for(&self, role: RaterRole) -> Option<f64> {
        match role {
            RaterRole::Employee => self.employee_rating,
            RaterRole::Manager => self.manager_rating,
        }
    }

    /// Rated means a rating is present and strictly positive.
    pub fn is_rated_by(&self, role: RaterRole) -> bool {
        self.rating_for(role).map(|r| r > 0.0).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingOption {
    pub rating_type: RatingType,
    pub rating_value: f64,
    pub label: String,
}

/// One row of the per-item rating listing exposed by the review service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRatingRecord {
    pub kpi_item_id: i64,
    pub rater_role: RaterRole,
    pub rating: f64,
    #[serde(default)]
    pub comment: Option<String>,
    pub actual_value: Option<String>,
    pub target_value: Option<String>,
    pub goal_weight: Option<String>,
    pub percentage_value_obtained: Option<f64>,
}

/// Department-level configuration toggles that select the aggregation policy
/// and whether employee self-rating is available per KPI period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DepartmentFeatures {
    #[serde(default)]
    pub use_goal_weight_yearly: bool,
    #[serde(default)]
    pub use_goal_weight_quarterly: bool,
    #[serde(default)]
    pub use_actual_values_yearly: bool,
    #[serde(default)]
    pub use_actual_values_quarterly: bool,
    #[serde(default = "default_true")]
    pub enable_employee_self_rating_yearly: bool,
    #[serde(default = "default_true")]
    pub enable_employee_self_rating_quarterly: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DepartmentFeatures {
    /// Self-rating is available unless a department switches it off.
    fn default() -> Self {
        DepartmentFeatures {
            use_goal_weight_yearly: false,
            use_goal_weight_quarterly: false,
            use_actual_values_yearly: false,
            use_actual_values_quarterly: false,
            enable_employee_self_rating_yearly: true,
            enable_employee_self_rating_quarterly: true,
        }
    }
}

impl DepartmentFeatures {
    pub fn self_rating_enabled(&self, period: PeriodType) -> bool {
        match period {
            PeriodType::Quarterly => self.enable_employee_self_rating_quarterly,
            PeriodType::Yearly => self.enable_employee_self_rating_yearly,
        }
    }

    pub fn uses_goal_weight(&self, period: PeriodType) -> bool {
        match period {
            PeriodType::Quarterly => self.use_goal_weight_quarterly,
            PeriodType::Yearly => self.use_goal_weight_yearly,
        }
    }
}
