use crate::accomplishments::MIN_ACCOMPLISHMENTS;
use crate::catalog::RatingCatalog;
use crate::error::ValidationError;
use crate::models::{Accomplishment, DepartmentFeatures, KpiItem, PeriodType, RaterRole};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// How the final percentage is computed. Selected per KPI period from the
/// department configuration, never decided here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationPolicy {
    Normal,
    GoalWeight,
}

impl AggregationPolicy {
    pub fn for_period(features: &DepartmentFeatures, period: PeriodType) -> Self {
        if features.uses_goal_weight(period) {
            AggregationPolicy::GoalWeight
        } else {
            AggregationPolicy::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub quantized_rating: f64,
    pub summary_label: &'static str,
    pub final_percentage: f64,
    pub completion_percentage: f64,
}

/// Computes the scalar summaries for one rater's view of a KPI: the average
/// rating on the item scale and the final percentage under the selected
/// policy. Qualitative items and items flagged out of calculation never
/// contribute; accomplishments contribute once rated.
pub struct RatingAggregator<'a> {
    items: &'a [KpiItem],
    ratings: &'a BTreeMap<i64, f64>,
    accomplishments: &'a [Accomplishment],
    catalog: &'a RatingCatalog,
    role: RaterRole,
}

impl<'a> RatingAggregator<'a> {
    pub fn new(
        items: &'a [KpiItem],
        ratings: &'a BTreeMap<i64, f64>,
        accomplishments: &'a [Accomplishment],
        catalog: &'a RatingCatalog,
        role: RaterRole,
    ) -> Self {
        RatingAggregator {
            items,
            ratings,
            accomplishments,
            catalog,
            role,
        }
    }

    fn included_items(&self) -> impl Iterator<Item = &'a KpiItem> + '_ {
        self.items.iter().filter(|item| item.is_included())
    }

    fn rating_of(&self, item: &KpiItem) -> f64 {
        self.ratings.get(&item.id).copied().unwrap_or(0.0)
    }

    fn rated_accomplishment_ratings(&self) -> Vec<f64> {
        self.accomplishments
            .iter()
            .filter_map(|a| a.rating_for(self.role))
            .filter(|r| *r > 0.0)
            .collect()
    }

    /// Arithmetic mean over the rated included items and rated
    /// accomplishments, 0.0 when nothing is rated yet.
    pub fn average_rating(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for item in self.included_items() {
            let rating = self.rating_of(item);
            if rating > 0.0 {
                sum += rating;
                count += 1;
            }
        }
        for rating in self.rated_accomplishment_ratings() {
            sum += rating;
            count += 1;
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    pub fn final_percentage(&self, policy: AggregationPolicy) -> f64 {
        match policy {
            AggregationPolicy::Normal => self.normal_percentage(),
            AggregationPolicy::GoalWeight => self.goal_weight_percentage(),
        }
    }

    fn normal_percentage(&self) -> f64 {
        let max_rating = self.catalog.max_rating();
        let accomplishment_ratings = self.rated_accomplishment_ratings();
        let slot_count = self.included_items().count() + accomplishment_ratings.len();
        let total_possible = slot_count as f64 * max_rating;
        if total_possible <= 0.0 {
            return 0.0;
        }
        let total_score: f64 = self.included_items().map(|item| self.rating_of(item)).sum::<f64>()
            + accomplishment_ratings.iter().sum::<f64>();
        total_score / total_possible * 100.0
    }

    fn goal_weight_percentage(&self) -> f64 {
        let max_rating = self.catalog.max_rating();
        if max_rating <= 0.0 {
            return 0.0;
        }

        let mut weighted_score = 0.0;
        let mut weight_used = 0.0;
        for item in self.included_items() {
            let weight = item.goal_weight_fraction();
            weighted_score += self.rating_of(item) / max_rating * 100.0 * weight;
            weight_used += weight;
        }

        // Accomplishments split whatever weight the items left unclaimed.
        let accomplishment_ratings = self.rated_accomplishment_ratings();
        let remaining_weight = (1.0 - weight_used).max(0.0);
        if !accomplishment_ratings.is_empty() {
            let share = remaining_weight / accomplishment_ratings.len() as f64;
            for rating in accomplishment_ratings {
                weighted_score += rating / max_rating * 100.0 * share;
            }
        }

        weighted_score
    }

    /// How much of the required rating work is done, independent of the
    /// scores themselves. Items excluded from calculation still count here;
    /// qualitative items never do.
    pub fn completion_percentage(&self) -> f64 {
        let required: Vec<&KpiItem> = self.items.iter().filter(|i| !i.is_qualitative).collect();
        if required.is_empty() {
            return 100.0;
        }
        let rated = required
            .iter()
            .filter(|item| self.rating_of(item) > 0.0)
            .count();
        (rated as f64 / required.len() as f64 * 100.0).round()
    }

    pub fn summarize(&self, policy: AggregationPolicy) -> RatingSummary {
        let average_rating = self.average_rating();
        let quantized_rating = self.catalog.quantize(average_rating);
        RatingSummary {
            average_rating,
            quantized_rating,
            summary_label: RatingCatalog::summary_label(average_rating),
            final_percentage: self.final_percentage(policy),
            completion_percentage: self.completion_percentage(),
        }
    }
}

/// Pre-submission checks for an employee self-rating, in the order the form
/// reports them: accomplishment count, accomplishment completeness, unrated
/// required items, signature, review date.
pub fn validate_self_rating(
    items: &[KpiItem],
    accomplishments: &[Accomplishment],
    ratings: &BTreeMap<i64, f64>,
    signature: Option<&str>,
    review_date: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    if accomplishments.len() < MIN_ACCOMPLISHMENTS {
        return Err(ValidationError::AccomplishmentMinimum {
            required: MIN_ACCOMPLISHMENTS,
            found: accomplishments.len(),
        });
    }

    for (idx, record) in accomplishments.iter().enumerate() {
        let unrated = !record.is_rated_by(RaterRole::Employee);
        if record.title.trim().is_empty() || unrated {
            return Err(ValidationError::AccomplishmentIncomplete { position: idx + 1 });
        }
    }

    for item in items.iter().filter(|i| !i.is_qualitative) {
        let rating = ratings.get(&item.id).copied().unwrap_or(0.0);
        if rating <= 0.0 {
            return Err(ValidationError::UnratedItem {
                item_id: item.id,
                name: item.name.clone(),
            });
        }
    }

    match signature {
        Some(s) if !s.trim().is_empty() => {}
        _ => return Err(ValidationError::MissingSignature),
    }

    if review_date.is_none() {
        return Err(ValidationError::MissingReviewDate);
    }

    Ok(())
}
