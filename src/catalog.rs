use crate::models::{PeriodType, RatingOption};

pub const LABEL_EXCEEDS: &str = "Exceeds Expectations";
pub const LABEL_MEETS: &str = "Meets Expectations";
pub const LABEL_BELOW: &str = "Below Expectations";
pub const LABEL_CUSTOM: &str = "Custom";
pub const LABEL_NOT_RATED: &str = "Not Rated";

/// The admissible discrete rating values for one KPI period, split into the
/// quantitative scale and the named qualitative tiers.
#[derive(Debug, Clone, Default)]
pub struct RatingCatalog {
    quantitative: Vec<RatingOption>,
    qualitative: Vec<RatingOption>,
}

impl RatingCatalog {
    /// Build a catalog from the options the review service returned for a
    /// period. Option order is preserved; it decides quantization tie-breaks.
    pub fn from_options(period: PeriodType, options: Vec<RatingOption>) -> Self {
        let mut quantitative = Vec::new();
        let mut qualitative = Vec::new();
        for option in options {
            if option.rating_type.matches_period(period) {
                quantitative.push(option);
            } else if option.rating_type == crate::models::RatingType::Qualitative {
                qualitative.push(option);
            }
        }
        RatingCatalog {
            quantitative,
            qualitative,
        }
    }

    pub fn quantitative_options(&self) -> &[RatingOption] {
        &self.quantitative
    }

    pub fn qualitative_options(&self) -> &[RatingOption] {
        &self.qualitative
    }

    /// Highest admissible quantitative value, 0.0 when the catalog is empty.
    /// Every percentage computation guards on 0.0 instead of dividing.
    pub fn max_rating(&self) -> f64 {
        self.quantitative
            .iter()
            .map(|o| o.rating_value)
            .fold(0.0, f64::max)
    }

    /// Snap an arbitrary average to the nearest admissible quantitative value.
    /// Ties break to the first-declared candidate; inputs far outside the
    /// scale still land on a member of the set. An empty catalog yields 0.0.
    pub fn quantize(&self, value: f64) -> f64 {
        let mut best: Option<f64> = None;
        let mut best_distance = f64::INFINITY;
        for option in &self.quantitative {
            let distance = (option.rating_value - value).abs();
            if distance < best_distance {
                best_distance = distance;
                best = Some(option.rating_value);
            }
        }
        best.unwrap_or(0.0)
    }

    /// Coarse label for a summary rating, by closest-previous threshold.
    pub fn summary_label(value: f64) -> &'static str {
        if value >= 1.40 {
            LABEL_EXCEEDS
        } else if value >= 1.15 {
            LABEL_MEETS
        } else if value > 0.0 {
            LABEL_BELOW
        } else {
            LABEL_NOT_RATED
        }
    }

    /// Exact-match label for the per-item legend. Values off the discrete
    /// scale are shown as custom rather than bucketed.
    pub fn legend_label(value: f64) -> &'static str {
        if (value - 1.50).abs() < 1e-9 {
            LABEL_EXCEEDS
        } else if (value - 1.25).abs() < 1e-9 {
            LABEL_MEETS
        } else if (value - 1.00).abs() < 1e-9 {
            LABEL_BELOW
        } else if value > 0.0 {
            LABEL_CUSTOM
        } else {
            LABEL_NOT_RATED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RatingType;

    fn quarterly_catalog() -> RatingCatalog {
        let options = vec![
            RatingOption {
                rating_type: RatingType::Quarterly,
                rating_value: 1.00,
                label: LABEL_BELOW.to_string(),
            },
            RatingOption {
                rating_type: RatingType::Quarterly,
                rating_value: 1.25,
                label: LABEL_MEETS.to_string(),
            },
            RatingOption {
                rating_type: RatingType::Quarterly,
                rating_value: 1.50,
                label: LABEL_EXCEEDS.to_string(),
            },
            RatingOption {
                rating_type: RatingType::Qualitative,
                rating_value: 0.0,
                label: "Outstanding".to_string(),
            },
        ];
        RatingCatalog::from_options(PeriodType::Quarterly, options)
    }

    #[test]
    fn test_catalog_splits_qualitative_options() {
        let catalog = quarterly_catalog();
        assert_eq!(catalog.quantitative_options().len(), 3);
        assert_eq!(catalog.qualitative_options().len(), 1);
        assert_eq!(catalog.max_rating(), 1.50);
    }

    #[test]
    fn test_quantize_fixed_points() {
        let catalog = quarterly_catalog();
        for value in [1.00, 1.25, 1.50] {
            assert_eq!(catalog.quantize(value), value);
            assert_eq!(catalog.quantize(catalog.quantize(value)), value);
        }
    }

    #[test]
    fn test_quantize_always_lands_in_set() {
        let catalog = quarterly_catalog();
        for value in [-5.0, 0.0, 0.7, 1.13, 1.38, 2.0, 1000.0] {
            let snapped = catalog.quantize(value);
            assert!([1.00, 1.25, 1.50].contains(&snapped), "got {}", snapped);
        }
    }

    #[test]
    fn test_quantize_tie_breaks_to_first_declared() {
        let catalog = quarterly_catalog();
        // 1.125 is equidistant from 1.00 and 1.25; the earlier option wins.
        assert_eq!(catalog.quantize(1.125), 1.00);
    }

    #[test]
    fn test_quantize_empty_catalog() {
        let catalog = RatingCatalog::from_options(PeriodType::Yearly, Vec::new());
        assert_eq!(catalog.max_rating(), 0.0);
        assert_eq!(catalog.quantize(1.3), 0.0);
    }

    #[test]
    fn test_summary_label_thresholds() {
        assert_eq!(RatingCatalog::summary_label(1.50), LABEL_EXCEEDS);
        assert_eq!(RatingCatalog::summary_label(1.40), LABEL_EXCEEDS);
        assert_eq!(RatingCatalog::summary_label(1.39), LABEL_MEETS);
        assert_eq!(RatingCatalog::summary_label(1.15), LABEL_MEETS);
        assert_eq!(RatingCatalog::summary_label(0.5), LABEL_BELOW);
        assert_eq!(RatingCatalog::summary_label(0.0), LABEL_NOT_RATED);
    }

    #[test]
    fn test_legend_label_exact_match() {
        assert_eq!(RatingCatalog::legend_label(1.00), LABEL_BELOW);
        assert_eq!(RatingCatalog::legend_label(1.25), LABEL_MEETS);
        assert_eq!(RatingCatalog::legend_label(1.50), LABEL_EXCEEDS);
        assert_eq!(RatingCatalog::legend_label(1.3), LABEL_CUSTOM);
        assert_eq!(RatingCatalog::legend_label(0.0), LABEL_NOT_RATED);
    }
}
