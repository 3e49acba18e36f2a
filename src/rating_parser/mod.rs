use crate::models::{KpiReview, RaterRole, StoredItemRating};
use serde::Deserialize;
use std::collections::BTreeMap;

/// The legacy blob some older reviews embed in their comment fields instead
/// of using the structured rating store.
#[derive(Debug, Deserialize)]
struct LegacyCommentBlob {
    items: Vec<LegacyItemRating>,
    #[serde(default)]
    major_accomplishments: Option<String>,
    #[serde(default)]
    disappointments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyItemRating {
    item_id: i64,
    #[serde(default)]
    rating: serde_json::Value,
    #[serde(default)]
    comment: Option<String>,
}

/// Where one role's ratings came from. Exactly one source is authoritative
/// per read: the structured store wins outright, the legacy blob is consulted
/// only when the structured store has no entries for that role, and anything
/// that is not a legacy blob stays a single flat comment.
#[derive(Debug, Clone, PartialEq)]
pub enum RatingSource {
    Absent,
    Structured {
        ratings: BTreeMap<i64, f64>,
        comments: BTreeMap<i64, String>,
    },
    LegacyJson {
        ratings: BTreeMap<i64, f64>,
        comments: BTreeMap<i64, String>,
        major_accomplishments: Option<String>,
        disappointments: Option<String>,
    },
    FlatText(String),
}

impl RatingSource {
    pub fn ratings(&self) -> Option<&BTreeMap<i64, f64>> {
        match self {
            RatingSource::Structured { ratings, .. } => Some(ratings),
            RatingSource::LegacyJson { ratings, .. } => Some(ratings),
            _ => None,
        }
    }

    pub fn comments(&self) -> Option<&BTreeMap<i64, String>> {
        match self {
            RatingSource::Structured { comments, .. } => Some(comments),
            RatingSource::LegacyJson { comments, .. } => Some(comments),
            _ => None,
        }
    }

    pub fn flat_comment(&self) -> Option<&str> {
        match self {
            RatingSource::FlatText(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRatings {
    pub employee: RatingSource,
    pub manager: RatingSource,
}

impl ParsedRatings {
    pub fn for_role(&self, role: RaterRole) -> &RatingSource {
        match role {
            RaterRole::Employee => &self.employee,
            RaterRole::Manager => &self.manager,
        }
    }
}

pub struct RatingParser;

impl RatingParser {
    /// Project a review's rating data into one source per role. Pure read:
    /// malformed legacy JSON is swallowed (the raw comment is kept verbatim
    /// as flat text) and this never fails.
    pub fn parse(review: &KpiReview) -> ParsedRatings {
        ParsedRatings {
            employee: Self::parse_role(
                &review.item_ratings.employee,
                review.employee_comment.as_deref(),
            ),
            manager: Self::parse_role(
                &review.item_ratings.manager,
                review.manager_comment.as_deref(),
            ),
        }
    }

    fn parse_role(
        structured: &BTreeMap<String, StoredItemRating>,
        comment: Option<&str>,
    ) -> RatingSource {
        if !structured.is_empty() {
            let mut ratings = BTreeMap::new();
            let mut comments = BTreeMap::new();
            for (key, stored) in structured {
                let item_id = match key.trim().parse::<i64>() {
                    Ok(id) => id,
                    Err(_) => {
                        tracing::debug!("skipping structured rating with non-numeric key {key:?}");
                        continue;
                    }
                };
                ratings.insert(item_id, Self::coerce_rating(&stored.rating));
                comments.insert(item_id, stored.comment.clone().unwrap_or_default());
            }
            return RatingSource::Structured { ratings, comments };
        }

        let text = match comment {
            Some(text) if !text.trim().is_empty() => text,
            _ => return RatingSource::Absent,
        };

        match serde_json::from_str::<LegacyCommentBlob>(text) {
            Ok(blob) => {
                let mut ratings = BTreeMap::new();
                let mut comments = BTreeMap::new();
                for item in &blob.items {
                    ratings.insert(item.item_id, Self::coerce_rating(&item.rating));
                    comments.insert(item.item_id, item.comment.clone().unwrap_or_default());
                }
                RatingSource::LegacyJson {
                    ratings,
                    comments,
                    major_accomplishments: blob.major_accomplishments,
                    disappointments: blob.disappointments,
                }
            }
            Err(err) => {
                tracing::debug!("comment is not a legacy rating blob: {err}");
                RatingSource::FlatText(text.to_string())
            }
        }
    }

    /// Ratings arrive as JSON numbers or numeric strings; anything else
    /// coerces to 0.0.
    fn coerce_rating(value: &serde_json::Value) -> f64 {
        match value {
            serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
            serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        }
    }
}
