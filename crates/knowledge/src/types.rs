//! Knowledge system type definitions.

use profrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// A student review of a professor.
///
/// Field names serialize in camelCase, which is also the metadata layout
/// stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    /// Stable identifier, e.g. `review-7`
    pub id: String,

    pub professor: String,

    pub subject: String,

    /// 1 (worst) to 5 (best)
    pub star_rating: u8,

    pub review_comment: String,
}

impl ReviewRecord {
    /// Check rating range and non-empty text fields.
    pub fn validate(&self) -> AppResult<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::Knowledge("Review id cannot be empty".to_string()));
        }

        if !(1..=5).contains(&self.star_rating) {
            return Err(AppError::Knowledge(format!(
                "Review '{}' has star rating {} outside 1-5",
                self.id, self.star_rating
            )));
        }

        if self.review_comment.trim().is_empty() {
            return Err(AppError::Knowledge(format!(
                "Review '{}' has an empty comment",
                self.id
            )));
        }

        Ok(())
    }

    /// Metadata stored with the review's vector.
    pub fn metadata(&self) -> ReviewMetadata {
        ReviewMetadata {
            professor: self.professor.clone(),
            subject: self.subject.clone(),
            star_rating: self.star_rating,
            review_comment: self.review_comment.clone(),
        }
    }
}

/// Review fields stored as vector metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewMetadata {
    pub professor: String,
    pub subject: String,

    /// Hosted stores hand numbers back as floats
    #[serde(deserialize_with = "rating_from_number")]
    pub star_rating: u8,

    pub review_comment: String,
}

fn rating_from_number<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || !(0.0..=255.0).contains(&value) {
        return Err(serde::de::Error::custom(format!(
            "invalid star rating {}",
            value
        )));
    }
    Ok(value as u8)
}

/// A vector as written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedVector {
    pub id: String,

    /// Embedding of the review comment
    pub values: Vec<f32>,

    pub metadata: ReviewMetadata,
}

/// A raw nearest-neighbour hit returned by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,

    /// Undecoded metadata; absent when not requested
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Nearest-neighbour query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub top_k: usize,
    pub include_metadata: bool,
}

/// Collection creation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub dimension: usize,

    /// "cosine", "euclidean" or "dotproduct"
    pub metric: String,

    /// Serverless placement, used by hosted stores only
    pub cloud: String,
    pub region: String,
}

impl Default for IndexSpec {
    fn default() -> Self {
        Self {
            dimension: 768,
            metric: "cosine".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

/// A review retrieved for a query, with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredMatch {
    pub score: f32,
    pub professor: String,
    pub subject: String,
    pub star_rating: u8,
    pub review_comment: String,
}

impl ScoredMatch {
    /// Decode a store hit; `None` when metadata is missing or malformed.
    pub fn from_vector_match(hit: &VectorMatch) -> Option<Self> {
        let metadata: ReviewMetadata = serde_json::from_value(hit.metadata.clone()?).ok()?;
        Some(Self {
            score: hit.score,
            professor: metadata.professor,
            subject: metadata.subject,
            star_rating: metadata.star_rating,
            review_comment: metadata.review_comment,
        })
    }
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// Whether the collection was created by this run
    pub created_index: bool,

    pub upserted: usize,

    /// Records skipped because validation, embedding or upsert failed
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: u8, comment: &str) -> ReviewRecord {
        ReviewRecord {
            id: "review-1".to_string(),
            professor: "Dr. Jane Smith".to_string(),
            subject: "Mathematics".to_string(),
            star_rating: rating,
            review_comment: comment.to_string(),
        }
    }

    #[test]
    fn test_review_validation() {
        assert!(review(5, "Great").validate().is_ok());
        assert!(review(1, "Bad").validate().is_ok());
        assert!(review(0, "Zero").validate().is_err());
        assert!(review(6, "Six").validate().is_err());
        assert!(review(3, "   ").validate().is_err());
    }

    #[test]
    fn test_review_serializes_camel_case() {
        let json = serde_json::to_value(review(4, "Fine")).unwrap();
        assert_eq!(json["starRating"], 4);
        assert_eq!(json["reviewComment"], "Fine");
    }

    #[test]
    fn test_scored_match_from_vector_match() {
        let hit = VectorMatch {
            id: "review-1".to_string(),
            score: 0.87,
            metadata: Some(serde_json::to_value(review(5, "Great").metadata()).unwrap()),
        };

        let scored = ScoredMatch::from_vector_match(&hit).unwrap();
        assert_eq!(scored.professor, "Dr. Jane Smith");
        assert_eq!(scored.star_rating, 5);
        assert!((scored.score - 0.87).abs() < f32::EPSILON);
    }

    #[test]
    fn test_scored_match_rejects_bad_metadata() {
        let missing = VectorMatch {
            id: "a".to_string(),
            score: 0.5,
            metadata: None,
        };
        assert!(ScoredMatch::from_vector_match(&missing).is_none());

        let malformed = VectorMatch {
            id: "b".to_string(),
            score: 0.5,
            metadata: Some(serde_json::json!({"professor": "X"})),
        };
        assert!(ScoredMatch::from_vector_match(&malformed).is_none());
    }

    #[test]
    fn test_metadata_accepts_float_rating() {
        let metadata: ReviewMetadata = serde_json::from_value(serde_json::json!({
            "professor": "Dr. Michael Brown",
            "subject": "Chemistry",
            "starRating": 2.0,
            "reviewComment": "Hard to follow."
        }))
        .unwrap();
        assert_eq!(metadata.star_rating, 2);

        let fractional = serde_json::from_value::<ReviewMetadata>(serde_json::json!({
            "professor": "X", "subject": "Y", "starRating": 2.5, "reviewComment": "Z"
        }));
        assert!(fractional.is_err());
    }
}
