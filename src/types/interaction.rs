use crate::error::{GradeError, Result};
use crate::grading::{GradeLeaf, Gradable};
use crate::types::config::GradingSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const BASIC_GRADE_NAME: &str = "Basic grade";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Album,
    Track,
    Artist,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Album => "album",
            Self::Track => "track",
            Self::Artist => "artist",
        }
    }
}

impl FromStr for ItemType {
    type Err = GradeError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "album" => Ok(Self::Album),
            "track" => Ok(Self::Track),
            "artist" => Ok(Self::Artist),
            other => Err(GradeError::InvalidRequest(format!(
                "unknown item type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            review_id: Uuid::new_v4().to_string(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// A rating owns its gradable tree exclusively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub rating_id: String,
    pub is_complex_grading: bool,
    pub gradable: Gradable,
    pub created_at: DateTime<Utc>,
}

impl Rating {
    pub fn simple(leaf: GradeLeaf) -> Self {
        Self::with_gradable(false, leaf.into())
    }

    pub fn complex(root: Gradable) -> Self {
        Self::with_gradable(true, root)
    }

    fn with_gradable(is_complex_grading: bool, gradable: Gradable) -> Self {
        Self {
            rating_id: Uuid::new_v4().to_string(),
            is_complex_grading,
            gradable,
            created_at: Utc::now(),
        }
    }
}

/// The unit of transactional consistency: a user's like, review and rating of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub aggregate_id: String,
    pub user_id: String,
    pub item_id: String,
    pub item_type: ItemType,
    pub created_at: DateTime<Utc>,
    pub is_liked: bool,
    pub review: Option<Review>,
    pub rating: Option<Rating>,
}

impl Interaction {
    pub fn new(
        user_id: impl Into<String>,
        item_id: impl Into<String>,
        item_type: ItemType,
    ) -> Self {
        Self {
            aggregate_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            item_id: item_id.into(),
            item_type,
            created_at: Utc::now(),
            is_liked: false,
            review: None,
            rating: None,
        }
    }
}

/// Client-submitted grade: either one scalar or a pre-built tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GradingRequest {
    #[serde(default)]
    pub use_complex_grading: bool,
    pub basic_grade: Option<f64>,
    #[serde(alias = "gradable_reference")]
    pub gradable: Option<Gradable>,
}

impl GradingRequest {
    pub fn into_rating(self, settings: &GradingSettings) -> Result<Rating> {
        if self.use_complex_grading {
            let mut root = self.gradable.ok_or_else(|| {
                GradeError::InvalidRequest(
                    "complex grading requires a gradable tree".to_string(),
                )
            })?;
            root.validate()?;
            root.snap_values()?;
            return Ok(Rating::complex(root));
        }
        let value = self.basic_grade.ok_or_else(|| {
            GradeError::InvalidRequest("simple grading requires basic_grade".to_string())
        })?;
        let leaf = GradeLeaf::new(
            BASIC_GRADE_NAME,
            settings.basic_min,
            settings.basic_max,
            settings.basic_step,
        )?
        .with_value(value)?;
        Ok(Rating::simple(leaf))
    }
}
