use crate::error::Result;
use crate::grading::evaluate::breakdown;
use crate::grading::{evaluate, Gradable, GradableKind, NodeEvaluation, Score};
use crate::types::interaction::{Interaction, ItemType};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub root: String,
    pub kind: GradableKind,
    pub score: Score,
    pub nodes: Vec<NodeEvaluation>,
}

impl EvaluationReport {
    pub fn build(root: &Gradable, precision: u32) -> Result<Self> {
        Ok(Self {
            root: root.name().to_string(),
            kind: root.kind(),
            score: evaluate(root, precision)?,
            nodes: breakdown(root, precision)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingReport {
    pub rating_id: String,
    pub is_complex_grading: bool,
    pub evaluation: EvaluationReport,
}

/// An interaction with its rating re-evaluated from the stored tree.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionReport {
    pub aggregate_id: String,
    pub user_id: String,
    pub item_id: String,
    pub item_type: ItemType,
    pub created_at: DateTime<Utc>,
    pub is_liked: bool,
    pub review: Option<String>,
    pub rating: Option<RatingReport>,
}

impl InteractionReport {
    pub fn build(interaction: &Interaction, precision: u32) -> Result<Self> {
        let rating = interaction
            .rating
            .as_ref()
            .map(|rating| {
                EvaluationReport::build(&rating.gradable, precision).map(|evaluation| {
                    RatingReport {
                        rating_id: rating.rating_id.clone(),
                        is_complex_grading: rating.is_complex_grading,
                        evaluation,
                    }
                })
            })
            .transpose()?;
        Ok(Self {
            aggregate_id: interaction.aggregate_id.clone(),
            user_id: interaction.user_id.clone(),
            item_id: interaction.item_id.clone(),
            item_type: interaction.item_type,
            created_at: interaction.created_at,
            is_liked: interaction.is_liked,
            review: interaction
                .review
                .as_ref()
                .map(|review| review.content.clone()),
            rating,
        })
    }
}
