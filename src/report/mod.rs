pub mod json;
pub mod md;

use crate::error::GradeError;
use crate::types::report::{EvaluationReport, InteractionReport};

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Md,
}

pub fn render_evaluation(
    report: &EvaluationReport,
    format: OutputFormat,
) -> Result<String, GradeError> {
    match format {
        OutputFormat::Json => json::to_json(report).map_err(GradeError::Json),
        OutputFormat::Md => Ok(md::evaluation_markdown(report)),
    }
}

pub fn render_interactions(
    reports: &[InteractionReport],
    format: OutputFormat,
) -> Result<String, GradeError> {
    match format {
        OutputFormat::Json => json::to_json(&reports).map_err(GradeError::Json),
        OutputFormat::Md => Ok(md::interactions_markdown(reports)),
    }
}
