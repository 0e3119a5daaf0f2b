use crate::error::GradeError;
use crate::grading::evaluate::DEFAULT_PRECISION;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DATABASE: &str = ".gradecraft/grades.db";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GradecraftConfig {
    pub storage: Option<StorageConfig>,
    pub grading: Option<GradingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub database: Option<String>,
    pub busy_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GradingConfig {
    pub basic_min: Option<f64>,
    pub basic_max: Option<f64>,
    pub basic_step: Option<f64>,
    pub display_precision: Option<u32>,
}

/// Bounds of the single leaf behind a simple (non-complex) rating, plus output precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradingSettings {
    pub basic_min: f64,
    pub basic_max: f64,
    pub basic_step: f64,
    pub display_precision: u32,
}

impl Default for GradingSettings {
    fn default() -> Self {
        Self {
            basic_min: 1.0,
            basic_max: 10.0,
            basic_step: 0.5,
            display_precision: DEFAULT_PRECISION,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageSettings {
    pub database: PathBuf,
    pub busy_timeout: Duration,
}

impl GradecraftConfig {
    pub fn grading_settings(&self) -> GradingSettings {
        let defaults = GradingSettings::default();
        match &self.grading {
            Some(grading) => GradingSettings {
                basic_min: grading.basic_min.unwrap_or(defaults.basic_min),
                basic_max: grading.basic_max.unwrap_or(defaults.basic_max),
                basic_step: grading.basic_step.unwrap_or(defaults.basic_step),
                display_precision: grading
                    .display_precision
                    .unwrap_or(defaults.display_precision),
            },
            None => defaults,
        }
    }

    pub fn storage_settings(&self, root: &Path) -> StorageSettings {
        let storage = self.storage.as_ref();
        let database = storage
            .and_then(|storage| storage.database.as_deref())
            .unwrap_or(DEFAULT_DATABASE);
        let candidate = PathBuf::from(database);
        let database = if candidate.is_absolute() {
            candidate
        } else {
            root.join(candidate)
        };
        let busy_timeout_ms = storage
            .and_then(|storage| storage.busy_timeout_ms)
            .unwrap_or(5000);
        StorageSettings {
            database,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
        }
    }

    pub fn validate(&self) -> Result<(), GradeError> {
        let grading = self.grading_settings();
        if !grading.basic_min.is_finite() || !grading.basic_max.is_finite() {
            return Err(GradeError::ConfigParse(
                "grading.basic_min and grading.basic_max must be finite".to_string(),
            ));
        }
        if grading.basic_min >= grading.basic_max {
            return Err(GradeError::ConfigParse(format!(
                "grading.basic_min ({}) must be below grading.basic_max ({})",
                grading.basic_min, grading.basic_max
            )));
        }
        if !grading.basic_step.is_finite() || grading.basic_step <= 0.0 {
            return Err(GradeError::ConfigParse(
                "grading.basic_step must be greater than 0".to_string(),
            ));
        }
        if grading.display_precision > 10 {
            return Err(GradeError::ConfigParse(
                "grading.display_precision must be at most 10".to_string(),
            ));
        }
        if let Some(database) = self
            .storage
            .as_ref()
            .and_then(|storage| storage.database.as_ref())
        {
            if database.trim().is_empty() {
                return Err(GradeError::ConfigParse(
                    "storage.database cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
