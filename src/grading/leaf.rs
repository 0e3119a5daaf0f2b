use crate::error::{GradeError, Result};
use crate::grading::evaluate::Evaluation;
use serde::{Deserialize, Serialize};

/// Tolerance used when deciding whether a value sits on a leaf's step grid.
pub const STEP_TOLERANCE: f64 = 1e-4;

/// An atomic scored parameter: bounds, a quantization step and an optional value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeLeaf {
    name: String,
    min_grade: f64,
    max_grade: f64,
    step_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_value: Option<f64>,
}

impl GradeLeaf {
    pub fn new(
        name: impl Into<String>,
        min_grade: f64,
        max_grade: f64,
        step_amount: f64,
    ) -> Result<Self> {
        let leaf = Self {
            name: name.into(),
            min_grade,
            max_grade,
            step_amount,
            current_value: None,
        };
        leaf.validate()?;
        Ok(leaf)
    }

    /// Rebuilds a leaf from all of its stored fields at once.
    pub fn restore(
        name: impl Into<String>,
        min_grade: f64,
        max_grade: f64,
        step_amount: f64,
        current_value: Option<f64>,
    ) -> Result<Self> {
        let leaf = Self {
            name: name.into(),
            min_grade,
            max_grade,
            step_amount,
            current_value,
        };
        leaf.validate()?;
        Ok(leaf)
    }

    pub fn with_value(mut self, value: f64) -> Result<Self> {
        self.set_value(value)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_grade(&self) -> f64 {
        self.min_grade
    }

    pub fn max_grade(&self) -> f64 {
        self.max_grade
    }

    pub fn step_amount(&self) -> f64 {
        self.step_amount
    }

    pub fn current_value(&self) -> Option<f64> {
        self.current_value
    }

    /// Sets the value, snapping it to the nearest step inside the bounds.
    ///
    /// Values outside `[min, max]` are rejected rather than clamped.
    pub fn set_value(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() || value < self.min_grade || value > self.max_grade {
            return Err(GradeError::OutOfRange {
                value,
                min: self.min_grade,
                max: self.max_grade,
            });
        }
        self.current_value = Some(self.snap(value));
        Ok(())
    }

    pub fn clear_value(&mut self) {
        self.current_value = None;
    }

    /// Re-applies `set_value` to a value that arrived without going through it.
    pub fn snap_value(&mut self) -> Result<()> {
        match self.current_value {
            Some(value) => self.set_value(value),
            None => Ok(()),
        }
    }

    /// Strict grid check, for callers that reject off-step input instead of rounding it.
    pub fn check_step(&self, value: f64) -> Result<()> {
        if on_step_grid(value, self.min_grade, self.step_amount) {
            Ok(())
        } else {
            Err(GradeError::InvalidStep {
                value,
                min: self.min_grade,
                step: self.step_amount,
            })
        }
    }

    /// An unset leaf evaluates as its own minimum.
    pub fn evaluate(&self) -> Evaluation {
        Evaluation {
            current: self.current_value.unwrap_or(self.min_grade),
            min: self.min_grade,
            max: self.max_grade,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min_grade.is_finite() || !self.max_grade.is_finite() {
            return Err(GradeError::InvalidLeaf(format!(
                "'{}' has non-finite bounds",
                self.name
            )));
        }
        if self.min_grade > self.max_grade {
            return Err(GradeError::InvalidLeaf(format!(
                "'{}' has min {} above max {}",
                self.name, self.min_grade, self.max_grade
            )));
        }
        if !self.step_amount.is_finite() || self.step_amount <= 0.0 {
            return Err(GradeError::InvalidLeaf(format!(
                "'{}' has non-positive step {}",
                self.name, self.step_amount
            )));
        }
        if let Some(value) = self.current_value {
            if value < self.min_grade || value > self.max_grade {
                return Err(GradeError::OutOfRange {
                    value,
                    min: self.min_grade,
                    max: self.max_grade,
                });
            }
        }
        Ok(())
    }

    fn snap(&self, value: f64) -> f64 {
        let steps = ((value - self.min_grade) / self.step_amount).round();
        let mut snapped = self.min_grade + steps * self.step_amount;
        if snapped > self.max_grade + STEP_TOLERANCE {
            snapped -= self.step_amount;
        }
        snapped.clamp(self.min_grade, self.max_grade)
    }
}

impl Default for GradeLeaf {
    /// Zero-bound placeholder used when a stored rating cannot name its gradable.
    fn default() -> Self {
        Self {
            name: "Grade".to_string(),
            min_grade: 0.0,
            max_grade: 0.0,
            step_amount: 1.0,
            current_value: None,
        }
    }
}

fn on_step_grid(value: f64, min: f64, step: f64) -> bool {
    let ratio = (value - min) / step;
    (ratio.round() - ratio).abs() < STEP_TOLERANCE
}
