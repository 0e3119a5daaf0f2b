use crate::error::{GradeError, Result};
use crate::grading::evaluate::Evaluation;
use crate::grading::Gradable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stand-in for a zero divisor bound when computing quotient candidates.
pub const DIVISOR_EPSILON: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '*',
            Self::Divide => '/',
        }
    }

    /// Combines two evaluations, tracking the reachable interval of the result.
    pub fn apply(self, lhs: Evaluation, rhs: Evaluation) -> Evaluation {
        match self {
            Self::Add => Evaluation {
                current: lhs.current + rhs.current,
                min: lhs.min + rhs.min,
                max: lhs.max + rhs.max,
            },
            Self::Subtract => Evaluation {
                current: lhs.current - rhs.current,
                min: lhs.min - rhs.max,
                max: lhs.max - rhs.min,
            },
            Self::Multiply => {
                let (min, max) = bounds([
                    lhs.min * rhs.min,
                    lhs.min * rhs.max,
                    lhs.max * rhs.min,
                    lhs.max * rhs.max,
                ]);
                Evaluation {
                    current: lhs.current * rhs.current,
                    min,
                    max,
                }
            }
            Self::Divide => {
                if rhs.current == 0.0 {
                    // Division is skipped; the running maximum stands in for the result.
                    return Evaluation {
                        current: lhs.max,
                        min: lhs.min,
                        max: lhs.max,
                    };
                }
                let rhs_min = if rhs.min == 0.0 { DIVISOR_EPSILON } else { rhs.min };
                let rhs_max = if rhs.max == 0.0 { -DIVISOR_EPSILON } else { rhs.max };
                let (min, max) = bounds([
                    lhs.min / rhs_min,
                    lhs.min / rhs_max,
                    lhs.max / rhs_min,
                    lhs.max / rhs_max,
                ]);
                Evaluation {
                    current: lhs.current / rhs.current,
                    min,
                    max,
                }
            }
        }
    }
}

fn bounds(candidates: [f64; 4]) -> (f64, f64) {
    candidates
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), value| {
            (lo.min(*value), hi.max(*value))
        })
}

impl FromStr for Operation {
    type Err = GradeError;

    fn from_str(token: &str) -> Result<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "add" | "+" => Ok(Self::Add),
            "subtract" | "-" => Ok(Self::Subtract),
            "multiply" | "*" => Ok(Self::Multiply),
            "divide" | "/" => Ok(Self::Divide),
            other => Err(GradeError::InvalidOperation(other.to_string())),
        }
    }
}

impl TryFrom<String> for Operation {
    type Error = GradeError;

    fn try_from(token: String) -> Result<Self> {
        token.parse()
    }
}

impl From<Operation> for String {
    fn from(operation: Operation) -> Self {
        operation.as_str().to_string()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, ordered combination of gradables.
///
/// A composite with a `template_id` is an instance of a reusable grading method; without
/// one it is an ad-hoc block. Both evaluate identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeNode {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template_id: Option<String>,
    #[serde(default)]
    children: Vec<Gradable>,
    #[serde(default)]
    actions: Vec<Operation>,
}

impl CompositeNode {
    pub fn block(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template_id: None,
            children: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn method(template_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            template_id: Some(template_id.into()),
            ..Self::block(name)
        }
    }

    /// Attaches children and the operations joining them in one step.
    pub fn attach(mut self, children: Vec<Gradable>, actions: Vec<Operation>) -> Result<Self> {
        if children.is_empty() {
            return Err(GradeError::EmptyComposite(self.name));
        }
        if actions.len() != children.len() - 1 {
            return Err(GradeError::ActionCountMismatch {
                name: self.name,
                children: children.len(),
                actions: actions.len(),
            });
        }
        self.children = children;
        self.actions = actions;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template_id(&self) -> Option<&str> {
        self.template_id.as_deref()
    }

    pub fn set_template_id(&mut self, template_id: Option<String>) {
        self.template_id = template_id;
    }

    pub fn is_method(&self) -> bool {
        self.template_id.is_some()
    }

    pub fn children(&self) -> &[Gradable] {
        &self.children
    }

    pub fn clear_values(&mut self) {
        self.children.iter_mut().for_each(Gradable::clear_values);
    }

    pub fn snap_values(&mut self) -> Result<()> {
        self.children.iter_mut().try_for_each(Gradable::snap_values)
    }

    pub fn actions(&self) -> &[Operation] {
        &self.actions
    }

    pub fn validate_shape(&self) -> Result<()> {
        if self.children.is_empty() {
            return Err(GradeError::EmptyComposite(self.name.clone()));
        }
        if self.actions.len() != self.children.len() - 1 {
            return Err(GradeError::ActionCountMismatch {
                name: self.name.clone(),
                children: self.children.len(),
                actions: self.actions.len(),
            });
        }
        Ok(())
    }

    /// Left fold over the children, unrounded.
    pub fn evaluate(&self) -> Result<Evaluation> {
        self.validate_shape()?;
        let mut children = self.children.iter();
        let first = match children.next() {
            Some(child) => child.evaluate()?,
            None => return Err(GradeError::EmptyComposite(self.name.clone())),
        };
        children
            .zip(self.actions.iter())
            .try_fold(first, |acc, (child, operation)| {
                Ok(operation.apply(acc, child.evaluate()?))
            })
    }
}
