use crate::error::Result;
use crate::grading::{Gradable, GradableKind, Operation};
use serde::Serialize;

pub const DEFAULT_PRECISION: u32 = 2;
pub const NORMALIZED_MIN: f64 = 1.0;
pub const NORMALIZED_MAX: f64 = 10.0;
/// Normalized score reported for a degenerate (`min == max`) range.
pub const NORMALIZED_MIDPOINT: f64 = 5.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub current: f64,
    pub min: f64,
    pub max: f64,
}

impl Evaluation {
    pub fn normalized(&self) -> f64 {
        normalize(self.current, self.min, self.max)
    }

    pub fn rounded(&self, precision: u32) -> Self {
        Self {
            current: round_to(self.current, precision),
            min: round_to(self.min, precision),
            max: round_to(self.max, precision),
        }
    }
}

/// Root-level result: rounded value, bounds and the 1-10 normalized grade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Score {
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub normalized: f64,
}

/// Evaluates a tree and rounds only the final result.
pub fn evaluate(root: &Gradable, precision: u32) -> Result<Score> {
    let raw = root.evaluate()?;
    let rounded = raw.rounded(precision);
    Ok(Score {
        current: rounded.current,
        min: rounded.min,
        max: rounded.max,
        normalized: round_to(raw.normalized(), precision),
    })
}

/// Maps `current` from `[min, max]` onto `[1, 10]`.
pub fn normalize(current: f64, min: f64, max: f64) -> f64 {
    if max == min {
        return NORMALIZED_MIDPOINT;
    }
    NORMALIZED_MIN + ((current - min) / (max - min)) * (NORMALIZED_MAX - NORMALIZED_MIN)
}

pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// One node of a per-node evaluation listing, in depth-first order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeEvaluation {
    pub path: String,
    pub depth: usize,
    pub name: String,
    pub kind: GradableKind,
    /// Operation joining this node to its previous sibling.
    pub operation: Option<Operation>,
    pub evaluation: Evaluation,
}

pub fn breakdown(root: &Gradable, precision: u32) -> Result<Vec<NodeEvaluation>> {
    let mut rows = Vec::new();
    collect(root, String::new(), 0, None, precision, &mut rows)?;
    Ok(rows)
}

fn collect(
    node: &Gradable,
    path: String,
    depth: usize,
    operation: Option<Operation>,
    precision: u32,
    rows: &mut Vec<NodeEvaluation>,
) -> Result<()> {
    rows.push(NodeEvaluation {
        path: path.clone(),
        depth,
        name: node.name().to_string(),
        kind: node.kind(),
        operation,
        evaluation: node.evaluate()?.rounded(precision),
    });
    if let Gradable::Composite(composite) = node {
        for (index, child) in composite.children().iter().enumerate() {
            let child_path = if path.is_empty() {
                index.to_string()
            } else {
                format!("{path}.{index}")
            };
            let joining = index
                .checked_sub(1)
                .and_then(|gap| composite.actions().get(gap).copied());
            collect(child, child_path, depth + 1, joining, precision, rows)?;
        }
    }
    Ok(())
}
