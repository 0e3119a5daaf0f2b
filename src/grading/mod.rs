pub mod composite;
pub mod evaluate;
pub mod leaf;

pub use composite::{CompositeNode, Operation};
pub use evaluate::{evaluate, Evaluation, NodeEvaluation, Score};
pub use leaf::GradeLeaf;

use crate::error::{GradeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Anything that evaluates to `(current, min, max)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Gradable {
    Grade(GradeLeaf),
    Composite(CompositeNode),
}

impl Gradable {
    pub fn name(&self) -> &str {
        match self {
            Self::Grade(leaf) => leaf.name(),
            Self::Composite(node) => node.name(),
        }
    }

    pub fn kind(&self) -> GradableKind {
        match self {
            Self::Grade(_) => GradableKind::Grade,
            Self::Composite(node) if node.is_method() => GradableKind::Method,
            Self::Composite(_) => GradableKind::Block,
        }
    }

    pub fn evaluate(&self) -> Result<Evaluation> {
        match self {
            Self::Grade(leaf) => Ok(leaf.evaluate()),
            Self::Composite(node) => node.evaluate(),
        }
    }

    /// Checks every leaf invariant and every composite shape in the tree.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Grade(leaf) => leaf.validate(),
            Self::Composite(node) => {
                node.validate_shape()?;
                node.children().iter().try_for_each(Gradable::validate)
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Self::Grade(_) => 1,
            Self::Composite(node) => {
                1 + node
                    .children()
                    .iter()
                    .map(Gradable::depth)
                    .max()
                    .unwrap_or(0)
            }
        }
    }

    pub fn node_count(&self) -> usize {
        match self {
            Self::Grade(_) => 1,
            Self::Composite(node) => {
                1 + node
                    .children()
                    .iter()
                    .map(Gradable::node_count)
                    .sum::<usize>()
            }
        }
    }

    /// Unsets every leaf value, leaving the structure intact.
    pub fn clear_values(&mut self) {
        match self {
            Self::Grade(leaf) => leaf.clear_value(),
            Self::Composite(node) => node.clear_values(),
        }
    }

    /// Rounds every set leaf value onto its step grid.
    pub fn snap_values(&mut self) -> Result<()> {
        match self {
            Self::Grade(leaf) => leaf.snap_value(),
            Self::Composite(node) => node.snap_values(),
        }
    }
}

impl From<GradeLeaf> for Gradable {
    fn from(leaf: GradeLeaf) -> Self {
        Self::Grade(leaf)
    }
}

impl From<CompositeNode> for Gradable {
    fn from(node: CompositeNode) -> Self {
        Self::Composite(node)
    }
}

/// Storage discriminator for a gradable row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradableKind {
    Grade,
    Block,
    Method,
}

impl GradableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grade => "grade",
            Self::Block => "block",
            Self::Method => "method",
        }
    }
}

impl FromStr for GradableKind {
    type Err = GradeError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "grade" => Ok(Self::Grade),
            "block" => Ok(Self::Block),
            "method" => Ok(Self::Method),
            other => Err(GradeError::InvalidRequest(format!(
                "unknown gradable kind '{other}'"
            ))),
        }
    }
}

impl fmt::Display for GradableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Gradable {
        let inner = CompositeNode::method("tpl-1", "Production")
            .attach(
                vec![
                    GradeLeaf::new("Mix", 0.0, 5.0, 1.0).expect("valid").into(),
                    GradeLeaf::new("Master", 0.0, 5.0, 1.0).expect("valid").into(),
                ],
                vec![Operation::Add],
            )
            .expect("valid shape");
        CompositeNode::block("Album")
            .attach(
                vec![
                    GradeLeaf::new("Lyrics", 1.0, 10.0, 0.5)
                        .and_then(|leaf| leaf.with_value(8.0))
                        .expect("valid")
                        .into(),
                    inner.into(),
                ],
                vec![Operation::Multiply],
            )
            .expect("valid shape")
            .into()
    }

    #[test]
    fn kind_distinguishes_block_and_method() {
        let tree = sample();
        assert_eq!(tree.kind(), GradableKind::Block);
        let Gradable::Composite(node) = &tree else {
            panic!("expected composite");
        };
        assert_eq!(node.children()[0].kind(), GradableKind::Grade);
        assert_eq!(node.children()[1].kind(), GradableKind::Method);
    }

    #[test]
    fn depth_and_node_count_walk_the_tree() {
        let tree = sample();
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.node_count(), 5);
    }

    #[test]
    fn clear_values_unsets_every_leaf() {
        let mut tree = sample();
        tree.clear_values();
        let evaluation = tree.evaluate().expect("should evaluate");
        assert_eq!(evaluation.current, evaluation.min);
    }

    #[test]
    fn json_tree_round_trips_through_serde() {
        let tree = sample();
        let json = serde_json::to_string(&tree).expect("serialize");
        assert!(json.contains(r#""kind":"composite""#));
        let parsed: Gradable = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, tree);
    }

    #[test]
    fn validate_reports_nested_shape_errors() {
        let json = r#"{
            "kind": "composite",
            "name": "root",
            "children": [
                {"kind": "grade", "name": "a", "min_grade": 0, "max_grade": 5, "step_amount": 1},
                {"kind": "composite", "name": "empty"}
            ],
            "actions": ["add"]
        }"#;
        let tree: Gradable = serde_json::from_str(json).expect("deserialize");
        assert!(matches!(
            tree.validate(),
            Err(GradeError::EmptyComposite(name)) if name == "empty"
        ));
    }
}
