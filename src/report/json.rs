use serde::Serialize;

pub fn to_json<T: Serialize + ?Sized>(report: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{CompositeNode, GradeLeaf, Gradable, Operation};
    use crate::types::report::EvaluationReport;

    #[test]
    fn json_report_contains_normalized_score() {
        let tree: Gradable = CompositeNode::block("Album")
            .attach(
                vec![
                    GradeLeaf::new("a", 1.0, 5.0, 1.0)
                        .and_then(|leaf| leaf.with_value(5.0))
                        .expect("valid")
                        .into(),
                    GradeLeaf::new("b", 2.0, 4.0, 1.0)
                        .and_then(|leaf| leaf.with_value(4.0))
                        .expect("valid")
                        .into(),
                ],
                vec![Operation::Add],
            )
            .expect("valid shape")
            .into();
        let report = EvaluationReport::build(&tree, 2).expect("report should build");

        let rendered = to_json(&report).expect("json should serialize");
        assert!(rendered.contains("\"normalized\": 10.0"));
        assert!(rendered.contains("\"operation\": \"add\""));
    }
}
