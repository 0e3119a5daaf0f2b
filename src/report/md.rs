use crate::types::report::{EvaluationReport, InteractionReport};

pub fn evaluation_markdown(report: &EvaluationReport) -> String {
    let mut output = String::new();
    output.push_str(&format!("# Evaluation: {}\n\n", report.root));
    push_score(&mut output, report);
    output.push_str("## Breakdown\n\n");
    push_nodes(&mut output, report);
    output
}

pub fn interactions_markdown(reports: &[InteractionReport]) -> String {
    let mut output = String::new();
    output.push_str("# Interactions\n\n");
    if reports.is_empty() {
        output.push_str("- none\n");
        return output;
    }

    for report in reports {
        output.push_str(&format!(
            "## {} {} ({})\n\n",
            report.item_type, report.item_id, report.aggregate_id
        ));
        output.push_str(&format!(
            "- user: {}\n- created: {}\n- liked: {}\n",
            report.user_id,
            report.created_at.to_rfc3339(),
            if report.is_liked { "yes" } else { "no" }
        ));
        if let Some(review) = &report.review {
            output.push_str(&format!("- review: {review}\n"));
        }
        match &report.rating {
            Some(rating) => {
                output.push_str(&format!(
                    "- rating: {} ({})\n\n",
                    rating.evaluation.score.normalized,
                    if rating.is_complex_grading {
                        "complex"
                    } else {
                        "simple"
                    }
                ));
                if rating.is_complex_grading {
                    push_nodes(&mut output, &rating.evaluation);
                }
            }
            None => output.push_str("- rating: none\n\n"),
        }
    }
    output
}

fn push_score(output: &mut String, report: &EvaluationReport) {
    output.push_str(&format!(
        "Normalized grade: {}\n\n- current: {}\n- min: {}\n- max: {}\n\n",
        report.score.normalized, report.score.current, report.score.min, report.score.max
    ));
}

fn push_nodes(output: &mut String, report: &EvaluationReport) {
    for node in &report.nodes {
        let indent = "  ".repeat(node.depth);
        let joined = node
            .operation
            .map(|operation| format!("{} ", operation.symbol()))
            .unwrap_or_default();
        output.push_str(&format!(
            "{indent}- {joined}{} [{}]: {} in [{}, {}]\n",
            node.name, node.kind, node.evaluation.current, node.evaluation.min, node.evaluation.max
        ));
    }
    output.push('\n');
}
