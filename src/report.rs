use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{AggregationPolicy, Evaluation, Module, Status};
use crate::slip::Slip;

const STATUS_ORDER: [Status; 4] = [
    Status::OnTrack,
    Status::Close,
    Status::ActionRequired,
    Status::NoTarget,
];

#[derive(Debug, Clone, PartialEq)]
pub struct StatusSummary {
    pub status: Status,
    pub count: usize,
}

pub fn summarize_by_status(evaluations: &[(&Module, Evaluation)]) -> Vec<StatusSummary> {
    let mut counts: HashMap<Status, usize> = HashMap::new();
    for (_, evaluation) in evaluations {
        *counts.entry(evaluation.status).or_insert(0) += 1;
    }

    STATUS_ORDER
        .iter()
        .filter_map(|status| {
            counts.get(status).map(|count| StatusSummary {
                status: *status,
                count: *count,
            })
        })
        .collect()
}

pub fn policy_label(policy: AggregationPolicy) -> &'static str {
    match policy {
        AggregationPolicy::Weighted => "weighted average",
        AggregationPolicy::Sum => "sum of scores",
    }
}

pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value}%"),
        None => "-".to_string(),
    }
}

pub fn render_slip(slip: &Slip, policy: AggregationPolicy) -> String {
    let mut output = String::new();

    if slip.is_empty() {
        let _ = writeln!(output, "No modules yet. Run `add-module` to start.");
        return output;
    }

    for (position, (module, evaluation)) in slip.summary(policy).iter().enumerate() {
        let _ = writeln!(
            output,
            "{}. {}  {:.1}% (target {})  {}",
            position + 1,
            module.display_name(),
            evaluation.aggregate_score,
            format_percent(module.target),
            evaluation.status.label()
        );
        for (index, assessment) in module.assessments.iter().enumerate() {
            let _ = writeln!(
                output,
                "     {}. {}  weight {}  score {}",
                index + 1,
                assessment.name,
                format_percent(assessment.weight),
                format_percent(assessment.score)
            );
        }
        if !evaluation.weights_balanced {
            let _ = writeln!(
                output,
                "     weights total {}% (not 100%)",
                evaluation.weight_total
            );
        }
    }

    output
}

pub fn build_report(slip: &Slip, policy: AggregationPolicy, generated_at: DateTime<Utc>) -> String {
    let evaluations = slip.summary(policy);
    let summaries = summarize_by_status(&evaluations);

    let mut output = String::new();

    let _ = writeln!(output, "# Result Slip Report");
    let _ = writeln!(
        output,
        "Generated {} using {} aggregation",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        policy_label(policy)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No modules recorded.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(output, "- {}: {} modules", summary.status.label(), summary.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Modules");

    if evaluations.is_empty() {
        let _ = writeln!(output, "No modules recorded.");
    } else {
        let _ = writeln!(output, "| Module | Assessments | Target | Total % | Status |");
        let _ = writeln!(output, "| --- | --- | --- | --- | --- |");
        for (module, evaluation) in evaluations.iter() {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {:.1} | {} |",
                module.display_name(),
                module.assessments.len(),
                format_percent(module.target),
                evaluation.aggregate_score,
                evaluation.status.label()
            );
        }
    }

    let unbalanced: Vec<&(&Module, Evaluation)> = evaluations
        .iter()
        .filter(|(module, evaluation)| !module.assessments.is_empty() && !evaluation.weights_balanced)
        .collect();

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weight Check");

    if unbalanced.is_empty() {
        let _ = writeln!(output, "All assessment weights add up to 100%.");
    } else {
        for (module, evaluation) in unbalanced {
            let _ = writeln!(
                output,
                "- {}: weights total {}%",
                module.display_name(),
                evaluation.weight_total
            );
        }
    }

    output
}
