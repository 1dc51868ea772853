use crate::models::{AggregationPolicy, Assessment, Evaluation, Module, Status};

const CLOSE_MARGIN: f64 = 10.0;
const FULL_WEIGHT: f64 = 100.0;
// Absorbs binary rounding error in one-decimal form input.
const TOLERANCE: f64 = 1e-9;

pub fn evaluate(
    assessments: &[Assessment],
    target: Option<f64>,
    policy: AggregationPolicy,
) -> Evaluation {
    let aggregate_score = aggregate(assessments, policy);
    let weight_total = weight_total(assessments);

    Evaluation {
        aggregate_score,
        status: classify(aggregate_score, target),
        weight_total,
        weights_balanced: weights_balanced(weight_total),
    }
}

pub fn evaluate_module(module: &Module, policy: AggregationPolicy) -> Evaluation {
    evaluate(&module.assessments, module.target, policy)
}

pub fn aggregate(assessments: &[Assessment], policy: AggregationPolicy) -> f64 {
    match policy {
        AggregationPolicy::Weighted => weighted_average(assessments),
        AggregationPolicy::Sum => sum_scores(assessments),
    }
}

pub fn weighted_average(assessments: &[Assessment]) -> f64 {
    let total = weight_total(assessments);
    if total == 0.0 {
        return 0.0;
    }

    let weighted: f64 = assessments
        .iter()
        .map(|a| a.weight_value() * a.score_value())
        .sum();
    round_one_decimal(weighted / total)
}

pub fn sum_scores(assessments: &[Assessment]) -> f64 {
    let total: f64 = assessments.iter().map(Assessment::score_value).sum();
    round_one_decimal(total)
}

pub fn weight_total(assessments: &[Assessment]) -> f64 {
    assessments.iter().map(Assessment::weight_value).sum()
}

pub fn weights_balanced(total: f64) -> bool {
    (total - FULL_WEIGHT).abs() < TOLERANCE
}

pub fn classify(aggregate_score: f64, target: Option<f64>) -> Status {
    let Some(target) = target.filter(|t| t.is_finite()) else {
        return Status::NoTarget;
    };

    let diff = aggregate_score - target;
    if diff >= -TOLERANCE {
        Status::OnTrack
    } else if diff >= -CLOSE_MARGIN - TOLERANCE {
        Status::Close
    } else {
        Status::ActionRequired
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
