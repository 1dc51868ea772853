use clap::ValueEnum;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub name: String,
    pub weight: Option<f64>,
    pub score: Option<f64>,
}

impl Assessment {
    pub fn numbered(position: usize) -> Self {
        Self {
            name: format!("Test {position}"),
            weight: None,
            score: None,
        }
    }

    pub fn weight_value(&self) -> f64 {
        self.weight.unwrap_or(0.0)
    }

    pub fn score_value(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub id: Uuid,
    pub name: String,
    pub assessments: Vec<Assessment>,
    pub target: Option<f64>,
}

impl Module {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            assessments: vec![Assessment::numbered(1)],
            target: None,
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "(unnamed module)"
        } else {
            &self.name
        }
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    NoTarget,
    OnTrack,
    Close,
    ActionRequired,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::NoTarget => "Set a target",
            Status::OnTrack => "Excellent",
            Status::Close => "Close",
            Status::ActionRequired => "Action Required",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AggregationPolicy {
    /// Σ(weight·score) / Σweight, rounded to one decimal.
    #[default]
    Weighted,
    /// Plain sum of scores; weights are advisory only.
    Sum,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub aggregate_score: f64,
    pub status: Status,
    pub weight_total: f64,
    pub weights_balanced: bool,
}

// Blank or non-numeric input is `None`, not an error.
pub fn parse_percent(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().trim_end_matches('%').trim_end();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}
