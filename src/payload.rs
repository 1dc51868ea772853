use anyhow::Context;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{parse_percent, Assessment, Module};

pub fn encode(modules: &[Module]) -> Value {
    Value::Array(modules.iter().map(encode_module).collect())
}

pub fn encode_module(module: &Module) -> Value {
    let assessments: Vec<Value> = module
        .assessments
        .iter()
        .map(|a| {
            json!({
                "name": a.name,
                "weight": a.weight,
                "score": a.score,
            })
        })
        .collect();

    json!({
        "id": module.id,
        "moduleName": module.name,
        "assessments": assessments,
        "target": module.target,
    })
}

pub fn decode(value: Value) -> anyhow::Result<Vec<Module>> {
    let raw: Vec<RawModule> =
        serde_json::from_value(value).context("stored slip is not a list of modules")?;
    Ok(raw.into_iter().map(RawModule::normalize).collect())
}

pub fn decode_str(text: &str) -> anyhow::Result<Vec<Module>> {
    let value: Value = serde_json::from_str(text).context("stored slip is not valid JSON")?;
    decode(value)
}

pub fn decode_module(value: Value) -> anyhow::Result<Module> {
    let raw: RawModule =
        serde_json::from_value(value).context("stored module payload is malformed")?;
    Ok(raw.normalize())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawModule {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    module_name: Option<Value>,
    #[serde(default)]
    assessments: Option<Vec<RawAssessment>>,
    #[serde(default)]
    tests: Option<Vec<RawAssessment>>,
    #[serde(default)]
    target: Option<Value>,
    #[serde(default)]
    final_target: Option<Value>,
}

#[derive(Deserialize)]
struct RawAssessment {
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    weight: Option<Value>,
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    percentage: Option<Value>,
}

impl RawModule {
    fn normalize(self) -> Module {
        let assessments = self
            .assessments
            .or(self.tests)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, raw)| raw.normalize(index + 1))
            .collect();

        Module {
            id: self.id.as_ref().and_then(module_id).unwrap_or_else(Uuid::new_v4),
            name: self.module_name.as_ref().map(text).unwrap_or_default(),
            assessments,
            target: self
                .target
                .as_ref()
                .and_then(percent)
                .or_else(|| self.final_target.as_ref().and_then(percent)),
        }
    }
}

impl RawAssessment {
    fn normalize(self, position: usize) -> Assessment {
        let name = self
            .name
            .as_ref()
            .map(text)
            .unwrap_or_else(|| Assessment::numbered(position).name);

        Assessment {
            name,
            weight: self.weight.as_ref().and_then(percent),
            score: self
                .score
                .as_ref()
                .and_then(percent)
                .or_else(|| self.percentage.as_ref().and_then(percent)),
        }
    }
}

fn module_id(value: &Value) -> Option<Uuid> {
    match value {
        Value::String(s) => Uuid::parse_str(s)
            .ok()
            .or_else(|| s.trim().parse::<u128>().ok().map(Uuid::from_u128)),
        Value::Number(n) => n.as_u64().map(|n| Uuid::from_u128(n as u128)),
        _ => None,
    }
}

fn percent(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_percent(s),
        _ => None,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
