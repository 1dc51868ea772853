use clap::ValueEnum;
use uuid::Uuid;

use crate::evaluate;
use crate::models::{parse_percent, AggregationPolicy, Assessment, Evaluation, Module};

/// How a command names a module: 1-based position, id, or name. A `name:`
/// prefix forces a name lookup, for modules whose name looks like a number.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleRef {
    Position(usize),
    Id(Uuid),
    Name(String),
}

impl ModuleRef {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(name) = raw.strip_prefix("name:") {
            return ModuleRef::Name(name.trim().to_string());
        }
        if let Ok(position) = raw.parse::<usize>() {
            return ModuleRef::Position(position);
        }
        if let Ok(id) = Uuid::parse_str(raw) {
            return ModuleRef::Id(id);
        }
        ModuleRef::Name(raw.to_string())
    }
}

impl std::fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleRef::Position(position) => write!(f, "#{position}"),
            ModuleRef::Id(id) => write!(f, "{id}"),
            ModuleRef::Name(name) => write!(f, "\"{name}\""),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AssessmentField {
    Name,
    Weight,
    Score,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slip {
    modules: Vec<Module>,
}

impl Slip {
    pub fn new(modules: Vec<Module>) -> Self {
        Self { modules }
    }

    pub fn starter() -> Self {
        Self::new(vec![Module::new()])
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn add_module(&mut self) -> &mut Module {
        self.modules.push(Module::new());
        let last = self.modules.len() - 1;
        &mut self.modules[last]
    }

    pub fn position_of(&self, module_ref: &ModuleRef) -> anyhow::Result<usize> {
        match module_ref {
            ModuleRef::Position(position) => {
                if *position == 0 || *position > self.modules.len() {
                    let mut message = format!(
                        "module {} is out of range (slip has {} modules)",
                        module_ref,
                        self.modules.len()
                    );
                    if !self.positions_named(&position.to_string()).is_empty() {
                        message.push_str(&format!(
                            "; use name:{position} for the module named {position}"
                        ));
                    }
                    anyhow::bail!(message);
                }
                Ok(position - 1)
            }
            ModuleRef::Id(id) => self
                .modules
                .iter()
                .position(|m| m.id == *id)
                .ok_or_else(|| anyhow::anyhow!("no module with id {id}")),
            ModuleRef::Name(name) => {
                let matches = self.positions_named(name);
                match matches.as_slice() {
                    [index] => Ok(*index),
                    [] => anyhow::bail!("no module named {module_ref}"),
                    _ => anyhow::bail!(
                        "{} modules are named {}; use the position or id instead",
                        matches.len(),
                        module_ref
                    ),
                }
            }
        }
    }

    pub fn positions_named(&self, name: &str) -> Vec<usize> {
        self.modules
            .iter()
            .enumerate()
            .filter(|(_, m)| m.name.trim().eq_ignore_ascii_case(name.trim()))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn module_mut(&mut self, module_ref: &ModuleRef) -> anyhow::Result<&mut Module> {
        let index = self.position_of(module_ref)?;
        Ok(&mut self.modules[index])
    }

    pub fn remove_module(&mut self, module_ref: &ModuleRef) -> anyhow::Result<Module> {
        let index = self.position_of(module_ref)?;
        Ok(self.modules.remove(index))
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.modules.len();
        self.modules.clear();
        removed
    }

    pub fn summary(&self, policy: AggregationPolicy) -> Vec<(&Module, Evaluation)> {
        self.modules
            .iter()
            .map(|module| (module, evaluate::evaluate_module(module, policy)))
            .collect()
    }
}

impl Module {
    pub fn rename(&mut self, name: &str) {
        self.name = name.trim().to_string();
    }

    pub fn set_target(&mut self, raw: &str) -> Option<f64> {
        self.target = parse_percent(raw);
        self.target
    }

    pub fn add_assessment(
        &mut self,
        name: Option<&str>,
        weight: Option<&str>,
        score: Option<&str>,
    ) -> usize {
        let position = self.assessments.len() + 1;
        let mut assessment = Assessment::numbered(position);
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            assessment.name = name.trim().to_string();
        }
        assessment.weight = weight.and_then(parse_percent);
        assessment.score = score.and_then(parse_percent);
        self.assessments.push(assessment);
        position
    }

    pub fn update_assessment(
        &mut self,
        position: usize,
        field: AssessmentField,
        raw: &str,
    ) -> anyhow::Result<()> {
        let count = self.assessments.len();
        let assessment = position
            .checked_sub(1)
            .and_then(|index| self.assessments.get_mut(index))
            .ok_or_else(|| {
                anyhow::anyhow!("assessment {position} is out of range (module has {count})")
            })?;

        match field {
            AssessmentField::Name => assessment.name = raw.trim().to_string(),
            AssessmentField::Weight => assessment.weight = parse_percent(raw),
            AssessmentField::Score => assessment.score = parse_percent(raw),
        }
        Ok(())
    }

    pub fn remove_assessment(&mut self, position: usize) -> anyhow::Result<Assessment> {
        let count = self.assessments.len();
        if position == 0 || position > count {
            anyhow::bail!("assessment {position} is out of range (module has {count})");
        }
        if count == 1 {
            anyhow::bail!("a module keeps at least one assessment");
        }
        Ok(self.assessments.remove(position - 1))
    }
}
