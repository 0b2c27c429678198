//! Value-state mapping for status and time-series widgets
//!
//! Turns raw telemetry (string, boolean or number) into a declared semantic
//! state: constant rules are looked up first, then numeric range rules are
//! scanned in declaration order. A value nothing matches is passed through
//! unchanged, which callers treat as "no semantic state".

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DashError, Result};

/// How a rule matches raw input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceType {
    Constant,
    Range,
}

/// One value → state declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMatchRule {
    /// Semantic state value plotted by the chart
    pub value: f64,
    #[serde(default)]
    pub label: String,
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_range_from: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_range_to: Option<f64>,
}

impl StateMatchRule {
    pub fn constant(value: f64, label: impl Into<String>, source: impl Into<Value>) -> Self {
        Self {
            value,
            label: label.into(),
            source_type: SourceType::Constant,
            source_value: Some(source.into()),
            source_range_from: None,
            source_range_to: None,
        }
    }

    pub fn range(value: f64, label: impl Into<String>, from: Option<f64>, to: Option<f64>) -> Self {
        Self {
            value,
            label: label.into(),
            source_type: SourceType::Range,
            source_value: None,
            source_range_from: from,
            source_range_to: to,
        }
    }

    /// Check the rule is complete (used when loading documents)
    pub fn validate(&self) -> Result<()> {
        match self.source_type {
            SourceType::Constant if self.source_value.is_none() => Err(DashError::InvalidRule {
                label: self.label.clone(),
                reason: "constant rule without sourceValue".to_string(),
            }),
            SourceType::Range => match (self.source_range_from, self.source_range_to) {
                (Some(from), Some(to)) if from > to => Err(DashError::InvalidRule {
                    label: self.label.clone(),
                    reason: format!("range lower bound {from} is above upper bound {to}"),
                }),
                _ => Ok(()),
            },
            SourceType::Constant => Ok(()),
        }
    }

    fn matches_number(&self, input: f64) -> bool {
        match (self.source_range_from, self.source_range_to) {
            // Point range: exact equality only
            (Some(from), Some(to)) if from == to => input == from,
            (from, to) => {
                from.map_or(true, |from| input >= from) && to.map_or(true, |to| input < to)
            }
        }
    }
}

/// Axis tick for one distinct state value
#[derive(Debug, Clone, PartialEq)]
pub struct StateTick {
    pub value: f64,
    pub label: String,
}

/// Normalized constant-table key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LookupKey {
    Null,
    Bool(bool),
    Number(u64),
    Text(String),
}

fn number_key(n: f64) -> u64 {
    if n == 0.0 {
        0.0f64.to_bits()
    } else if n.is_nan() {
        f64::NAN.to_bits()
    } else {
        n.to_bits()
    }
}

/// "true"/"false" strings become booleans; composite values never match
fn lookup_key(value: &Value) -> Option<LookupKey> {
    match value {
        Value::Null => Some(LookupKey::Null),
        Value::Bool(b) => Some(LookupKey::Bool(*b)),
        Value::Number(n) => n.as_f64().map(|n| LookupKey::Number(number_key(n))),
        Value::String(s) if s == "true" => Some(LookupKey::Bool(true)),
        Value::String(s) if s == "false" => Some(LookupKey::Bool(false)),
        Value::String(s) => Some(LookupKey::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Numbers and numeric strings (" 10 ", "2.5e3") count as numeric input
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Generic numeric formatting: fixed decimals (if given) plus a unit suffix
pub fn format_value(value: f64, decimals: Option<usize>, units: Option<&str>) -> String {
    let mut formatted = match decimals {
        Some(decimals) => format!("{value:.decimals$}"),
        None => value.to_string(),
    };
    if let Some(units) = units.filter(|u| !u.is_empty()) {
        formatted.push(' ');
        formatted.push_str(units);
    }
    formatted
}

/// Raw value → semantic state resolver
#[derive(Debug, Clone, Default)]
pub struct ValueStateMapper {
    constants: FxHashMap<LookupKey, f64>,
    ranges: Vec<StateMatchRule>,
    ticks: Vec<StateTick>,
}

impl ValueStateMapper {
    pub fn new(rules: &[StateMatchRule]) -> Self {
        let mut constants = FxHashMap::default();
        let mut ranges = Vec::new();
        let mut ticks: Vec<StateTick> = Vec::new();

        for rule in rules {
            match rule.source_type {
                SourceType::Constant => {
                    let key = rule.source_value.as_ref().and_then(lookup_key);
                    if let Some(key) = key {
                        // First declaration of a constant wins
                        constants.entry(key).or_insert(rule.value);
                    }
                }
                SourceType::Range => ranges.push(rule.clone()),
            }
            if !ticks.iter().any(|t| t.value == rule.value) {
                ticks.push(StateTick {
                    value: rule.value,
                    label: rule.label.clone(),
                });
            }
        }

        Self {
            constants,
            ranges,
            ticks,
        }
    }

    /// Matched state value, if any rule matches
    pub fn state(&self, raw: &Value) -> Option<f64> {
        if let Some(value) = lookup_key(raw).and_then(|key| self.constants.get(&key)) {
            return Some(*value);
        }
        if self.ranges.is_empty() {
            return None;
        }
        let input = numeric(raw)?;
        self.ranges
            .iter()
            .find(|rule| rule.matches_number(input))
            .map(|rule| rule.value)
    }

    /// Matched state value, or the raw input unchanged
    pub fn resolve(&self, raw: &Value) -> Value {
        match self.state(raw) {
            Some(value) => Value::from(value),
            None => raw.clone(),
        }
    }

    /// Distinct state values in order of first appearance
    pub fn ticks(&self) -> &[StateTick] {
        &self.ticks
    }

    /// Axis label for a state value ("" when unknown)
    pub fn tick_label(&self, value: f64) -> &str {
        self.label_for(value).unwrap_or("")
    }

    fn label_for(&self, value: f64) -> Option<&str> {
        self.ticks
            .iter()
            .find(|t| t.value == value)
            .map(|t| t.label.as_str())
            .filter(|label| !label.is_empty())
    }

    fn resolved_label(&self, raw: &Value) -> Option<&str> {
        numeric(&self.resolve(raw)).and_then(|value| self.label_for(value))
    }

    /// Tooltip text: the state label, else the formatted value
    pub fn tooltip(&self, raw: &Value, decimals: Option<usize>, units: Option<&str>) -> String {
        if let Some(label) = self.resolved_label(raw) {
            return label.to_string();
        }
        let resolved = self.resolve(raw);
        match numeric(&resolved) {
            Some(value) => format_value(value, decimals, units),
            None => match resolved {
                Value::String(s) => s,
                other => other.to_string(),
            },
        }
    }

    /// Rich-text data-point label, `None` when the state has no label
    pub fn chart_label(&self, raw: &Value) -> Option<String> {
        self.resolved_label(raw).map(|label| format!("{{state|{label}}}"))
    }
}
