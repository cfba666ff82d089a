//! Policy engine
//!
//! A policy is an option -> value map consulted during lowering; rules
//! pick which policy applies to an instruction. Resolution takes the
//! highest-priority matching rule, breaking priority ties in favour of
//! the rule with more conditions. A tie on both is an error: two rules
//! that cannot be told apart must not silently shadow each other.

use std::str::FromStr;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::trace;

use decant_model::Volume;

use crate::error::{Error, Result};
use crate::ir::Instruction;
use crate::param::ParamValue;

/// A single policy option value.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Volume(Volume),
}

impl PolicyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PolicyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PolicyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view: integers widen, volumes read as microlitres.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PolicyValue::Float(f) => Some(*f),
            PolicyValue::Int(i) => Some(*i as f64),
            PolicyValue::Volume(v) => Some(v.as_microlitres()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PolicyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Volume view: bare numbers are taken as microlitres.
    pub fn as_volume(&self) -> Option<Volume> {
        match self {
            PolicyValue::Volume(v) => Some(*v),
            PolicyValue::Float(f) => Some(Volume::microlitres(*f)),
            PolicyValue::Int(i) => Some(Volume::microlitres(*i as f64)),
            _ => None,
        }
    }
}

/// Raw JSON shape of a policy value; strings carrying a volume suffix
/// (`"1.0ul"`) are promoted to `PolicyValue::Volume` on load.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<RawValue> for PolicyValue {
    fn from(raw: RawValue) -> PolicyValue {
        match raw {
            RawValue::Bool(b) => PolicyValue::Bool(b),
            RawValue::Int(i) => PolicyValue::Int(i),
            RawValue::Float(f) => PolicyValue::Float(f),
            RawValue::Str(s) => match Volume::from_str(&s) {
                Ok(v) => PolicyValue::Volume(v),
                Err(_) => PolicyValue::Str(s),
            },
        }
    }
}

/// Option name -> value map. Merging overwrites from the right.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Policy {
    options: IndexMap<String, PolicyValue>,
}

impl Policy {
    pub fn new() -> Self {
        Policy::default()
    }

    pub fn insert(&mut self, name: &str, value: PolicyValue) {
        self.options.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&PolicyValue> {
        self.options.get(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(PolicyValue::as_bool)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PolicyValue::as_int)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(PolicyValue::as_f64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PolicyValue::as_str)
    }

    pub fn get_volume(&self, name: &str) -> Option<Volume> {
        self.get(name).and_then(PolicyValue::as_volume)
    }

    /// `self ⊕ other`: every key in `other` overwrites.
    pub fn merge(mut self, other: &Policy) -> Policy {
        for (k, v) in &other.options {
            self.options.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// How a rule combines its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Combinator {
    #[default]
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

/// What a condition accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// Equality against a category string. Sequence parameters match
    /// iff every element equals.
    Category(String),
    /// Closed numeric interval. Sequence parameters match iff every
    /// element is in range; volume parameters read as microlitres.
    Numeric { lower: f64, upper: f64 },
}

impl Matcher {
    fn matches(&self, value: &ParamValue) -> bool {
        match self {
            Matcher::Category(cat) => match value {
                ParamValue::Str(s) => s == cat,
                ParamValue::StrVec(v) => v.iter().all(|s| s == cat),
                ParamValue::Kind(k) => k.code() == cat,
                _ => false,
            },
            Matcher::Numeric { lower, upper } => {
                let in_range = |x: f64| x >= *lower && x <= *upper;
                match value {
                    ParamValue::Float(f) => in_range(*f),
                    ParamValue::Int(i) => in_range(*i as f64),
                    ParamValue::Volume(v) => in_range(v.as_microlitres()),
                    ParamValue::FloatVec(v) => v.iter().all(|f| in_range(*f)),
                    ParamValue::IntVec(v) => v.iter().all(|i| in_range(*i as f64)),
                    ParamValue::VolumeVec(v) => v.iter().all(|x| in_range(x.as_microlitres())),
                    _ => false,
                }
            }
        }
    }
}

/// One test against an instruction parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub variable: String,
    pub matcher: Matcher,
}

impl Condition {
    pub fn category(variable: &str, category: &str) -> Result<Condition> {
        if category.is_empty() {
            return Err(Error::InvalidCondition {
                variable: variable.to_string(),
                reason: "empty category".to_string(),
            });
        }
        Ok(Condition {
            variable: variable.to_string(),
            matcher: Matcher::Category(category.to_string()),
        })
    }

    pub fn numeric(variable: &str, lower: f64, upper: f64) -> Result<Condition> {
        if upper < lower {
            return Err(Error::InvalidCondition {
                variable: variable.to_string(),
                reason: format!("upper bound {upper} below lower bound {lower}"),
            });
        }
        Ok(Condition {
            variable: variable.to_string(),
            matcher: Matcher::Numeric { lower, upper },
        })
    }

    pub fn check(&self, instruction: &Instruction) -> bool {
        self.matcher.matches(&instruction.parameter(&self.variable))
    }
}

/// Condition set with a priority and a target policy name.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub priority: i32,
    pub combinator: Combinator,
    pub conditions: Vec<Condition>,
}

impl Rule {
    pub fn matches(&self, instruction: &Instruction) -> bool {
        match self.combinator {
            Combinator::And => self.conditions.iter().all(|c| c.check(instruction)),
            Combinator::Or => {
                self.conditions.is_empty() || self.conditions.iter().any(|c| c.check(instruction))
            }
        }
    }
}

/// Rules and their policies, plus the mandatory `default` policy.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub policies: IndexMap<String, Policy>,
    pub rules: IndexMap<String, Rule>,
}

/// Serialized rule-set document.
#[derive(Debug, Deserialize)]
struct RawRuleSet {
    policies: IndexMap<String, IndexMap<String, RawValue>>,
    #[serde(default)]
    rules: IndexMap<String, RawRule>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    priority: i32,
    #[serde(rename = "type", default)]
    combinator: Combinator,
    #[serde(default)]
    conditions: Vec<RawCondition>,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    variable: String,
    kind: String,
    #[serde(default)]
    lower: Option<f64>,
    #[serde(default)]
    upper: Option<f64>,
    #[serde(default)]
    category: Option<String>,
}

impl RuleSet {
    /// An empty rule set with just a default policy.
    pub fn with_default(default: Policy) -> Self {
        let mut policies = IndexMap::new();
        policies.insert("default".to_string(), default);
        RuleSet {
            policies,
            rules: IndexMap::new(),
        }
    }

    /// Register a rule together with its consequent policy.
    pub fn add_rule(&mut self, rule: Rule, policy: Policy) {
        self.policies.insert(rule.name.clone(), policy);
        self.rules.insert(rule.name.clone(), rule);
    }

    /// Load and validate the JSON policy document.
    pub fn from_json(text: &str) -> Result<RuleSet> {
        let raw: RawRuleSet =
            serde_json::from_str(text).map_err(|e| Error::PolicyParse(e.to_string()))?;

        let mut set = RuleSet::default();
        for (name, options) in raw.policies {
            let mut policy = Policy::new();
            for (option, value) in options {
                policy.insert(&option, value.into());
            }
            set.policies.insert(name, policy);
        }

        for (name, raw_rule) in raw.rules {
            let mut conditions = Vec::with_capacity(raw_rule.conditions.len());
            for c in raw_rule.conditions {
                let condition = match c.kind.as_str() {
                    "num" => Condition::numeric(
                        &c.variable,
                        c.lower.unwrap_or(f64::NEG_INFINITY),
                        c.upper.unwrap_or(f64::INFINITY),
                    )?,
                    "cat" => Condition::category(&c.variable, c.category.as_deref().unwrap_or(""))?,
                    other => {
                        return Err(Error::InvalidCondition {
                            variable: c.variable.clone(),
                            reason: format!("unknown condition kind {other:?}"),
                        })
                    }
                };
                conditions.push(condition);
            }
            set.rules.insert(
                name.clone(),
                Rule {
                    name,
                    priority: raw_rule.priority,
                    combinator: raw_rule.combinator,
                    conditions,
                },
            );
        }

        set.validate()?;
        Ok(set)
    }

    fn validate(&self) -> Result<()> {
        if !self.policies.contains_key("default") {
            return Err(Error::PolicyMissingDefault);
        }
        for name in self.rules.keys() {
            if !self.policies.contains_key(name) {
                return Err(Error::MissingRulePolicy { rule: name.clone() });
            }
        }
        Ok(())
    }

    /// Resolve the effective policy for an instruction.
    ///
    /// Returns `default ⊕ policy(best rule)` where the best rule is the
    /// unique (priority, condition-count) maximum among matching rules,
    /// or `default` alone when nothing matches.
    pub fn policy_for(&self, instruction: &Instruction) -> Result<Policy> {
        let default = self
            .policies
            .get("default")
            .ok_or(Error::PolicyMissingDefault)?;

        let mut best: Option<&Rule> = None;
        let mut contender: Option<&Rule> = None;
        for rule in self.rules.values() {
            if !rule.matches(instruction) {
                continue;
            }
            match best {
                None => best = Some(rule),
                Some(current) => {
                    let cur_key = (current.priority, current.conditions.len());
                    let new_key = (rule.priority, rule.conditions.len());
                    if new_key > cur_key {
                        best = Some(rule);
                        contender = None;
                    } else if new_key == cur_key {
                        contender = Some(rule);
                    }
                }
            }
        }

        match (best, contender) {
            (Some(a), Some(b)) => Err(Error::PolicyAmbiguous {
                first: a.name.clone(),
                second: b.name.clone(),
            }),
            (Some(rule), None) => {
                trace!(rule = %rule.name, "policy rule matched");
                let policy = self
                    .policies
                    .get(&rule.name)
                    .ok_or_else(|| Error::MissingRulePolicy {
                        rule: rule.name.clone(),
                    })?;
                Ok(default.clone().merge(policy))
            }
            (None, _) => Ok(default.clone()),
        }
    }
}
