//! Rule definition files (`.yml` rules used for relevance and calculations)
//!
//! A rules file is a stream of YAML documents, one rule each:
//!
//! ```yaml
//! name: step1_hiv_test
//! description: HIV test relevance
//! priority: 1
//! condition: "step1_hiv_status != 'positive'"
//! actions:
//!   - "isRelevant = true"
//! ---
//! name: danger_signs
//! compositeRuleType: UnitRuleGroup
//! composingRules:
//!   - { condition: "true", actions: ["a = 1"] }
//! ```

use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleDefinitionError {
    #[error("The rules file does not define any rule")]
    Empty,

    #[error("Invalid rule definition: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("Rule '{rule}' has no condition")]
    MissingCondition { rule: String },

    #[error("Rule '{rule}' has no actions")]
    MissingActions { rule: String },

    #[error("Composite rule '{rule}' has no composing rules")]
    MissingComposingRules { rule: String },

    #[error("Non-composite rules cannot have composing rules: '{rule}'")]
    UnexpectedComposingRules { rule: String },

    #[error("Rule '{rule}' has an unbalanced expression: {expression}")]
    UnbalancedExpression { rule: String, expression: String },
}

/// How a composite rule combines its members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositeRuleType {
    UnitRuleGroup,
    ConditionalRuleGroup,
    ActivationRuleGroup,
}

fn default_rule_name() -> String {
    "rule".to_string()
}

/// One rule document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    #[serde(default = "default_rule_name")]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: Option<i64>,

    #[serde(default, deserialize_with = "scalar_text")]
    pub condition: Option<String>,

    #[serde(default)]
    pub actions: Vec<String>,

    #[serde(default)]
    pub composite_rule_type: Option<CompositeRuleType>,

    #[serde(default)]
    pub composing_rules: Vec<RuleDefinition>,
}

// `condition: true` is as valid as `condition: "true"`
fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "condition must be a scalar, found {:?}",
            other
        ))),
    }
}

impl RuleDefinition {
    pub fn is_composite(&self) -> bool {
        self.composite_rule_type.is_some()
    }

    fn check(&self) -> Result<(), RuleDefinitionError> {
        if self.is_composite() {
            if self.composing_rules.is_empty() {
                return Err(RuleDefinitionError::MissingComposingRules {
                    rule: self.name.clone(),
                });
            }
            return self.composing_rules.iter().try_for_each(RuleDefinition::check);
        }
        if !self.composing_rules.is_empty() {
            return Err(RuleDefinitionError::UnexpectedComposingRules {
                rule: self.name.clone(),
            });
        }

        let condition = self
            .condition
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| RuleDefinitionError::MissingCondition {
                rule: self.name.clone(),
            })?;
        if self.actions.is_empty() {
            return Err(RuleDefinitionError::MissingActions {
                rule: self.name.clone(),
            });
        }

        for expression in std::iter::once(condition).chain(self.actions.iter().map(String::as_str)) {
            if !is_balanced(expression) {
                return Err(RuleDefinitionError::UnbalancedExpression {
                    rule: self.name.clone(),
                    expression: expression.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Parse and check every rule in a rules file
pub fn parse_rules(content: &str) -> Result<Vec<RuleDefinition>, RuleDefinitionError> {
    let mut rules = Vec::new();
    for document in serde_yaml_ng::Deserializer::from_str(content) {
        let value = Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        let rule: RuleDefinition = serde_yaml_ng::from_value(value)?;
        rule.check()?;
        rules.push(rule);
    }

    if rules.is_empty() {
        return Err(RuleDefinitionError::Empty);
    }
    Ok(rules)
}

/// Brackets nest correctly and every string literal is closed
fn is_balanced(expression: &str) -> bool {
    let mut open = Vec::new();
    let mut quote: Option<char> = None;
    let mut chars = expression.chars();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            match c {
                '\\' => {
                    chars.next();
                }
                c if c == q => quote = None,
                _ => {}
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => open.push(c),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if open.pop() != Some(expected) {
                    return false;
                }
            }
            _ => {}
        }
    }

    quote.is_none() && open.is_empty()
}
