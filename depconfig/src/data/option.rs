use serde_json::Value as Json;

use crate::{
    error::{DiagnosticKind, EngineError, IngestError},
    expr::Expr,
    value::Value,
};

/// Handle of a node in a [`Forest`](super::Forest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Arena index, equal to the node's position in declaration pre-order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Declared type of an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionType {
    Bool,
    Int,
    String,
    /// Selection among ordered labels.
    Choice(Vec<String>),
    /// Container for child options. Groups hold no value.
    Group,
}

/// A value that does not fit an option's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Mismatch {
    pub expected: String,
    pub actual: String,
}

impl Mismatch {
    fn new(expected: impl Into<String>, actual: impl ToString) -> Self {
        Self {
            expected: expected.into(),
            actual: actual.to_string(),
        }
    }

    pub(crate) fn into_ingest(self, path: &str) -> IngestError {
        IngestError::TypeMismatch {
            path: path.to_string(),
            expected: self.expected,
            actual: self.actual,
        }
    }

    pub(crate) fn into_engine(self, path: &str) -> EngineError {
        EngineError::TypeMismatch {
            path: path.to_string(),
            expected: self.expected,
            actual: self.actual,
        }
    }

    pub(crate) fn into_diagnostic(self) -> DiagnosticKind {
        DiagnosticKind::InvalidValue {
            expected: self.expected,
            actual: self.actual,
        }
    }
}

/// Words accepted as booleans, compared case-insensitively.
fn bool_from_word(word: &str) -> Option<bool> {
    match word.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "y" | "1" => Some(true),
        "false" | "no" | "off" | "n" | "0" => Some(false),
        _ => None,
    }
}

impl OptionType {
    /// Schema spelling of the type.
    pub fn name(&self) -> &'static str {
        match self {
            OptionType::Bool => "bool",
            OptionType::Int => "int",
            OptionType::String => "string",
            OptionType::Choice(_) => "multiple_choice",
            OptionType::Group => "group",
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, OptionType::Group)
    }

    /// Choice labels, empty for other types.
    pub fn choices(&self) -> &[String] {
        match self {
            OptionType::Choice(labels) => labels,
            _ => &[],
        }
    }

    fn choice_by_label(&self, label: &str) -> Option<Value> {
        let labels = self.choices();
        labels
            .iter()
            .position(|l| l == label)
            .map(|index| Value::Choice {
                index,
                label: labels[index].clone(),
            })
    }

    fn choice_by_index(&self, index: u64) -> Option<Value> {
        let index = usize::try_from(index).ok()?;
        self.choices().get(index).map(|label| Value::Choice {
            index,
            label: label.clone(),
        })
    }

    fn expected_choice(&self) -> String {
        format!("one of: {:?}", self.choices())
    }

    /// Resolve a declared default. Groups have none.
    ///
    /// A missing default becomes `false`, `0`, `""` or the first choice.
    pub(crate) fn default_from_json(&self, raw: Option<&Json>) -> Result<Option<Value>, Mismatch> {
        let raw = raw.filter(|v| !v.is_null());
        let value = match (self, raw) {
            (OptionType::Group, _) => return Ok(None),
            (OptionType::Bool, None) => Value::Bool(false),
            (OptionType::Int, None) => Value::Int(0),
            (OptionType::String, None) => Value::Str(String::new()),
            (OptionType::Choice(labels), None) => {
                let label = labels
                    .first()
                    .ok_or_else(|| Mismatch::new("at least one choice", "none"))?;
                Value::Choice {
                    index: 0,
                    label: label.clone(),
                }
            }
            (OptionType::Choice(_), Some(Json::String(label))) => self
                .choice_by_label(label)
                .ok_or_else(|| Mismatch::new(self.expected_choice(), label))?,
            (OptionType::Choice(_), Some(other)) => {
                return Err(Mismatch::new(self.expected_choice(), other));
            }
            (_, Some(raw)) => self.value_from_json(raw)?,
        };
        Ok(Some(value))
    }

    /// Validate a value read from a stored configuration.
    ///
    /// Choices accept a label or a numeric index.
    pub(crate) fn value_from_json(&self, raw: &Json) -> Result<Value, Mismatch> {
        match self {
            OptionType::Bool => match raw {
                Json::Bool(b) => Ok(Value::Bool(*b)),
                Json::Number(n) if n.as_i64().is_some() => Ok(Value::Bool(n.as_i64() != Some(0))),
                Json::String(s) => bool_from_word(s)
                    .map(Value::Bool)
                    .ok_or_else(|| Mismatch::new("boolean", raw)),
                _ => Err(Mismatch::new("boolean", raw)),
            },
            OptionType::Int => raw
                .as_i64()
                .map(Value::Int)
                .ok_or_else(|| Mismatch::new("integer", raw)),
            OptionType::String => raw
                .as_str()
                .map(|s| Value::Str(s.to_string()))
                .ok_or_else(|| Mismatch::new("string", raw)),
            OptionType::Choice(_) => match raw {
                Json::String(label) => self
                    .choice_by_label(label)
                    .ok_or_else(|| Mismatch::new(self.expected_choice(), raw)),
                Json::Number(n) => n
                    .as_u64()
                    .and_then(|idx| self.choice_by_index(idx))
                    .ok_or_else(|| {
                        Mismatch::new(
                            format!("index 0-{}", self.choices().len().saturating_sub(1)),
                            n,
                        )
                    }),
                _ => Err(Mismatch::new("string or number", raw)),
            },
            OptionType::Group => Err(Mismatch::new("no value (group)", raw)),
        }
    }

    /// Validate a value passed through the engine API.
    pub(crate) fn coerce(&self, value: Value) -> Result<Value, Mismatch> {
        let actual = format!("{} {}", value.type_name(), value);
        let coerced = match (self, value) {
            (OptionType::Bool, Value::Bool(b)) => Some(Value::Bool(b)),
            (OptionType::Bool, Value::Int(i)) => Some(Value::Bool(i != 0)),
            (OptionType::Bool, Value::Str(s)) => bool_from_word(&s).map(Value::Bool),
            (OptionType::Int, Value::Int(i)) => Some(Value::Int(i)),
            (OptionType::String, Value::Str(s)) => Some(Value::Str(s)),
            (OptionType::Choice(_), Value::Str(label) | Value::Choice { label, .. }) => {
                self.choice_by_label(&label)
            }
            (OptionType::Choice(_), Value::Int(i)) => u64::try_from(i)
                .ok()
                .and_then(|idx| self.choice_by_index(idx)),
            _ => None,
        };
        coerced.ok_or_else(|| {
            let expected = match self {
                OptionType::Choice(_) => self.expected_choice(),
                OptionType::Group => "no value (group)".to_string(),
                other => other.name().to_string(),
            };
            Mismatch::new(expected, actual)
        })
    }

    /// Parse user-typed text according to the declared type.
    pub(crate) fn parse_text(&self, text: &str) -> Result<Value, Mismatch> {
        match self {
            OptionType::Bool => bool_from_word(text)
                .map(Value::Bool)
                .ok_or_else(|| Mismatch::new("boolean", text)),
            OptionType::Int => text
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| Mismatch::new("integer", text)),
            OptionType::String => Ok(Value::Str(text.to_string())),
            OptionType::Choice(_) => self.coerce(Value::Str(text.trim().to_string())),
            OptionType::Group => Err(Mismatch::new("no value (group)", text)),
        }
    }
}

/// One node of the option forest: an option or a group.
#[derive(Debug, Clone)]
pub struct OptionNode {
    /// Globally unique identifier.
    pub name: String,
    pub option_type: OptionType,
    /// Resolved default; `None` for groups.
    pub default: Option<Value>,
    pub description: Option<String>,
    /// Opaque metadata passed through to consumers.
    pub data: Option<Json>,
    /// Value is supplied by the host application and cannot be edited.
    pub external: bool,
    /// Compiled dependency; `None` means always satisfied.
    pub dependency: Option<Expr>,
    pub parent: Option<NodeId>,
    /// Index among siblings.
    pub position: usize,
    pub children: Vec<NodeId>,
    /// Key of the schema document that declared the node.
    pub document: String,
}

impl OptionNode {
    pub fn is_group(&self) -> bool {
        self.option_type.is_group()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn levels() -> OptionType {
        OptionType::Choice(vec!["INFO".into(), "DEBUG".into()])
    }

    #[test]
    fn test_bool_defaults_normalize() {
        let falsy = [json!(0), json!(false), json!("false"), json!("OFF"), json!("n")];
        for raw in falsy {
            assert_eq!(
                OptionType::Bool.default_from_json(Some(&raw)).unwrap(),
                Some(Value::Bool(false)),
                "{raw}"
            );
        }
        assert_eq!(
            OptionType::Bool.default_from_json(Some(&json!(1))).unwrap(),
            Some(Value::Bool(true))
        );
        assert_eq!(
            OptionType::Bool.default_from_json(None).unwrap(),
            Some(Value::Bool(false))
        );
        assert!(OptionType::Bool.default_from_json(Some(&json!("maybe"))).is_err());
    }

    #[test]
    fn test_strict_defaults() {
        assert!(OptionType::Int.default_from_json(Some(&json!("3"))).is_err());
        assert!(OptionType::Int.default_from_json(Some(&json!(1.5))).is_err());
        assert!(OptionType::String.default_from_json(Some(&json!(3))).is_err());
        assert_eq!(
            OptionType::String.default_from_json(None).unwrap(),
            Some(Value::Str(String::new()))
        );
        assert_eq!(OptionType::Group.default_from_json(Some(&json!(1))).unwrap(), None);
    }

    #[test]
    fn test_choice_default_by_label_only() {
        assert_eq!(
            levels().default_from_json(Some(&json!("DEBUG"))).unwrap(),
            Some(Value::Choice {
                index: 1,
                label: "DEBUG".into()
            })
        );
        assert!(levels().default_from_json(Some(&json!(1))).is_err());
        assert!(levels().default_from_json(Some(&json!("TRACE"))).is_err());
        assert_eq!(
            levels().default_from_json(None).unwrap(),
            Some(Value::Choice {
                index: 0,
                label: "INFO".into()
            })
        );
    }

    #[test]
    fn test_stored_choice_accepts_index() {
        assert_eq!(
            levels().value_from_json(&json!(1)).unwrap(),
            Value::Choice {
                index: 1,
                label: "DEBUG".into()
            }
        );
        let err = levels().value_from_json(&json!(5)).unwrap_err();
        assert_eq!(err.expected, "index 0-1");
    }

    #[test]
    fn test_coerce_api_values() {
        assert_eq!(OptionType::Bool.coerce(Value::Int(0)).unwrap(), Value::Bool(false));
        assert!(OptionType::Int.coerce(Value::Str("1".into())).is_err());
        assert!(OptionType::Int.coerce(Value::Float(1.0)).is_err());
        assert_eq!(
            levels().coerce(Value::Int(1)).unwrap(),
            levels().coerce(Value::from("DEBUG")).unwrap()
        );
        assert!(levels().coerce(Value::Int(-1)).is_err());
        assert!(OptionType::Group.coerce(Value::Bool(true)).is_err());
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(OptionType::Int.parse_text(" 42 ").unwrap(), Value::Int(42));
        assert_eq!(OptionType::String.parse_text("42").unwrap(), Value::from("42"));
        assert_eq!(OptionType::Bool.parse_text("yes").unwrap(), Value::Bool(true));
        assert!(levels().parse_text("TRACE").is_err());
    }
}
