use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use futures::future::BoxFuture;
use rust_decimal::Decimal;

use super::engine::ConfigError;
use super::state::{FieldKey, FieldLabels, FieldValues};
use super::value::FieldValue;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldType {
    Text,
    Integer,
    Decimal,
    Bool,
}

impl FieldType {
    fn is_numeric(self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Decimal)
    }
}

pub type RuleFuture<'a> = BoxFuture<'a, Result<(), String>>;

pub trait AsyncRule: Send + Sync {
    fn check<'a>(&'a self, value: &'a str, values: &'a FieldValues) -> RuleFuture<'a>;
}

impl<F> AsyncRule for F
where
    F: for<'a> Fn(&'a str, &'a FieldValues) -> RuleFuture<'a> + Send + Sync,
{
    fn check<'a>(&'a self, value: &'a str, values: &'a FieldValues) -> RuleFuture<'a> {
        (self)(value, values)
    }
}

#[derive(Clone)]
pub enum Rule {
    Required,
    Email,
    MinLength(usize),
    MaxLength(usize),
    Min(Decimal),
    Max(Decimal),
    OneOf(Vec<String>),
    Custom(Arc<dyn AsyncRule>),
}

impl Rule {
    fn name(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::Email => "email",
            Rule::MinLength(_) => "min_length",
            Rule::MaxLength(_) => "max_length",
            Rule::Min(_) => "min",
            Rule::Max(_) => "max",
            Rule::OneOf(_) => "one_of",
            Rule::Custom(_) => "custom",
        }
    }
}

impl Debug for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::Required => f.write_str("Required"),
            Rule::Email => f.write_str("Email"),
            Rule::MinLength(len) => f.debug_tuple("MinLength").field(len).finish(),
            Rule::MaxLength(len) => f.debug_tuple("MaxLength").field(len).finish(),
            Rule::Min(bound) => f.debug_tuple("Min").field(bound).finish(),
            Rule::Max(bound) => f.debug_tuple("Max").field(bound).finish(),
            Rule::OneOf(values) => f.debug_tuple("OneOf").field(values).finish(),
            Rule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldSchema {
    name: String,
    label: Option<String>,
    field_type: FieldType,
    rules: Vec<Rule>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            label: None,
            field_type,
            rules: Vec::new(),
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn decimal(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Decimal)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn label(mut self, value: impl Into<String>) -> Self {
        self.label = Some(value.into());
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn required(self) -> Self {
        self.rule(Rule::Required)
    }

    pub fn email(self) -> Self {
        self.rule(Rule::Email)
    }

    pub fn min_length(self, value: usize) -> Self {
        self.rule(Rule::MinLength(value))
    }

    pub fn max_length(self, value: usize) -> Self {
        self.rule(Rule::MaxLength(value))
    }

    pub fn min(self, value: impl Into<Decimal>) -> Self {
        self.rule(Rule::Min(value.into()))
    }

    pub fn max(self, value: impl Into<Decimal>) -> Self {
        self.rule(Rule::Max(value.into()))
    }

    pub fn one_of<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule(Rule::OneOf(values.into_iter().map(Into::into).collect()))
    }

    pub fn custom(self, rule: impl AsyncRule + 'static) -> Self {
        self.rule(Rule::Custom(Arc::new(rule)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_required(&self) -> bool {
        self.rules.iter().any(|rule| matches!(rule, Rule::Required))
    }

    pub fn cast(&self, raw: &str) -> Result<FieldValue, String> {
        let trimmed = raw.trim();
        match self.field_type {
            FieldType::Text => Ok(FieldValue::Text(trimmed.to_string())),
            _ if trimmed.is_empty() => Ok(FieldValue::Empty),
            FieldType::Integer => trimmed
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|error| error.to_string()),
            FieldType::Decimal => Decimal::from_str(trimmed)
                .map(FieldValue::Decimal)
                .map_err(|error| error.to_string()),
            FieldType::Bool => parse_bool(trimmed)
                .map(FieldValue::Bool)
                .ok_or_else(|| format!("`{trimmed}` is not a boolean")),
        }
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyFieldName);
        }

        let mut min_length = None;
        let mut max_length = None;
        let mut min = None;
        let mut max = None;
        for rule in &self.rules {
            let applies = match rule {
                Rule::Email | Rule::MinLength(_) | Rule::MaxLength(_) => {
                    self.field_type == FieldType::Text
                }
                Rule::Min(_) | Rule::Max(_) => self.field_type.is_numeric(),
                Rule::Required | Rule::OneOf(_) | Rule::Custom(_) => true,
            };
            if !applies {
                return Err(ConfigError::RuleTypeMismatch {
                    field: self.name.clone(),
                    rule: rule.name(),
                    field_type: self.field_type,
                });
            }
            match rule {
                Rule::MinLength(value) => min_length = Some(*value),
                Rule::MaxLength(value) => max_length = Some(*value),
                Rule::Min(value) => min = Some(*value),
                Rule::Max(value) => max = Some(*value),
                Rule::OneOf(values) if values.is_empty() => {
                    return Err(ConfigError::EmptyOneOf(self.name.clone()));
                }
                _ => {}
            }
        }

        if let (Some(low), Some(high)) = (min_length, max_length) {
            if low > high {
                return Err(ConfigError::InvalidRange {
                    field: self.name.clone(),
                    detail: format!("min length {low} exceeds max length {high}"),
                });
            }
        }
        if let (Some(low), Some(high)) = (min, max) {
            if low > high {
                return Err(ConfigError::InvalidRange {
                    field: self.name.clone(),
                    detail: format!("min {low} exceeds max {high}"),
                });
            }
        }
        Ok(())
    }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldDescription {
    pub label: String,
    pub field_type: FieldType,
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
    pub one_of: Option<Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct FormSchema {
    description: String,
    fields: Arc<Vec<FieldSchema>>,
}

pub struct FormSchemaBuilder {
    description: String,
    fields: Vec<FieldSchema>,
}

impl FormSchemaBuilder {
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Result<FormSchema, ConfigError> {
        if self.fields.is_empty() {
            return Err(ConfigError::EmptySchema);
        }
        let mut seen = BTreeSet::new();
        for field in &self.fields {
            field.check()?;
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigError::DuplicateField(field.name.clone()));
            }
        }
        Ok(FormSchema {
            description: self.description,
            fields: Arc::new(self.fields),
        })
    }
}

impl FormSchema {
    pub fn builder(description: impl Into<String>) -> FormSchemaBuilder {
        FormSchemaBuilder {
            description: description.into(),
            fields: Vec::new(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(FieldSchema::name).collect()
    }

    pub fn field_name_set(&self) -> BTreeSet<&str> {
        self.fields.iter().map(FieldSchema::name).collect()
    }

    pub fn labels(&self) -> FieldLabels {
        let mut labels = FieldLabels::new();
        labels.insert(FieldKey::Form, self.description.clone());
        for field in self.fields.iter() {
            labels.insert(
                FieldKey::named(field.name()),
                field.display_label().to_string(),
            );
        }
        labels
    }

    pub fn describe(&self) -> BTreeMap<String, FieldDescription> {
        self.fields
            .iter()
            .map(|field| {
                let mut description = FieldDescription {
                    label: field.display_label().to_string(),
                    field_type: field.field_type,
                    required: field.is_required(),
                    min_length: None,
                    max_length: None,
                    min: None,
                    max: None,
                    one_of: None,
                };
                for rule in &field.rules {
                    match rule {
                        Rule::MinLength(value) => description.min_length = Some(*value),
                        Rule::MaxLength(value) => description.max_length = Some(*value),
                        Rule::Min(value) => description.min = Some(*value),
                        Rule::Max(value) => description.max = Some(*value),
                        Rule::OneOf(values) => description.one_of = Some(values.clone()),
                        Rule::Required | Rule::Email | Rule::Custom(_) => {}
                    }
                }
                (field.name.clone(), description)
            })
            .collect()
    }

    pub fn empty_values(&self) -> FieldValues {
        self.fields
            .iter()
            .map(|field| (field.name.clone(), String::new()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_fall_back_to_field_names() {
        let schema = FormSchema::builder("Sign in")
            .field(FieldSchema::text("email").required())
            .field(FieldSchema::text("pass").label("Password"))
            .build()
            .expect("schema builds");

        let labels = schema.labels();
        assert_eq!(labels.get(&FieldKey::Form).map(String::as_str), Some("Sign in"));
        assert_eq!(labels.get(&FieldKey::named("email")).map(String::as_str), Some("email"));
        assert_eq!(labels.get(&FieldKey::named("pass")).map(String::as_str), Some("Password"));
        assert_eq!(schema.field_names(), vec!["email", "pass"]);
    }

    #[test]
    fn malformed_schemas_fail_fast() {
        assert_eq!(
            FormSchema::builder("empty").build().err(),
            Some(ConfigError::EmptySchema)
        );
        assert_eq!(
            FormSchema::builder("dup")
                .field(FieldSchema::text("email"))
                .field(FieldSchema::text("email"))
                .build()
                .err(),
            Some(ConfigError::DuplicateField("email".into()))
        );
        assert!(matches!(
            FormSchema::builder("range")
                .field(FieldSchema::integer("radius").min(10).max(1))
                .build(),
            Err(ConfigError::InvalidRange { .. })
        ));
        assert!(matches!(
            FormSchema::builder("mismatch")
                .field(FieldSchema::boolean("open_now").email())
                .build(),
            Err(ConfigError::RuleTypeMismatch { rule: "email", .. })
        ));
    }

    #[test]
    fn describe_reports_constraints() {
        let schema = FormSchema::builder("Discovery")
            .field(FieldSchema::integer("radius").label("Radius").required().min(1).max(50))
            .build()
            .expect("schema builds");
        let description = schema.describe();
        let radius = description.get("radius").expect("radius described");
        assert!(radius.required);
        assert_eq!(radius.min, Some(Decimal::from(1)));
        assert_eq!(radius.max, Some(Decimal::from(50)));
        assert_eq!(radius.label, "Radius");
    }

    #[test]
    fn cast_normalizes_by_field_type() {
        let radius = FieldSchema::integer("radius");
        assert_eq!(radius.cast(" 12 "), Ok(FieldValue::Integer(12)));
        assert_eq!(radius.cast(""), Ok(FieldValue::Empty));
        assert!(radius.cast("twelve").is_err());
        assert_eq!(FieldSchema::boolean("open").cast("Yes"), Ok(FieldValue::Bool(true)));
        assert_eq!(
            FieldSchema::text("name").cast(" Taco "),
            Ok(FieldValue::Text("Taco".into()))
        );
    }
}
