use std::str::FromStr;

use futures::future::join_all;
use rust_decimal::Decimal;

use super::engine::ConfigError;
use super::schema::{FieldSchema, FieldType, FormSchema, Rule, parse_bool};
use super::state::{FieldKey, FieldMessages, FieldValues};
use super::value::CastValues;
use crate::i18n::I18nManager;

#[derive(Clone)]
pub struct Validator {
    schema: FormSchema,
    i18n: I18nManager,
}

impl Validator {
    pub fn new(schema: FormSchema, i18n: I18nManager) -> Self {
        Self { schema, i18n }
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn i18n(&self) -> &I18nManager {
        &self.i18n
    }

    pub async fn validate(&self, values: &FieldValues) -> FieldMessages {
        let checks = self.schema.fields().iter().map(|field| async move {
            self.validate_field(field, values)
                .await
                .map(|message| (FieldKey::named(field.name()), message))
        });
        join_all(checks).await.into_iter().flatten().collect()
    }

    pub async fn validate_field(&self, field: &FieldSchema, values: &FieldValues) -> Option<String> {
        let trimmed = values
            .get(field.name())
            .map(String::as_str)
            .unwrap_or("")
            .trim();
        let label = field.display_label();

        if trimmed.is_empty() {
            return field
                .is_required()
                .then(|| self.message("validation.required", label, &[]));
        }

        let number = match field.field_type() {
            FieldType::Text => None,
            FieldType::Integer => match trimmed.parse::<i64>() {
                Ok(value) => Some(Decimal::from(value)),
                Err(_) => return Some(self.message("validation.integer", label, &[])),
            },
            FieldType::Decimal => match Decimal::from_str(trimmed) {
                Ok(value) => Some(value),
                Err(_) => return Some(self.message("validation.number", label, &[])),
            },
            FieldType::Bool => {
                if parse_bool(trimmed).is_none() {
                    return Some(self.message("validation.bool", label, &[]));
                }
                None
            }
        };

        for rule in field.rules() {
            let failure = match rule {
                Rule::Required => None,
                Rule::Email => (!looks_like_email(trimmed))
                    .then(|| self.message("validation.email", label, &[])),
                Rule::MinLength(min) => (trimmed.chars().count() < *min).then(|| {
                    self.message("validation.min_length", label, &[("min", &min.to_string())])
                }),
                Rule::MaxLength(max) => (trimmed.chars().count() > *max).then(|| {
                    self.message("validation.max_length", label, &[("max", &max.to_string())])
                }),
                Rule::Min(min) => number
                    .filter(|value| value < min)
                    .map(|_| self.message("validation.min", label, &[("min", &min.to_string())])),
                Rule::Max(max) => number
                    .filter(|value| value > max)
                    .map(|_| self.message("validation.max", label, &[("max", &max.to_string())])),
                Rule::OneOf(allowed) => (!allowed.iter().any(|candidate| candidate == trimmed))
                    .then(|| {
                        self.message(
                            "validation.one_of",
                            label,
                            &[("values", &allowed.join(", "))],
                        )
                    }),
                Rule::Custom(rule) => rule.check(trimmed, values).await.err(),
            };
            if failure.is_some() {
                return failure;
            }
        }
        None
    }

    pub fn cast(&self, values: &FieldValues) -> Result<CastValues, ConfigError> {
        self.schema
            .fields()
            .iter()
            .map(|field| {
                let raw = values.get(field.name()).map(String::as_str).unwrap_or("");
                field
                    .cast(raw)
                    .map(|value| (field.name().to_string(), value))
                    .map_err(|detail| ConfigError::Cast {
                        field: field.name().to_string(),
                        detail,
                    })
            })
            .collect()
    }

    fn message(&self, key: &str, label: &str, params: &[(&str, &str)]) -> String {
        let mut all = Vec::with_capacity(params.len() + 1);
        all.push(("label", label));
        all.extend_from_slice(params);
        self.i18n.t_with(key, &all)
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || value.chars().any(char::is_whitespace) {
        return false;
    }
    let labels = domain.split('.').collect::<Vec<_>>();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}
