use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::engine::MapError;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldValue {
    Empty,
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Bool(bool),
}

impl FieldValue {
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Empty => "empty",
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Decimal(_) => "decimal",
            FieldValue::Bool(_) => "bool",
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Empty)
    }

    pub fn to_raw(&self) -> String {
        self.to_string()
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Empty => Ok(()),
            FieldValue::Text(value) => f.write_str(value),
            FieldValue::Integer(value) => write!(f, "{value}"),
            FieldValue::Decimal(value) => write!(f, "{value}"),
            FieldValue::Bool(value) => write!(f, "{value}"),
        }
    }
}

pub type CastValues = BTreeMap<String, FieldValue>;

pub type Record = CastValues;

pub trait FormDomain: Clone + Send + Sync + 'static {
    fn field_names() -> &'static [&'static str];
    fn to_field_values(&self) -> CastValues;
    fn from_cast_values(values: &CastValues) -> Result<Self, MapError>;
}

pub trait ToFieldValue {
    fn to_field_value(&self) -> FieldValue;
}

pub trait FromFieldValue: Sized {
    fn from_field_value(field: &str, value: Option<&FieldValue>) -> Result<Self, MapError>;
}

impl ToFieldValue for String {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }
}

impl ToFieldValue for bool {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }
}

impl ToFieldValue for Decimal {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Decimal(*self)
    }
}

impl<T: ToFieldValue> ToFieldValue for Option<T> {
    fn to_field_value(&self) -> FieldValue {
        self.as_ref()
            .map_or(FieldValue::Empty, ToFieldValue::to_field_value)
    }
}

impl FromFieldValue for String {
    fn from_field_value(field: &str, value: Option<&FieldValue>) -> Result<Self, MapError> {
        match required(field, value)? {
            FieldValue::Empty => Ok(String::new()),
            FieldValue::Text(text) => Ok(text.clone()),
            other => Ok(other.to_string()),
        }
    }
}

impl FromFieldValue for bool {
    fn from_field_value(field: &str, value: Option<&FieldValue>) -> Result<Self, MapError> {
        match required(field, value)? {
            FieldValue::Bool(flag) => Ok(*flag),
            other => Err(mismatch(field, "bool", other)),
        }
    }
}

impl FromFieldValue for Decimal {
    fn from_field_value(field: &str, value: Option<&FieldValue>) -> Result<Self, MapError> {
        match required(field, value)? {
            FieldValue::Decimal(number) => Ok(*number),
            FieldValue::Integer(number) => Ok(Decimal::from(*number)),
            other => Err(mismatch(field, "decimal", other)),
        }
    }
}

impl<T: FromFieldValue> FromFieldValue for Option<T> {
    fn from_field_value(field: &str, value: Option<&FieldValue>) -> Result<Self, MapError> {
        match value {
            None | Some(FieldValue::Empty) => Ok(None),
            Some(_) => T::from_field_value(field, value).map(Some),
        }
    }
}

macro_rules! integer_field_value {
    ($($ty:ty => $to:ident),* $(,)?) => {
        $(
            impl ToFieldValue for $ty {
                fn to_field_value(&self) -> FieldValue {
                    FieldValue::Integer(i64::from(*self))
                }
            }

            impl FromFieldValue for $ty {
                fn from_field_value(
                    field: &str,
                    value: Option<&FieldValue>,
                ) -> Result<Self, MapError> {
                    let number = match required(field, value)? {
                        FieldValue::Integer(number) => <$ty>::try_from(*number).ok(),
                        FieldValue::Decimal(number) if number.fract().is_zero() => number.$to(),
                        other => return Err(mismatch(field, "integer", other)),
                    };
                    number.ok_or_else(|| MapError::OutOfRange {
                        field: field.to_string(),
                    })
                }
            }
        )*
    };
}

integer_field_value!(i64 => to_i64, i32 => to_i32, u32 => to_u32);

fn required<'a>(field: &str, value: Option<&'a FieldValue>) -> Result<&'a FieldValue, MapError> {
    value.ok_or_else(|| MapError::MissingField {
        field: field.to_string(),
    })
}

fn mismatch(field: &str, expected: &'static str, found: &FieldValue) -> MapError {
    MapError::TypeMismatch {
        field: field.to_string(),
        expected,
        found: found.kind(),
    }
}
