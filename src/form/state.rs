use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormName(String);

impl FormName {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FormName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FormName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum FieldKey {
    Form,
    Named(String),
}

impl FieldKey {
    pub fn named(value: impl Into<String>) -> Self {
        Self::Named(value.into())
    }

    pub fn field_name(&self) -> Option<&str> {
        match self {
            FieldKey::Form => None,
            FieldKey::Named(name) => Some(name),
        }
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKey::Form => f.write_str("FORM"),
            FieldKey::Named(name) => f.write_str(name),
        }
    }
}

impl From<&str> for FieldKey {
    fn from(value: &str) -> Self {
        Self::named(value)
    }
}

impl From<String> for FieldKey {
    fn from(value: String) -> Self {
        Self::Named(value)
    }
}

impl From<&String> for FieldKey {
    fn from(value: &String) -> Self {
        Self::Named(value.clone())
    }
}

pub type FieldValues = BTreeMap<String, String>;
pub type FieldMessages = BTreeMap<FieldKey, String>;
pub type FieldLabels = BTreeMap<FieldKey, String>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormState {
    pub labels: FieldLabels,
    pub values: FieldValues,
    pub msgs: FieldMessages,
    pub validating: BTreeSet<FieldKey>,
    pub in_process: bool,
}

impl FormState {
    pub fn is_validating(&self, key: &FieldKey) -> bool {
        self.validating.contains(key)
    }

    pub(crate) fn keep_form_msg(&self, mut msgs: FieldMessages) -> FieldMessages {
        if let Some(form_msg) = self.msgs.get(&FieldKey::Form) {
            msgs.entry(FieldKey::Form)
                .or_insert_with(|| form_msg.clone());
        }
        msgs
    }
}
