use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::trace;

use super::commands::{Command, CommandBody};
use super::engine::ConfigError;
use super::mapper::DomainMapper;
use super::schema::FormSchema;
use super::state::{FieldKey, FieldMessages, FormName, FormState};

pub trait Reducer<D, X>: Send + Sync {
    fn form(&self) -> &FormName;

    fn reduce(
        &self,
        state: Option<Arc<FormState>>,
        command: &Command<D, X>,
    ) -> Result<Option<Arc<FormState>>, ConfigError>;
}

/// Pure state machine for one form.
///
/// Commands that change nothing hand back the same `Arc`, so callers can
/// skip work on `Arc::ptr_eq`.
pub struct FormReducer<M, X> {
    form: FormName,
    schema: FormSchema,
    mapper: Arc<M>,
    _payload: PhantomData<fn() -> X>,
}

impl<M, X> FormReducer<M, X>
where
    M: DomainMapper,
{
    pub fn new(form: FormName, schema: FormSchema, mapper: Arc<M>) -> Self {
        Self {
            form,
            schema,
            mapper,
            _payload: PhantomData,
        }
    }

    fn open(
        &self,
        domain: Option<&M::Domain>,
        form_msg: Option<&String>,
    ) -> Result<FormState, ConfigError> {
        let values = match domain {
            Some(domain) => self.mapper.domain_to_form(&self.schema, domain),
            None => self.schema.empty_values(),
        };

        let expected = self.schema.field_name_set();
        let actual = values.keys().map(String::as_str).collect::<BTreeSet<_>>();
        if expected != actual {
            return Err(ConfigError::MapperFieldMismatch {
                form: self.form.clone(),
                expected: expected.into_iter().map(str::to_string).collect(),
                actual: actual.into_iter().map(str::to_string).collect(),
            });
        }

        let mut msgs = FieldMessages::new();
        if let Some(form_msg) = form_msg {
            msgs.insert(FieldKey::Form, form_msg.clone());
        }
        Ok(FormState {
            labels: self.schema.labels(),
            values,
            msgs,
            validating: BTreeSet::new(),
            in_process: false,
        })
    }

    fn known_field(&self, field: &str) -> Result<(), ConfigError> {
        if self.schema.contains(field) {
            Ok(())
        } else {
            Err(ConfigError::UnknownField {
                form: self.form.clone(),
                field: field.to_string(),
            })
        }
    }
}

impl<M, X> Reducer<M::Domain, X> for FormReducer<M, X>
where
    M: DomainMapper,
{
    fn form(&self) -> &FormName {
        &self.form
    }

    fn reduce(
        &self,
        state: Option<Arc<FormState>>,
        command: &Command<M::Domain, X>,
    ) -> Result<Option<Arc<FormState>>, ConfigError> {
        if !command.is_for(&self.form) {
            return Ok(state);
        }

        if let CommandBody::Open { domain, form_msg } = &command.body {
            trace!(form = %self.form, "opening form");
            return self
                .open(domain.as_ref(), form_msg.as_ref())
                .map(|opened| Some(Arc::new(opened)));
        }
        if let CommandBody::Close = &command.body {
            trace!(form = %self.form, "closing form");
            return Ok(None);
        }

        let Some(current) = state else {
            trace!(command = %command.type_name(), "form is inactive, ignoring command");
            return Ok(None);
        };

        let next = match &command.body {
            CommandBody::FieldChanged { field, value, msgs } => {
                self.known_field(field)?;
                let mut next = FormState::clone(&current);
                next.values.insert(field.clone(), value.clone());
                if let Some(msgs) = msgs {
                    next.msgs = msgs.clone();
                }
                next
            }
            CommandBody::FieldTouched { field, msgs } => {
                self.known_field(field)?;
                let key = FieldKey::named(field.as_str());
                if current.is_validating(&key) {
                    return Ok(Some(current));
                }
                let mut next = FormState::clone(&current);
                next.validating.insert(key);
                if let Some(msgs) = msgs {
                    next.msgs = msgs.clone();
                }
                next
            }
            CommandBody::Process { .. } => {
                let mut next = FormState::clone(&current);
                next.in_process = true;
                next.validating.insert(FieldKey::Form);
                next.msgs.clear();
                next
            }
            CommandBody::ProcessReject { msgs } => {
                let mut next = FormState::clone(&current);
                next.validating.insert(FieldKey::Form);
                next.msgs = msgs.clone();
                next
            }
            CommandBody::Open { .. } | CommandBody::Close | CommandBody::Extra { .. } => {
                return Ok(Some(current));
            }
        };

        if next == *current {
            return Ok(Some(current));
        }
        trace!(command = %command.type_name(), "form state updated");
        Ok(Some(Arc::new(next)))
    }
}
