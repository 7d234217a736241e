use std::sync::Arc;

use super::commands::{Command, CommandSet};
use super::engine::ConfigError;
use super::logic::{Dispatch, DispatchFuture};
use super::state::{FieldKey, FieldLabels, FormState};

pub trait SubmitEvent {
    fn prevent_default(&mut self);
}

pub struct IForm<D, X = ()> {
    commands: CommandSet,
    state: Arc<FormState>,
    dispatch: Arc<dyn Dispatch<D, X>>,
}

impl<D, X> IForm<D, X> {
    pub fn new(
        commands: CommandSet,
        labels: &FieldLabels,
        state: Arc<FormState>,
        dispatch: Arc<dyn Dispatch<D, X>>,
    ) -> Result<Self, ConfigError> {
        if &state.labels != labels {
            return Err(ConfigError::FacadeMismatch(commands.form().clone()));
        }
        Ok(Self {
            commands,
            state,
            dispatch,
        })
    }

    pub fn state(&self) -> &Arc<FormState> {
        &self.state
    }

    pub fn label(&self, key: impl Into<FieldKey>) -> Option<&str> {
        self.state.labels.get(&key.into()).map(String::as_str)
    }

    pub fn value(&self, key: impl Into<FieldKey>) -> Result<&str, ConfigError> {
        match key.into() {
            FieldKey::Form => Err(ConfigError::FormLevelValue),
            FieldKey::Named(field) => self
                .state
                .values
                .get(&field)
                .map(String::as_str)
                .ok_or_else(|| ConfigError::UnknownField {
                    form: self.commands.form().clone(),
                    field,
                }),
        }
    }

    pub fn is_valid(&self, key: impl Into<FieldKey>) -> bool {
        match key.into() {
            FieldKey::Form => self.state.msgs.is_empty(),
            key => !self.state.msgs.contains_key(&key),
        }
    }

    pub fn msg(&self, key: impl Into<FieldKey>) -> Option<&str> {
        self.state.msgs.get(&key.into()).map(String::as_str)
    }

    pub fn is_validation_exposed(&self, key: impl Into<FieldKey>) -> bool {
        self.state.is_validating(&FieldKey::Form) || self.state.is_validating(&key.into())
    }

    pub fn exposed_msg(&self, key: impl Into<FieldKey>) -> Option<&str> {
        let key = key.into();
        if self.is_validation_exposed(key.clone()) {
            self.msg(key)
        } else {
            None
        }
    }

    pub fn in_process(&self) -> bool {
        self.state.in_process
    }

    pub fn handle_field_changed(
        &self,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> DispatchFuture {
        self.send(self.commands.field_changed(field, value))
    }

    pub fn handle_field_touched(&self, field: impl Into<String>) -> DispatchFuture {
        self.send(self.commands.field_touched(field))
    }

    pub fn handle_process(&self, event: Option<&mut dyn SubmitEvent>) -> DispatchFuture {
        if let Some(event) = event {
            event.prevent_default();
        }
        self.send(self.commands.process())
    }

    pub fn handle_close(&self) -> DispatchFuture {
        self.send(self.commands.close())
    }

    fn send(&self, command: Command<D, X>) -> DispatchFuture {
        self.dispatch.dispatch(command)
    }
}
