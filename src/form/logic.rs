use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use futures::future::BoxFuture;
use futures_timer::Delay;
use tracing::{debug, warn};

use super::commands::{Command, CommandBody, CommandKind, Submission};
use super::engine::{FormOptions, FormResult, StaleValidation, read_lock, write_lock};
use super::mapper::DomainMapper;
use super::state::{FieldKey, FieldMessages, FieldValues, FormName, FormState};
use super::validation::Validator;
use crate::feedback::{Notice, NoticeKind, NoticeSink};
use crate::i18n::I18nManager;

pub type DispatchFuture = BoxFuture<'static, FormResult<()>>;
pub type LogicFuture<'a, T> = BoxFuture<'a, FormResult<T>>;

pub trait Dispatch<D, X>: Send + Sync {
    fn dispatch(&self, command: Command<D, X>) -> DispatchFuture;
}

impl<D, X, F> Dispatch<D, X> for F
where
    F: Fn(Command<D, X>) -> DispatchFuture + Send + Sync,
{
    fn dispatch(&self, command: Command<D, X>) -> DispatchFuture {
        self(command)
    }
}

pub trait StateSource: Send + Sync {
    fn form_state(&self, form: &FormName) -> FormResult<Option<Arc<FormState>>>;
}

pub struct LogicContext<D, X> {
    state: Arc<dyn StateSource>,
    dispatch: Arc<dyn Dispatch<D, X>>,
}

impl<D, X> Clone for LogicContext<D, X> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            dispatch: self.dispatch.clone(),
        }
    }
}

impl<D, X> LogicContext<D, X> {
    pub fn new(state: Arc<dyn StateSource>, dispatch: Arc<dyn Dispatch<D, X>>) -> Self {
        Self { state, dispatch }
    }

    pub fn get_state(&self, form: &FormName) -> FormResult<Option<Arc<FormState>>> {
        self.state.form_state(form)
    }

    pub fn dispatch(&self, command: Command<D, X>) -> DispatchFuture {
        self.dispatch.dispatch(command)
    }
}

#[derive(Debug)]
pub enum Outcome<D, X> {
    Forward {
        command: Command<D, X>,
        follow_up: Vec<Command<D, X>>,
    },
    Discard,
}

impl<D, X> Outcome<D, X> {
    pub fn forward(command: Command<D, X>) -> Self {
        Self::Forward {
            command,
            follow_up: Vec::new(),
        }
    }
}

/// Asynchronous side-effect module.
///
/// `transform` runs before the reducers and may rewrite or drop a command;
/// `process` runs after them and returns commands to dispatch next.
pub trait Logic<D, X>: Send + Sync {
    fn name(&self) -> &str;

    fn transform<'a>(
        &'a self,
        ctx: &'a LogicContext<D, X>,
        command: Command<D, X>,
    ) -> LogicFuture<'a, Outcome<D, X>>;

    fn process<'a>(
        &'a self,
        _ctx: &'a LogicContext<D, X>,
        _command: &'a Command<D, X>,
    ) -> LogicFuture<'a, Vec<Command<D, X>>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValidationTicket(pub u64);

#[derive(Debug, Default)]
struct ValidationGuard {
    latest: ValidationTicket,
    /// Field edits whose validation is still in flight, newest per field.
    changes: BTreeMap<String, (ValidationTicket, String)>,
}

fn lock_guard(guard: &RwLock<ValidationGuard>) -> RwLockWriteGuard<'_, ValidationGuard> {
    match guard.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// Releases a pending field edit when its validation finishes or is dropped.
struct ChangeLease {
    guard: Arc<RwLock<ValidationGuard>>,
    field: String,
    ticket: ValidationTicket,
}

impl ChangeLease {
    fn release(&self) -> bool {
        let mut guard = lock_guard(&self.guard);
        let owns = guard.changes.get(&self.field).map(|(owner, _)| *owner) == Some(self.ticket);
        if owns {
            guard.changes.remove(&self.field);
        }
        owns
    }
}

impl Drop for ChangeLease {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct DynamicValidation {
    form: FormName,
    validator: Validator,
    options: FormOptions,
    guard: Arc<RwLock<ValidationGuard>>,
}

impl DynamicValidation {
    pub fn new(form: FormName, validator: Validator, options: FormOptions) -> Self {
        Self {
            form,
            validator,
            options,
            guard: Arc::new(RwLock::new(ValidationGuard::default())),
        }
    }

    async fn validate_field_command<D, X>(
        &self,
        ctx: &LogicContext<D, X>,
        command: Command<D, X>,
    ) -> FormResult<Outcome<D, X>> {
        let (field, change) = match &command.body {
            CommandBody::FieldChanged { field, value, .. } => (field.clone(), Some(value.clone())),
            CommandBody::FieldTouched { field, .. } => (field.clone(), None),
            CommandBody::Open { .. } | CommandBody::Close => {
                write_lock(&self.guard, "resetting field validation")?
                    .changes
                    .clear();
                return Ok(Outcome::forward(command));
            }
            _ => return Ok(Outcome::forward(command)),
        };

        let Some(state) = self.editable_state(ctx, &command)? else {
            return Ok(Outcome::Discard);
        };
        if change.is_none() && state.is_validating(&FieldKey::named(field.as_str())) {
            return Ok(Outcome::forward(command));
        }

        let (lease, values) = self.begin(&state, &field, change)?;

        let debounce = self.options.validation_debounce;
        if !debounce.is_zero() {
            Delay::new(debounce).await;
            if self.options.stale_validation == StaleValidation::Discard
                && !self.is_latest(lease.ticket)?
            {
                if self.editable_state(ctx, &command)?.is_none() {
                    return Ok(Outcome::Discard);
                }
                return self.settle(&lease, command, None);
            }
        }

        let msgs = self.validator.validate(&values).await;
        let Some(current) = self.editable_state(ctx, &command)? else {
            return Ok(Outcome::Discard);
        };
        self.settle(&lease, command, Some(current.keep_form_msg(msgs)))
    }

    fn editable_state<D, X>(
        &self,
        ctx: &LogicContext<D, X>,
        command: &Command<D, X>,
    ) -> FormResult<Option<Arc<FormState>>> {
        let Some(state) = ctx.get_state(&self.form)? else {
            debug!(command = %command.type_name(), "form is inactive, discarding field command");
            return Ok(None);
        };
        if state.in_process {
            debug!(command = %command.type_name(), "form is submitting, discarding field command");
            return Ok(None);
        }
        Ok(Some(state))
    }

    fn begin(
        &self,
        state: &FormState,
        field: &str,
        change: Option<String>,
    ) -> FormResult<(ChangeLease, FieldValues)> {
        let mut guard = write_lock(&self.guard, "starting field validation")?;
        let ticket = ValidationTicket(guard.latest.0 + 1);
        guard.latest = ticket;

        let mut values = state.values.clone();
        match self.options.stale_validation {
            StaleValidation::Discard => {
                if let Some(value) = change {
                    guard.changes.insert(field.to_string(), (ticket, value));
                }
                for (name, (_, value)) in &guard.changes {
                    values.insert(name.clone(), value.clone());
                }
            }
            StaleValidation::Apply => {
                if let Some(value) = change {
                    values.insert(field.to_string(), value);
                }
            }
        }
        let lease = ChangeLease {
            guard: self.guard.clone(),
            field: field.to_string(),
            ticket,
        };
        Ok((lease, values))
    }

    fn is_latest(&self, ticket: ValidationTicket) -> FormResult<bool> {
        Ok(read_lock(&self.guard, "checking latest validation ticket")?.latest == ticket)
    }

    fn settle<D, X>(
        &self,
        lease: &ChangeLease,
        mut command: Command<D, X>,
        msgs: Option<FieldMessages>,
    ) -> FormResult<Outcome<D, X>> {
        let owns_change = lease.release();
        let latest = self.is_latest(lease.ticket)?;
        let field = lease.field.as_str();

        let msgs = match self.options.stale_validation {
            StaleValidation::Apply => msgs,
            StaleValidation::Discard => {
                if command.kind() == CommandKind::FieldChanged && !owns_change {
                    debug!(command = %command.type_name(), field, "field was edited again, dropping stale change");
                    return Ok(Outcome::Discard);
                }
                if latest {
                    msgs
                } else {
                    debug!(command = %command.type_name(), field, "stale validation result, keeping current messages");
                    None
                }
            }
        };

        match &mut command.body {
            CommandBody::FieldChanged { msgs: slot, .. }
            | CommandBody::FieldTouched { msgs: slot, .. } => *slot = msgs,
            _ => {}
        }
        Ok(Outcome::forward(command))
    }
}

impl<D, X> Logic<D, X> for DynamicValidation
where
    D: Send + Sync + 'static,
    X: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "dynamicValidation"
    }

    fn transform<'a>(
        &'a self,
        ctx: &'a LogicContext<D, X>,
        command: Command<D, X>,
    ) -> LogicFuture<'a, Outcome<D, X>> {
        if !command.is_for(&self.form) {
            return Box::pin(async move { Ok(Outcome::forward(command)) });
        }
        Box::pin(self.validate_field_command(ctx, command))
    }
}

pub struct SubmissionValidation<M> {
    form: FormName,
    validator: Validator,
    mapper: Arc<M>,
    i18n: I18nManager,
    notices: Option<Arc<dyn NoticeSink>>,
}

impl<M> SubmissionValidation<M>
where
    M: DomainMapper,
{
    pub fn new(
        form: FormName,
        validator: Validator,
        mapper: Arc<M>,
        i18n: I18nManager,
        notices: Option<Arc<dyn NoticeSink>>,
    ) -> Self {
        Self {
            form,
            validator,
            mapper,
            i18n,
            notices,
        }
    }

    async fn validate_submission<X>(
        &self,
        ctx: &LogicContext<M::Domain, X>,
        command: Command<M::Domain, X>,
    ) -> FormResult<Outcome<M::Domain, X>> {
        let Some(state) = ctx.get_state(&self.form)? else {
            debug!(command = %command.type_name(), "form is inactive, discarding submission");
            return Ok(Outcome::Discard);
        };

        let mut msgs = self.validator.validate(&state.values).await;
        if !msgs.is_empty() {
            debug!(form = %self.form, invalid = msgs.len(), "submission rejected by validation");
            msgs.insert(FieldKey::Form, self.i18n.t("form.resolve_issues"));
            return Ok(self.reject(command, msgs));
        }

        let values = self.validator.cast(&state.values)?;
        match self.mapper.form_to_domain(&values) {
            Ok(domain) => Ok(Outcome::forward(Command {
                form: command.form,
                body: CommandBody::Process {
                    submission: Some(Submission { values, domain }),
                },
            })),
            Err(error) => {
                warn!(form = %self.form, %error, "domain mapper refused submitted values");
                let message = self
                    .i18n
                    .t_with("form.mapping_failed", &[("error", &error.to_string())]);
                if let Some(notices) = &self.notices {
                    let title = state
                        .labels
                        .get(&FieldKey::Form)
                        .cloned()
                        .unwrap_or_else(|| self.form.to_string());
                    notices.push(Notice::new(title, message.clone()).kind(NoticeKind::Error));
                }
                Ok(self.reject(command, FieldMessages::from([(FieldKey::Form, message)])))
            }
        }
    }

    fn reject<X>(
        &self,
        command: Command<M::Domain, X>,
        msgs: FieldMessages,
    ) -> Outcome<M::Domain, X> {
        let reject = Command {
            form: self.form.clone(),
            body: CommandBody::ProcessReject { msgs },
        };
        Outcome::Forward {
            command,
            follow_up: vec![reject],
        }
    }
}

impl<M, X> Logic<M::Domain, X> for SubmissionValidation<M>
where
    M: DomainMapper,
    X: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "submissionValidation"
    }

    fn transform<'a>(
        &'a self,
        ctx: &'a LogicContext<M::Domain, X>,
        command: Command<M::Domain, X>,
    ) -> LogicFuture<'a, Outcome<M::Domain, X>> {
        let pending = command.is_for(&self.form)
            && matches!(command.body, CommandBody::Process { submission: None });
        if !pending {
            return Box::pin(async move { Ok(Outcome::forward(command)) });
        }
        Box::pin(self.validate_submission(ctx, command))
    }
}
