use std::marker::PhantomData;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use thiserror::Error as ThisError;

use super::commands::CommandSet;
use super::facade::IForm;
use super::logic::{Dispatch, DynamicValidation, Logic, SubmissionValidation};
use super::mapper::{DomainMapper, StraightMapper};
use super::reducer::FormReducer;
use super::schema::{FieldType, FormSchema};
use super::state::{FieldLabels, FormName, FormState};
use super::validation::Validator;
use crate::feedback::NoticeSink;
use crate::i18n::{I18nManager, Locale};
use crate::store::{AppState, Store};

#[derive(Debug, Clone, Eq, PartialEq, ThisError)]
pub enum ConfigError {
    #[error("form schema declares no fields")]
    EmptySchema,
    #[error("form schema contains a field with an empty name")]
    EmptyFieldName,
    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),
    #[error("field `{field}` declares an invalid range: {detail}")]
    InvalidRange { field: String, detail: String },
    #[error("rule `{rule}` does not apply to {field_type:?} field `{field}`")]
    RuleTypeMismatch {
        field: String,
        rule: &'static str,
        field_type: FieldType,
    },
    #[error("field `{0}` declares an empty set of allowed values")]
    EmptyOneOf(String),
    #[error("domain mapper for form `{form}` produced fields {actual:?}, schema expects {expected:?}")]
    MapperFieldMismatch {
        form: FormName,
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error("command `{0}` collides with a reserved form command")]
    ReservedCommand(String),
    #[error("command `{0}` is declared more than once")]
    DuplicateCommand(String),
    #[error("`{0}` is not a valid command name")]
    InvalidCommandName(String),
    #[error("command `{name}` is not registered for form `{form}`")]
    UnknownCommand { form: FormName, name: String },
    #[error("facade for form `{0}` was bound to the state of a different form")]
    FacadeMismatch(FormName),
    #[error("the form level key has no value")]
    FormLevelValue,
    #[error("field `{field}` is not part of form `{form}`")]
    UnknownField { form: FormName, field: String },
    #[error("field `{field}` passed validation but cannot be cast: {detail}")]
    Cast { field: String, detail: String },
    #[error("a reducer for form `{0}` is already registered")]
    DuplicateReducer(FormName),
}

#[derive(Debug, Clone, Eq, PartialEq, ThisError)]
pub enum MapError {
    #[error("field `{field}` is missing")]
    MissingField { field: String },
    #[error("field `{field}` expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("field `{field}` is out of range")]
    OutOfRange { field: String },
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Eq, PartialEq, ThisError)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("no reducer is registered for form `{0}`")]
    UnknownForm(FormName),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type FormResult<T> = Result<T, FormError>;

/// What happens to a field validation result that finishes after a newer
/// edit of the same form has already started validating.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StaleValidation {
    /// Newer edits win. A stale result keeps its value change but leaves
    /// messages alone; a stale change of a field edited again is dropped.
    Discard,
    /// Every result is applied in completion order.
    Apply,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormOptions {
    pub stale_validation: StaleValidation,
    pub validation_debounce: Duration,
    pub locale: Locale,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            stale_validation: StaleValidation::Discard,
            validation_debounce: Duration::ZERO,
            locale: Locale::System,
        }
    }
}

pub struct FormEngine<M = StraightMapper, X = ()>
where
    M: DomainMapper,
{
    form: FormName,
    schema: FormSchema,
    mapper: Arc<M>,
    options: FormOptions,
    commands: CommandSet,
    validator: Validator,
    i18n: I18nManager,
    notices: Option<Arc<dyn NoticeSink>>,
    _payload: PhantomData<fn() -> X>,
}

pub struct FormEngineBuilder<M, X> {
    form: FormName,
    schema: FormSchema,
    mapper: M,
    options: FormOptions,
    extra_commands: Vec<String>,
    i18n: Option<I18nManager>,
    notices: Option<Arc<dyn NoticeSink>>,
    _payload: PhantomData<fn() -> X>,
}

impl FormEngine<StraightMapper, ()> {
    pub fn builder(
        form: impl Into<FormName>,
        schema: FormSchema,
    ) -> FormEngineBuilder<StraightMapper, ()> {
        FormEngineBuilder {
            form: form.into(),
            schema,
            mapper: StraightMapper,
            options: FormOptions::default(),
            extra_commands: Vec::new(),
            i18n: None,
            notices: None,
            _payload: PhantomData,
        }
    }
}

impl<M, X> FormEngineBuilder<M, X>
where
    M: DomainMapper,
    X: Clone + Send + Sync + 'static,
{
    pub fn mapper<N: DomainMapper>(self, mapper: N) -> FormEngineBuilder<N, X> {
        FormEngineBuilder {
            form: self.form,
            schema: self.schema,
            mapper,
            options: self.options,
            extra_commands: self.extra_commands,
            i18n: self.i18n,
            notices: self.notices,
            _payload: PhantomData,
        }
    }

    pub fn payload<Y>(self) -> FormEngineBuilder<M, Y> {
        FormEngineBuilder {
            form: self.form,
            schema: self.schema,
            mapper: self.mapper,
            options: self.options,
            extra_commands: self.extra_commands,
            i18n: self.i18n,
            notices: self.notices,
            _payload: PhantomData,
        }
    }

    pub fn options(mut self, options: FormOptions) -> Self {
        self.options = options;
        self
    }

    pub fn extra_commands<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_commands
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn i18n(mut self, i18n: I18nManager) -> Self {
        self.i18n = Some(i18n);
        self
    }

    pub fn notices(mut self, sink: Arc<dyn NoticeSink>) -> Self {
        self.notices = Some(sink);
        self
    }

    pub fn build(self) -> Result<FormEngine<M, X>, ConfigError> {
        let commands = CommandSet::new(self.form.clone(), self.extra_commands)?;
        let i18n = match self.i18n {
            Some(i18n) => i18n,
            None => {
                let i18n = I18nManager::new();
                i18n.set_locale(self.options.locale.clone());
                i18n
            }
        };
        let validator = Validator::new(self.schema.clone(), i18n.clone());
        Ok(FormEngine {
            form: self.form,
            schema: self.schema,
            mapper: Arc::new(self.mapper),
            options: self.options,
            commands,
            validator,
            i18n,
            notices: self.notices,
            _payload: PhantomData,
        })
    }
}

impl<M, X> FormEngine<M, X>
where
    M: DomainMapper,
    X: Clone + Send + Sync + 'static,
{
    pub fn form(&self) -> &FormName {
        &self.form
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn labels(&self) -> FieldLabels {
        self.schema.labels()
    }

    pub fn command_set(&self) -> &CommandSet {
        &self.commands
    }

    pub fn reducer(&self) -> Arc<FormReducer<M, X>> {
        Arc::new(FormReducer::new(
            self.form.clone(),
            self.schema.clone(),
            self.mapper.clone(),
        ))
    }

    pub fn logic(&self) -> Vec<Arc<dyn Logic<M::Domain, X>>> {
        let dynamic: Arc<dyn Logic<M::Domain, X>> = Arc::new(DynamicValidation::new(
            self.form.clone(),
            self.validator.clone(),
            self.options.clone(),
        ));
        let submission: Arc<dyn Logic<M::Domain, X>> = Arc::new(SubmissionValidation::new(
            self.form.clone(),
            self.validator.clone(),
            self.mapper.clone(),
            self.i18n.clone(),
            self.notices.clone(),
        ));
        vec![dynamic, submission]
    }

    pub fn select(&self, state: &AppState) -> Option<Arc<FormState>> {
        state.form(&self.form)
    }

    pub fn iform(
        &self,
        state: Arc<FormState>,
        dispatch: Arc<dyn Dispatch<M::Domain, X>>,
    ) -> Result<IForm<M::Domain, X>, ConfigError> {
        IForm::new(self.commands.clone(), &self.labels(), state, dispatch)
    }

    pub fn register(&self, store: &Store<M::Domain, X>) -> FormResult<()> {
        store.register_reducer(self.reducer())?;
        for logic in self.logic() {
            store.register_logic(logic)?;
        }
        Ok(())
    }
}

pub(crate) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(crate) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
