use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::form::{
    Command, ConfigError, Dispatch, DispatchFuture, FormError, FormName, FormResult, FormState,
    Logic, LogicContext, Outcome, Reducer, StateSource, read_lock, write_lock,
};

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AppState {
    forms: BTreeMap<FormName, Arc<FormState>>,
}

impl AppState {
    pub fn form(&self, form: &FormName) -> Option<Arc<FormState>> {
        self.forms.get(form).cloned()
    }

    pub fn active_forms(&self) -> impl Iterator<Item = &FormName> {
        self.forms.keys()
    }
}

struct StoreInner<D, X> {
    state: RwLock<AppState>,
    reducers: RwLock<BTreeMap<FormName, Arc<dyn Reducer<D, X>>>>,
    logics: RwLock<Vec<Arc<dyn Logic<D, X>>>>,
}

/// Minimal state container: logic transforms, then reducers, then logic
/// process hooks, then follow-up commands, one command at a time.
pub struct Store<D, X = ()> {
    inner: Arc<StoreInner<D, X>>,
}

impl<D, X> Clone for Store<D, X> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D, X> Default for Store<D, X>
where
    D: Send + Sync + 'static,
    X: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<D, X> Store<D, X>
where
    D: Send + Sync + 'static,
    X: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(AppState::default()),
                reducers: RwLock::new(BTreeMap::new()),
                logics: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn register_reducer(&self, reducer: Arc<dyn Reducer<D, X>>) -> FormResult<()> {
        let mut reducers = write_lock(&self.inner.reducers, "registering reducer")?;
        let form = reducer.form().clone();
        if reducers.contains_key(&form) {
            return Err(ConfigError::DuplicateReducer(form).into());
        }
        reducers.insert(form, reducer);
        Ok(())
    }

    pub fn register_logic(&self, logic: Arc<dyn Logic<D, X>>) -> FormResult<()> {
        write_lock(&self.inner.logics, "registering logic")?.push(logic);
        Ok(())
    }

    pub fn state(&self) -> FormResult<AppState> {
        Ok(read_lock(&self.inner.state, "reading app state")?.clone())
    }

    pub fn form_state(&self, form: &FormName) -> FormResult<Option<Arc<FormState>>> {
        Ok(read_lock(&self.inner.state, "reading form state")?.form(form))
    }

    pub fn dispatcher(&self) -> Arc<dyn Dispatch<D, X>> {
        let store = self.clone();
        Arc::new(move |command: Command<D, X>| store.dispatch(command))
    }

    pub fn dispatch(&self, command: Command<D, X>) -> DispatchFuture {
        let store = self.clone();
        Box::pin(async move { store.run(command).await })
    }

    async fn run(&self, command: Command<D, X>) -> FormResult<()> {
        if !self.has_reducer(&command.form)? {
            return Err(FormError::UnknownForm(command.form));
        }

        let ctx = LogicContext::new(Arc::new(self.clone()), self.dispatcher());
        let logics = read_lock(&self.inner.logics, "reading logic")?.clone();
        let type_name = command.type_name();

        let mut command = command;
        let mut follow_up = Vec::new();
        for logic in &logics {
            match logic.transform(&ctx, command).await? {
                Outcome::Forward {
                    command: next,
                    follow_up: queued,
                } => {
                    command = next;
                    follow_up.extend(queued);
                }
                Outcome::Discard => {
                    debug!(command = %type_name, logic = logic.name(), "command discarded");
                    return Ok(());
                }
            }
        }

        self.reduce(&command)?;

        for logic in &logics {
            follow_up.extend(logic.process(&ctx, &command).await?);
        }
        for next in follow_up {
            self.dispatch(next).await?;
        }
        Ok(())
    }

    fn has_reducer(&self, form: &FormName) -> FormResult<bool> {
        Ok(read_lock(&self.inner.reducers, "reading reducers")?.contains_key(form))
    }

    fn reduce(&self, command: &Command<D, X>) -> FormResult<()> {
        let reducers = read_lock(&self.inner.reducers, "reading reducers")?;
        let mut state = write_lock(&self.inner.state, "reducing command")?;
        for (form, reducer) in reducers.iter() {
            match reducer.reduce(state.forms.get(form).cloned(), command)? {
                Some(next) => {
                    state.forms.insert(form.clone(), next);
                }
                None => {
                    state.forms.remove(form);
                }
            }
        }
        Ok(())
    }
}

impl<D, X> StateSource for Store<D, X>
where
    D: Send + Sync + 'static,
    X: Send + Sync + 'static,
{
    fn form_state(&self, form: &FormName) -> FormResult<Option<Arc<FormState>>> {
        Store::form_state(self, form)
    }
}
