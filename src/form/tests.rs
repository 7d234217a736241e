use super::*;
use futures::FutureExt;
use futures::executor::block_on;
use futures_timer::Delay;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::feedback::{NoticeKind, NoticeQueue};
use crate::i18n::Locale;
use crate::store::Store;

fn sign_in_schema() -> FormSchema {
    FormSchema::builder("Sign in")
        .field(FieldSchema::text("email").required().email())
        .field(FieldSchema::text("pass").required().min_length(6))
        .build()
        .expect("schema builds")
}

fn english() -> FormOptions {
    FormOptions {
        locale: Locale::from("en-US"),
        ..FormOptions::default()
    }
}

fn sign_in() -> (FormEngine, Store<Record>) {
    let engine = FormEngine::builder("signIn", sign_in_schema())
        .options(english())
        .build()
        .expect("engine builds");
    let store = Store::new();
    engine.register(&store).expect("registers");
    (engine, store)
}

fn dispatch<D, X>(store: &Store<D, X>, command: Command<D, X>)
where
    D: Send + Sync + 'static,
    X: Send + Sync + 'static,
{
    block_on(store.dispatch(command)).expect("dispatch succeeds");
}

fn current<M, X>(engine: &FormEngine<M, X>, store: &Store<M::Domain, X>) -> Arc<FormState>
where
    M: DomainMapper,
    X: Clone + Send + Sync + 'static,
{
    engine
        .select(&store.state().expect("state"))
        .expect("form is open")
}

fn facade<M, X>(engine: &FormEngine<M, X>, store: &Store<M::Domain, X>) -> IForm<M::Domain, X>
where
    M: DomainMapper,
    X: Clone + Send + Sync + 'static,
{
    engine
        .iform(current(engine, store), store.dispatcher())
        .expect("facade binds")
}

/// Keeps every command that reached the reducers.
struct Recorder<D> {
    seen: Arc<Mutex<Vec<Command<D>>>>,
}

impl<D> Recorder<D> {
    fn new() -> (Self, Arc<Mutex<Vec<Command<D>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (Self { seen: seen.clone() }, seen)
    }
}

impl<D> Logic<D, ()> for Recorder<D>
where
    D: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "recorder"
    }

    fn transform<'a>(
        &'a self,
        _ctx: &'a LogicContext<D, ()>,
        command: Command<D>,
    ) -> LogicFuture<'a, Outcome<D, ()>> {
        Box::pin(async move { Ok(Outcome::forward(command)) })
    }

    fn process<'a>(
        &'a self,
        _ctx: &'a LogicContext<D, ()>,
        command: &'a Command<D>,
    ) -> LogicFuture<'a, Vec<Command<D>>> {
        self.seen.lock().expect("recorder lock").push(command.clone());
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// Fails for "taken" after a long lookup, passes everything else quickly.
struct PoolLookup {
    calls: Arc<AtomicUsize>,
}

impl AsyncRule for PoolLookup {
    fn check<'a>(&'a self, value: &'a str, _values: &'a FieldValues) -> RuleFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if value == "taken" {
                Delay::new(Duration::from_millis(60)).await;
                Err("name is already in the pool".to_string())
            } else {
                Delay::new(Duration::from_millis(5)).await;
                Ok(())
            }
        })
    }
}

fn eatery(options: FormOptions) -> (FormEngine, Store<Record>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let schema = FormSchema::builder("Eatery")
        .field(
            FieldSchema::text("name").required().custom(PoolLookup {
                calls: calls.clone(),
            }),
        )
        .build()
        .expect("schema builds");
    let engine = FormEngine::builder("eatery", schema)
        .options(options)
        .build()
        .expect("engine builds");
    let store = Store::new();
    engine.register(&store).expect("registers");
    dispatch(&store, engine.command_set().open(None, None));
    (engine, store, calls)
}

struct FakeSubmit {
    prevented: bool,
}

impl SubmitEvent for FakeSubmit {
    fn prevent_default(&mut self) {
        self.prevented = true;
    }
}

#[test]
fn open_without_domain_yields_empty_values() {
    let (engine, store) = sign_in();
    dispatch(&store, engine.command_set().open(None, None));

    let form = facade(&engine, &store);
    assert_eq!(form.value("email"), Ok(""));
    assert_eq!(form.value("pass"), Ok(""));
    assert_eq!(form.label(FieldKey::Form), Some("Sign in"));
    assert!(form.is_valid(FieldKey::Form));
    assert!(!form.in_process());
    for field in ["email", "pass"] {
        assert!(!form.is_validation_exposed(field));
    }
}

#[test]
fn touching_a_field_exposes_its_message() {
    let (engine, store) = sign_in();
    dispatch(&store, engine.command_set().open(None, None));

    let form = facade(&engine, &store);
    block_on(form.handle_field_touched("email")).expect("touch");

    let form = facade(&engine, &store);
    assert!(form.is_validation_exposed("email"));
    assert_eq!(form.exposed_msg("email"), Some("email is required"));
    assert_eq!(form.msg("pass"), Some("pass is required"));
    assert_eq!(form.exposed_msg("pass"), None);

    block_on(form.handle_field_changed("email", "a@b.com")).expect("change");

    let form = facade(&engine, &store);
    assert_eq!(form.value("email"), Ok("a@b.com"));
    assert_eq!(form.exposed_msg("email"), None);
    assert!(form.is_valid("email"));
    assert!(!form.is_valid(FieldKey::Form));
}

#[test]
fn touching_twice_keeps_the_same_state() {
    let (engine, store) = sign_in();
    dispatch(&store, engine.command_set().open(None, None));
    dispatch(&store, engine.command_set().field_touched("email"));
    let first = current(&engine, &store);

    dispatch(&store, engine.command_set().field_touched("email"));
    let second = current(&engine, &store);
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn invalid_submission_is_rejected_and_stays_in_process() {
    let (engine, store) = sign_in();
    let (recorder, seen) = Recorder::new();
    store.register_logic(Arc::new(recorder)).expect("registers");
    let commands = engine.command_set();

    dispatch(&store, commands.open(None, None));
    dispatch(&store, commands.field_changed("email", "a@b.com"));
    dispatch(&store, commands.field_changed("pass", "12"));
    seen.lock().expect("recorder lock").clear();

    let form = facade(&engine, &store);
    let mut submit = FakeSubmit { prevented: false };
    let event: &mut dyn SubmitEvent = &mut submit;
    block_on(form.handle_process(Some(event))).expect("process");
    assert!(submit.prevented);

    let seen = seen.lock().expect("recorder lock").clone();
    let kinds = seen.iter().map(Command::kind).collect::<Vec<_>>();
    assert_eq!(kinds, vec![CommandKind::Process, CommandKind::ProcessReject]);
    assert!(seen[0].submission().is_none());
    let CommandBody::ProcessReject { msgs } = &seen[1].body else {
        panic!("expected a rejection, got {:?}", seen[1].kind());
    };
    assert_eq!(
        msgs.get(&FieldKey::named("pass")).map(String::as_str),
        Some("pass must be at least 6 characters")
    );
    assert_eq!(
        msgs.get(&FieldKey::Form).map(String::as_str),
        Some("Please resolve highlighted issues.")
    );

    let form = facade(&engine, &store);
    assert!(form.in_process());
    assert!(form.is_validation_exposed("email"));
    assert!(form.is_validation_exposed("pass"));
    assert_eq!(
        form.exposed_msg(FieldKey::Form),
        Some("Please resolve highlighted issues.")
    );
}

#[test]
fn valid_submission_carries_cast_values_and_domain() {
    let (engine, store) = sign_in();
    let (recorder, seen) = Recorder::new();
    store.register_logic(Arc::new(recorder)).expect("registers");
    let commands = engine.command_set();

    dispatch(&store, commands.open(None, None));
    dispatch(&store, commands.field_changed("email", "a@b.com"));
    dispatch(&store, commands.field_changed("pass", "secret1"));
    seen.lock().expect("recorder lock").clear();
    dispatch(&store, commands.process());

    let seen = seen.lock().expect("recorder lock").clone();
    assert_eq!(seen.len(), 1);
    let submission = seen[0].submission().expect("submission attached");
    let expected = Record::from([
        ("email".to_string(), FieldValue::Text("a@b.com".into())),
        ("pass".to_string(), FieldValue::Text("secret1".into())),
    ]);
    assert_eq!(submission.values, expected);
    assert_eq!(submission.domain, expected);

    let state = current(&engine, &store);
    assert!(state.in_process);
    assert!(state.msgs.is_empty());
}

#[test]
fn field_edits_are_ignored_while_submitting() {
    let (engine, store) = sign_in();
    let commands = engine.command_set();
    dispatch(&store, commands.open(None, None));
    dispatch(&store, commands.process());
    let submitting = current(&engine, &store);

    dispatch(&store, commands.field_changed("email", "late@b.com"));
    dispatch(&store, commands.field_touched("pass"));
    assert!(Arc::ptr_eq(&submitting, &current(&engine, &store)));
}

#[test]
fn close_deactivates_from_any_state() {
    let (engine, store) = sign_in();
    let commands = engine.command_set();

    dispatch(&store, commands.close());
    assert!(engine.select(&store.state().expect("state")).is_none());

    dispatch(&store, commands.open(None, None));
    dispatch(&store, commands.field_changed("email", "a@b"));
    dispatch(&store, commands.close());
    assert!(engine.select(&store.state().expect("state")).is_none());

    dispatch(&store, commands.open(None, None));
    dispatch(&store, commands.process());
    let form = facade(&engine, &store);
    block_on(form.handle_close()).expect("close");
    assert!(engine.select(&store.state().expect("state")).is_none());
}

#[test]
fn form_message_survives_routine_typing() {
    let (engine, store) = sign_in();
    let commands = engine.command_set();
    let mut domain = Record::new();
    domain.insert("email".into(), FieldValue::Text("a@b.com".into()));
    domain.insert("pass".into(), FieldValue::Text("secret1".into()));

    dispatch(
        &store,
        commands.open(Some(domain), Some("Wrong password".to_string())),
    );
    let form = facade(&engine, &store);
    assert_eq!(form.value("email"), Ok("a@b.com"));
    assert_eq!(form.msg(FieldKey::Form), Some("Wrong password"));

    block_on(form.handle_field_changed("pass", "secret2")).expect("change");
    let form = facade(&engine, &store);
    assert_eq!(form.msg(FieldKey::Form), Some("Wrong password"));
    assert!(form.is_valid("pass"));
}

#[test]
fn mismatched_mapper_output_is_a_configuration_error() {
    let engine = FormEngine::builder("signIn", sign_in_schema())
        .mapper(FnMapper::straight().with_domain_to_form(|_schema, _domain| {
            FieldValues::from([("email".to_string(), String::new())])
        }))
        .build()
        .expect("engine builds");
    let store = Store::new();
    engine.register(&store).expect("registers");

    let result = block_on(store.dispatch(engine.command_set().open(Some(Record::new()), None)));
    assert_eq!(
        result,
        Err(FormError::Config(ConfigError::MapperFieldMismatch {
            form: FormName::new("signIn"),
            expected: vec!["email".to_string(), "pass".to_string()],
            actual: vec!["email".to_string()],
        }))
    );
    assert!(engine.select(&store.state().expect("state")).is_none());
}

#[test]
fn facade_rejects_state_of_another_form() {
    let (engine, store) = sign_in();
    let review = FormEngine::builder(
        "review",
        FormSchema::builder("Review")
            .field(FieldSchema::integer("stars").required().min(1).max(5))
            .build()
            .expect("schema builds"),
    )
    .build()
    .expect("engine builds");
    review.register(&store).expect("registers");
    dispatch(&store, review.command_set().open(None, None));

    let review_state = current(&review, &store);
    assert_eq!(
        engine.iform(review_state, store.dispatcher()).err(),
        Some(ConfigError::FacadeMismatch(FormName::new("signIn")))
    );
}

#[test]
fn form_level_key_has_no_value() {
    let (engine, store) = sign_in();
    dispatch(&store, engine.command_set().open(None, None));
    let form = facade(&engine, &store);

    assert_eq!(form.value(FieldKey::Form), Err(ConfigError::FormLevelValue));
    assert_eq!(
        form.value("nickname"),
        Err(ConfigError::UnknownField {
            form: FormName::new("signIn"),
            field: "nickname".to_string(),
        })
    );
}

#[test]
fn unknown_fields_are_rejected_by_the_reducer() {
    let (engine, store) = sign_in();
    dispatch(&store, engine.command_set().open(None, None));
    let result = block_on(
        store.dispatch(engine.command_set().field_changed("nickname", "x")),
    );
    assert!(matches!(
        result,
        Err(FormError::Config(ConfigError::UnknownField { .. }))
    ));
}

#[test]
fn stale_validation_results_are_discarded_by_default() {
    let (engine, store, _calls) = eatery(english());
    let form = facade(&engine, &store);

    let (slow, fast) = block_on(async {
        futures::join!(
            form.handle_field_changed("name", "taken"),
            form.handle_field_changed("name", "Taco Bus"),
        )
    });
    slow.expect("slow change");
    fast.expect("fast change");

    let form = facade(&engine, &store);
    assert_eq!(form.value("name"), Ok("Taco Bus"));
    assert_eq!(form.msg("name"), None);
}

#[test]
fn touching_a_validating_field_leaves_a_pending_change_in_charge() {
    let (engine, store, _calls) = eatery(english());
    dispatch(&store, engine.command_set().field_touched("name"));
    let form = facade(&engine, &store);
    assert_eq!(form.exposed_msg("name"), Some("name is required"));

    let (change, touch) = block_on(async {
        futures::join!(
            form.handle_field_changed("name", "Taco Bus"),
            form.handle_field_touched("name"),
        )
    });
    change.expect("change");
    touch.expect("touch");

    let form = facade(&engine, &store);
    assert_eq!(form.value("name"), Ok("Taco Bus"));
    assert_eq!(form.msg("name"), None);
}

#[test]
fn edits_finishing_after_submission_starts_are_dropped() {
    let (engine, store, _calls) = eatery(english());
    let form = facade(&engine, &store);

    let (change, process) = block_on(async {
        futures::join!(
            form.handle_field_changed("name", "Taco Bus"),
            form.handle_process(None),
        )
    });
    change.expect("change");
    process.expect("process");

    let form = facade(&engine, &store);
    assert!(form.in_process());
    assert_eq!(form.value("name"), Ok(""));
    assert_eq!(form.exposed_msg("name"), Some("name is required"));
    assert_eq!(
        form.exposed_msg(FieldKey::Form),
        Some("Please resolve highlighted issues.")
    );
}

#[test]
fn abandoned_edits_do_not_leak_into_later_validation() {
    let (engine, store, _calls) = eatery(english());
    let form = facade(&engine, &store);

    let mut pending = form.handle_field_changed("name", "taken");
    assert!((&mut pending).now_or_never().is_none());
    drop(pending);

    dispatch(&store, engine.command_set().field_touched("name"));
    let form = facade(&engine, &store);
    assert_eq!(form.value("name"), Ok(""));
    assert_eq!(form.exposed_msg("name"), Some("name is required"));
}

#[test]
fn stale_validation_results_apply_in_completion_order_when_configured() {
    let (engine, store, _calls) = eatery(FormOptions {
        stale_validation: StaleValidation::Apply,
        ..english()
    });
    let form = facade(&engine, &store);

    let (slow, fast) = block_on(async {
        futures::join!(
            form.handle_field_changed("name", "taken"),
            form.handle_field_changed("name", "Taco Bus"),
        )
    });
    slow.expect("slow change");
    fast.expect("fast change");

    let form = facade(&engine, &store);
    assert_eq!(form.value("name"), Ok("taken"));
    assert_eq!(form.msg("name"), Some("name is already in the pool"));
}

#[test]
fn debounced_validation_skips_superseded_edits() {
    let (engine, store, calls) = eatery(FormOptions {
        validation_debounce: Duration::from_millis(20),
        ..english()
    });
    let form = facade(&engine, &store);

    let (first, second) = block_on(async {
        futures::join!(
            form.handle_field_changed("name", "taken"),
            form.handle_field_changed("name", "Pho 24"),
        )
    });
    first.expect("first change");
    second.expect("second change");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let form = facade(&engine, &store);
    assert_eq!(form.value("name"), Ok("Pho 24"));
    assert_eq!(form.msg("name"), None);
}

#[test]
fn mapping_failures_reject_and_notify() {
    let notices = Arc::new(NoticeQueue::new());
    let engine = FormEngine::builder("signIn", sign_in_schema())
        .options(english())
        .mapper(
            FnMapper::straight()
                .with_form_to_domain(|_values| Err(MapError::Rejected("closed for the night".into()))),
        )
        .notices(notices.clone())
        .build()
        .expect("engine builds");
    let store = Store::new();
    engine.register(&store).expect("registers");
    let commands = engine.command_set();

    dispatch(&store, commands.open(None, None));
    dispatch(&store, commands.field_changed("email", "a@b.com"));
    dispatch(&store, commands.field_changed("pass", "secret1"));
    dispatch(&store, commands.process());

    let form = facade(&engine, &store);
    assert_eq!(
        form.exposed_msg(FieldKey::Form),
        Some("The form could not be submitted: closed for the night")
    );
    let entries = notices.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, NoticeKind::Error);
    assert_eq!(entries[0].title, "Sign in");
}

#[derive(Clone, Debug, PartialEq, FormDomain)]
struct Credentials {
    email: String,
    pass: String,
}

#[test]
fn derived_domain_round_trips_through_the_form() {
    let engine = FormEngine::builder("signIn", sign_in_schema())
        .options(english())
        .mapper(DerivedMapper::<Credentials>::new())
        .build()
        .expect("engine builds");
    let store = Store::new();
    engine.register(&store).expect("registers");
    let (recorder, seen) = Recorder::new();
    store.register_logic(Arc::new(recorder)).expect("registers");

    let credentials = Credentials {
        email: "a@b.com".to_string(),
        pass: "secret1".to_string(),
    };
    dispatch(
        &store,
        engine.command_set().open(Some(credentials.clone()), None),
    );
    assert_eq!(current(&engine, &store).values["pass"], "secret1");

    dispatch(&store, engine.command_set().process());
    let seen = seen.lock().expect("recorder lock").clone();
    let submission = seen
        .iter()
        .find_map(Command::submission)
        .expect("submission attached");
    assert_eq!(submission.domain, credentials);
    assert_eq!(Credentials::field_names(), &["email", "pass"]);
}

/// Closes the form once a submission has been accepted.
struct CloseAfterSubmit {
    commands: CommandSet,
}

impl Logic<Record, ()> for CloseAfterSubmit {
    fn name(&self) -> &str {
        "closeAfterSubmit"
    }

    fn transform<'a>(
        &'a self,
        _ctx: &'a LogicContext<Record, ()>,
        command: Command<Record>,
    ) -> LogicFuture<'a, Outcome<Record, ()>> {
        Box::pin(async move { Ok(Outcome::forward(command)) })
    }

    fn process<'a>(
        &'a self,
        _ctx: &'a LogicContext<Record, ()>,
        command: &'a Command<Record>,
    ) -> LogicFuture<'a, Vec<Command<Record>>> {
        let accepted = command.is_for(self.commands.form()) && command.submission().is_some();
        Box::pin(async move {
            if accepted {
                Ok(vec![self.commands.close()])
            } else {
                Ok(Vec::new())
            }
        })
    }
}

#[test]
fn caller_logic_observes_accepted_submissions() {
    let (engine, store) = sign_in();
    store
        .register_logic(Arc::new(CloseAfterSubmit {
            commands: engine.command_set().clone(),
        }))
        .expect("registers");
    let commands = engine.command_set();

    dispatch(&store, commands.open(None, None));
    dispatch(&store, commands.process());
    assert!(current(&engine, &store).in_process);

    dispatch(&store, commands.open(None, None));
    dispatch(&store, commands.field_changed("email", "a@b.com"));
    dispatch(&store, commands.field_changed("pass", "secret1"));
    assert!(!current(&engine, &store).in_process);

    dispatch(&store, commands.process());
    assert!(engine.select(&store.state().expect("state")).is_none());
}

#[test]
fn extra_commands_share_the_namespace_without_touching_state() {
    let engine = FormEngine::builder("signIn", sign_in_schema())
        .extra_commands(["complete"])
        .payload::<u32>()
        .build()
        .expect("engine builds");
    let store = Store::<Record, u32>::new();
    engine.register(&store).expect("registers");
    dispatch(&store, engine.command_set().open(None, None));
    let before = current(&engine, &store);

    let complete: Command<Record, u32> = engine
        .command_set()
        .extra("complete", 42)
        .expect("registered");
    assert_eq!(complete.type_name(), "signIn.complete");
    dispatch(&store, complete);
    assert!(Arc::ptr_eq(&before, &current(&engine, &store)));
}

#[test]
fn reserved_extra_commands_fail_the_build() {
    let result = FormEngine::builder("signIn", sign_in_schema())
        .extra_commands(["close"])
        .build();
    assert_eq!(
        result.err(),
        Some(ConfigError::ReservedCommand("close".to_string()))
    );
}
