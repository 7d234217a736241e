mod commands;
mod engine;
mod facade;
mod logic;
mod mapper;
mod reducer;
mod schema;
mod state;
mod validation;
mod value;

#[cfg(test)]
mod tests;

pub use commands::{Command, CommandBody, CommandKind, CommandSet, RESERVED_COMMANDS, Submission};
pub(crate) use engine::{read_lock, write_lock};
pub use engine::{
    ConfigError, FormEngine, FormEngineBuilder, FormError, FormOptions, FormResult, MapError,
    StaleValidation,
};
pub use facade::{IForm, SubmitEvent};
pub use iform_derive::FormDomain;
pub use logic::{
    Dispatch, DispatchFuture, DynamicValidation, Logic, LogicContext, LogicFuture, Outcome,
    StateSource, SubmissionValidation, ValidationTicket,
};
pub use mapper::{DerivedMapper, DomainMapper, FnMapper, StraightMapper};
pub use reducer::{FormReducer, Reducer};
pub use schema::{
    AsyncRule, FieldDescription, FieldSchema, FieldType, FormSchema, FormSchemaBuilder, Rule,
    RuleFuture,
};
pub use state::{FieldKey, FieldLabels, FieldMessages, FieldValues, FormName, FormState};
pub use validation::Validator;
pub use value::{CastValues, FieldValue, FormDomain, FromFieldValue, Record, ToFieldValue};
