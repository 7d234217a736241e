pub mod feedback;
pub mod form;
pub mod i18n;
pub mod store;

pub use crate::feedback::{Notice, NoticeId, NoticeKind, NoticeQueue, NoticeSink};
pub use crate::form::{
    Command, CommandSet, ConfigError, FieldKey, FieldSchema, FormEngine, FormError, FormName,
    FormOptions, FormResult, FormSchema, FormState, IForm,
};
pub use crate::i18n::{I18nManager, Locale};
pub use crate::store::{AppState, Store};
