use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;

use super::engine::ConfigError;
use super::state::{FieldMessages, FormName};
use super::value::CastValues;

pub const RESERVED_COMMANDS: [&str; 6] = [
    "open",
    "fieldChanged",
    "fieldTouched",
    "process",
    "process.reject",
    "close",
];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum CommandKind {
    Open,
    FieldChanged,
    FieldTouched,
    Process,
    ProcessReject,
    Close,
    Extra,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Open => "open",
            CommandKind::FieldChanged => "fieldChanged",
            CommandKind::FieldTouched => "fieldTouched",
            CommandKind::Process => "process",
            CommandKind::ProcessReject => "process.reject",
            CommandKind::Close => "close",
            CommandKind::Extra => "extra",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Submission<D> {
    pub values: CastValues,
    pub domain: D,
}

#[derive(Clone, Debug)]
pub enum CommandBody<D, X> {
    Open {
        domain: Option<D>,
        form_msg: Option<String>,
    },
    FieldChanged {
        field: String,
        value: String,
        msgs: Option<FieldMessages>,
    },
    FieldTouched {
        field: String,
        msgs: Option<FieldMessages>,
    },
    Process {
        submission: Option<Submission<D>>,
    },
    ProcessReject {
        msgs: FieldMessages,
    },
    Close,
    Extra {
        name: String,
        payload: X,
    },
}

#[derive(Clone, Debug)]
pub struct Command<D, X = ()> {
    pub form: FormName,
    pub body: CommandBody<D, X>,
}

impl<D, X> Command<D, X> {
    pub fn kind(&self) -> CommandKind {
        match self.body {
            CommandBody::Open { .. } => CommandKind::Open,
            CommandBody::FieldChanged { .. } => CommandKind::FieldChanged,
            CommandBody::FieldTouched { .. } => CommandKind::FieldTouched,
            CommandBody::Process { .. } => CommandKind::Process,
            CommandBody::ProcessReject { .. } => CommandKind::ProcessReject,
            CommandBody::Close => CommandKind::Close,
            CommandBody::Extra { .. } => CommandKind::Extra,
        }
    }

    pub fn type_name(&self) -> String {
        match &self.body {
            CommandBody::Extra { name, .. } => format!("{}.{name}", self.form),
            _ => format!("{}.{}", self.form, self.kind().as_str()),
        }
    }

    pub fn is_for(&self, form: &FormName) -> bool {
        &self.form == form
    }

    pub fn submission(&self) -> Option<&Submission<D>> {
        match &self.body {
            CommandBody::Process { submission } => submission.as_ref(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CommandSet {
    form: FormName,
    extras: Arc<BTreeSet<String>>,
}

impl CommandSet {
    pub fn new<I, S>(form: FormName, extras: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names = BTreeSet::new();
        for name in extras {
            let name = name.into();
            if !is_valid_command_name(&name) {
                return Err(ConfigError::InvalidCommandName(name));
            }
            if RESERVED_COMMANDS.contains(&name.as_str()) {
                return Err(ConfigError::ReservedCommand(name));
            }
            if names.contains(&name) {
                return Err(ConfigError::DuplicateCommand(name));
            }
            names.insert(name);
        }
        Ok(Self {
            form,
            extras: Arc::new(names),
        })
    }

    pub fn form(&self) -> &FormName {
        &self.form
    }

    pub fn has_extra(&self, name: &str) -> bool {
        self.extras.contains(name)
    }

    pub fn type_names(&self) -> Vec<String> {
        RESERVED_COMMANDS
            .iter()
            .copied()
            .chain(self.extras.iter().map(String::as_str))
            .map(|name| format!("{}.{name}", self.form))
            .collect()
    }

    pub fn open<D, X>(&self, domain: Option<D>, form_msg: Option<String>) -> Command<D, X> {
        self.command(CommandBody::Open { domain, form_msg })
    }

    pub fn field_changed<D, X>(
        &self,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Command<D, X> {
        self.command(CommandBody::FieldChanged {
            field: field.into(),
            value: value.into(),
            msgs: None,
        })
    }

    pub fn field_touched<D, X>(&self, field: impl Into<String>) -> Command<D, X> {
        self.command(CommandBody::FieldTouched {
            field: field.into(),
            msgs: None,
        })
    }

    pub fn process<D, X>(&self) -> Command<D, X> {
        self.command(CommandBody::Process { submission: None })
    }

    pub fn process_reject<D, X>(&self, msgs: FieldMessages) -> Command<D, X> {
        self.command(CommandBody::ProcessReject { msgs })
    }

    pub fn close<D, X>(&self) -> Command<D, X> {
        self.command(CommandBody::Close)
    }

    pub fn extra<D, X>(&self, name: &str, payload: X) -> Result<Command<D, X>, ConfigError> {
        if !self.has_extra(name) {
            return Err(ConfigError::UnknownCommand {
                form: self.form.clone(),
                name: name.to_string(),
            });
        }
        Ok(self.command(CommandBody::Extra {
            name: name.to_string(),
            payload,
        }))
    }

    fn command<D, X>(&self, body: CommandBody<D, X>) -> Command<D, X> {
        Command {
            form: self.form.clone(),
            body,
        }
    }
}

fn is_valid_command_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.ends_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
}
