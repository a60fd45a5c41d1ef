//! Which calendar tools the assistant may use. Each prompt variant is
//! a fixed, named configuration so the permitted tool set and the
//! policy text in the system prompt always agree.

use std::fmt;
use std::str::FromStr;

pub const READ_CALENDAR: &str = "read_calendar";
pub const CREATE_EVENT: &str = "create_event";
pub const UPDATE_EVENT: &str = "update_event";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PromptVariant {
    /// Read and create only. Existing items are never changed.
    ReadCreate,
    #[default]
    ReadCreateUpdate,
}

impl PromptVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptVariant::ReadCreate => "read-create",
            PromptVariant::ReadCreateUpdate => "read-create-update",
        }
    }

    pub fn allows_update(&self) -> bool {
        matches!(self, PromptVariant::ReadCreateUpdate)
    }

    pub fn allowed_tools(&self) -> &'static [&'static str] {
        match self {
            PromptVariant::ReadCreate => &[READ_CALENDAR, CREATE_EVENT],
            PromptVariant::ReadCreateUpdate => &[READ_CALENDAR, CREATE_EVENT, UPDATE_EVENT],
        }
    }
}

impl FromStr for PromptVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "read-create" => Ok(PromptVariant::ReadCreate),
            "read-create-update" => Ok(PromptVariant::ReadCreateUpdate),
            other => Err(format!("Unknown prompt variant `{}`", other)),
        }
    }
}

impl fmt::Display for PromptVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
