use core::str::FromStr;
use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use fixtrack_core::DomainError;

/// Lifecycle status of a container.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ItemStatus {
    /// In pathology stock (received, or returned).
    Intake,
    /// Handed out to a destination place.
    Dispensed,
    /// Contents formally handed off / reported.
    Submitted,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 3] = [Self::Intake, Self::Dispensed, Self::Submitted];

    pub fn label(self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Dispensed => "dispensed",
            Self::Submitted => "submitted",
        }
    }

    /// Label written by the legacy scanner screens.
    pub fn legacy_label(self) -> &'static str {
        match self {
            Self::Intake => "入庫済み",
            Self::Dispensed => "出庫済み",
            Self::Submitted => "提出済み",
        }
    }

    /// Dispensed and Submitted both count as "out of stock".
    pub fn is_counted(self) -> bool {
        matches!(self, Self::Dispensed | Self::Submitted)
    }
}

impl core::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ItemStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ItemStatus::ALL
            .into_iter()
            .find(|st| st.label().eq_ignore_ascii_case(trimmed) || st.legacy_label() == trimmed)
            .ok_or_else(|| DomainError::validation(format!("unknown status: {trimmed:?}")))
    }
}

impl TryFrom<String> for ItemStatus {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ItemStatus> for String {
    fn from(value: ItemStatus) -> Self {
        value.label().to_string()
    }
}

/// A status column as found in a history row.
///
/// History rows store free text: empty means "did not previously exist", and
/// anything outside the closed set is kept verbatim so it can be flagged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatusValue {
    Absent,
    Known(ItemStatus),
    Unrecognized(String),
}

impl StatusValue {
    /// Infallible decode of a stored status column.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::Absent;
        }
        match raw.parse::<ItemStatus>() {
            Ok(status) => Self::Known(status),
            Err(_) => Self::Unrecognized(raw.to_string()),
        }
    }

    pub fn known(&self) -> Option<ItemStatus> {
        match self {
            Self::Known(status) => Some(*status),
            _ => None,
        }
    }

    pub fn is(&self, status: ItemStatus) -> bool {
        self.known() == Some(status)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_unrecognized(&self) -> bool {
        matches!(self, Self::Unrecognized(_))
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Absent => Cow::Borrowed(""),
            Self::Known(status) => Cow::Borrowed(status.label()),
            Self::Unrecognized(raw) => Cow::Borrowed(raw.as_str()),
        }
    }
}

impl From<ItemStatus> for StatusValue {
    fn from(value: ItemStatus) -> Self {
        Self::Known(value)
    }
}

impl From<String> for StatusValue {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<StatusValue> for String {
    fn from(value: StatusValue) -> Self {
        value.as_text().into_owned()
    }
}

impl core::fmt::Display for StatusValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.as_text())
    }
}
