use core::str::FromStr;

use serde::{Deserialize, Serialize};

use fixtrack_core::DomainError;

/// Container size (the report partition key).
///
/// Stored as free text. Canonical labels are `25ml`, `30ml` and `40ml`; the
/// labels printed on older stock are accepted as aliases.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContainerSize {
    /// 25 ml neutral buffered formalin.
    Neutral25,
    /// 30 ml biopsy container.
    Biopsy30,
    /// 40 ml lymph-node container.
    Lymph40,
}

impl ContainerSize {
    pub const ALL: [ContainerSize; 3] = [Self::Neutral25, Self::Biopsy30, Self::Lymph40];

    pub fn label(self) -> &'static str {
        match self {
            Self::Neutral25 => "25ml",
            Self::Biopsy30 => "30ml",
            Self::Lymph40 => "40ml",
        }
    }

    /// Every spelling that decodes to this size, canonical label first.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Neutral25 => &["25ml", "25ml中性緩衝"],
            Self::Biopsy30 => &["30ml", "生検用 30ml"],
            Self::Lymph40 => &["40ml", "リンパ節用 40ml", "3号 40ml"],
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Neutral25 => "25 ml neutral buffered formalin",
            Self::Biopsy30 => "30 ml biopsy formalin",
            Self::Lymph40 => "40 ml lymph node formalin",
        }
    }
}

impl core::fmt::Display for ContainerSize {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ContainerSize {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ContainerSize::ALL
            .into_iter()
            .find(|size| {
                size.aliases()
                    .iter()
                    .any(|alias| alias.eq_ignore_ascii_case(trimmed))
            })
            .ok_or_else(|| DomainError::validation(format!("unknown container size: {trimmed:?}")))
    }
}

impl TryFrom<String> for ContainerSize {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContainerSize> for String {
    fn from(value: ContainerSize) -> Self {
        value.label().to_string()
    }
}
