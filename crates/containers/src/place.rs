use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Curated destination list offered by the dispense screen.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Department {
    Pathology,
    OperatingRoom,
    Endoscopy,
    Radiology,
    Urology,
    HeadAndNeck,
    Gynecology,
    Surgery,
    InternalMedicine,
    Ward,
}

impl Department {
    pub const ALL: [Department; 10] = [
        Self::Pathology,
        Self::OperatingRoom,
        Self::Endoscopy,
        Self::Radiology,
        Self::Urology,
        Self::HeadAndNeck,
        Self::Gynecology,
        Self::Surgery,
        Self::InternalMedicine,
        Self::Ward,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Pathology => "pathology",
            Self::OperatingRoom => "operating-room",
            Self::Endoscopy => "endoscopy",
            Self::Radiology => "radiology",
            Self::Urology => "urology",
            Self::HeadAndNeck => "head-and-neck",
            Self::Gynecology => "gynecology",
            Self::Surgery => "surgery",
            Self::InternalMedicine => "internal-medicine",
            Self::Ward => "ward",
        }
    }

    pub fn legacy_label(self) -> &'static str {
        match self {
            Self::Pathology => "病理",
            Self::OperatingRoom => "手術室",
            Self::Endoscopy => "内視鏡",
            Self::Radiology => "放診",
            Self::Urology => "泌尿器",
            Self::HeadAndNeck => "頭頸部",
            Self::Gynecology => "婦人科",
            Self::Surgery => "外科",
            Self::InternalMedicine => "内科",
            Self::Ward => "病棟",
        }
    }

    fn lookup(raw: &str) -> Option<Self> {
        Department::ALL
            .into_iter()
            .find(|d| d.label().eq_ignore_ascii_case(raw) || d.legacy_label() == raw)
    }
}

const STOCK_LABEL: &str = "pathology-stock";
const STOCK_LEGACY_LABEL: &str = "病理在庫";
const SUB_LOCATION_SEPARATORS: [char; 2] = ['/', ':'];

/// Where a container currently is.
///
/// Stored as free text; decoding never fails. Text outside the curated list
/// is kept as `Unlisted` so reports can flag it instead of guessing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Place {
    /// Empty column: the item did not previously exist, or the edit left the
    /// place untouched.
    Unset,
    PathologyStock,
    Department(Department),
    /// Ad hoc operating-theatre location, written `operating-room/<name>`.
    SurgicalSubLocation(String),
    Unlisted(String),
}

impl Place {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Unset;
        }
        if trimmed.eq_ignore_ascii_case(STOCK_LABEL) || trimmed == STOCK_LEGACY_LABEL {
            return Self::PathologyStock;
        }
        if let Some(dept) = Department::lookup(trimmed) {
            return Self::Department(dept);
        }
        if let Some((head, tail)) = trimmed.split_once(SUB_LOCATION_SEPARATORS) {
            let tail = tail.trim();
            if Department::lookup(head.trim()) == Some(Department::OperatingRoom) && !tail.is_empty() {
                return Self::SurgicalSubLocation(tail.to_string());
            }
        }
        Self::Unlisted(raw.to_string())
    }

    pub fn label(&self) -> Cow<'_, str> {
        match self {
            Self::Unset => Cow::Borrowed(""),
            Self::PathologyStock => Cow::Borrowed(STOCK_LABEL),
            Self::Department(d) => Cow::Borrowed(d.label()),
            Self::SurgicalSubLocation(name) => {
                Cow::Owned(format!("{}/{}", Department::OperatingRoom.label(), name))
            }
            Self::Unlisted(raw) => Cow::Borrowed(raw.as_str()),
        }
    }

    /// Operating room or one of its ad hoc sub-locations.
    pub fn is_surgical(&self) -> bool {
        matches!(
            self,
            Self::Department(Department::OperatingRoom) | Self::SurgicalSubLocation(_)
        )
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn is_unlisted(&self) -> bool {
        matches!(self, Self::Unlisted(_))
    }
}

impl From<Department> for Place {
    fn from(value: Department) -> Self {
        Self::Department(value)
    }
}

impl From<String> for Place {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Place> for String {
    fn from(value: Place) -> Self {
        value.label().into_owned()
    }
}

impl core::fmt::Display for Place {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_curated_and_legacy_places() {
        assert_eq!(Place::parse(""), Place::Unset);
        assert_eq!(Place::parse("病理在庫"), Place::PathologyStock);
        assert_eq!(Place::parse("手術室"), Place::Department(Department::OperatingRoom));
        assert_eq!(Place::parse("Endoscopy"), Place::Department(Department::Endoscopy));
    }

    #[test]
    fn decodes_surgical_sub_locations() {
        let p = Place::parse("operating-room/OR 3");
        assert_eq!(p, Place::SurgicalSubLocation("OR 3".to_string()));
        assert!(p.is_surgical());
        assert_eq!(p.label(), "operating-room/OR 3");
        assert_eq!(Place::parse("手術室:5"), Place::SurgicalSubLocation("5".to_string()));
    }

    #[test]
    fn keeps_unlisted_text() {
        let p = Place::parse("basement");
        assert!(p.is_unlisted());
        assert!(!p.is_surgical());
        assert_eq!(String::from(p), "basement");
        // A separator alone does not make a sub-location.
        assert!(Place::parse("ward/").is_unlisted());
    }
}
