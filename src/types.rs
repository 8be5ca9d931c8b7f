//! Core data model: the directory record schema, field paths, settings
//! categories, filter predicate, and aggregate statistics.
//!
//! The remote store keeps records as free-form JSON objects with Khmer field
//! keys. Here that implicit schema is pinned down as a fixed set of typed
//! fields (serde-renamed to the wire keys); anything the remote sends that we
//! do not recognize is preserved opaquely in `extra` and written back intact.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EngineError;

// ============================================================================
// Day / Schedule
// ============================================================================

/// The seven weekday slots of a [`Schedule`], in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    /// Khmer wire name, as stored inside the schedule object.
    pub fn wire_name(self) -> &'static str {
        match self {
            Day::Monday => "ចន្ទ",
            Day::Tuesday => "អង្គារ៍",
            Day::Wednesday => "ពុធ",
            Day::Thursday => "ព្រហស្បត្តិ៍",
            Day::Friday => "សុក្រ",
            Day::Saturday => "សៅរ៍",
            Day::Sunday => "អាទិត្យ",
        }
    }

    pub fn parse(name: &str) -> Option<Day> {
        Day::ALL.into_iter().find(|d| d.wire_name() == name)
    }
}

/// Weekly schedule — a fixed-cardinality map from day to shift label.
/// `None` means "off". No keys other than the seven days are permitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Schedule {
    #[serde(rename = "ចន្ទ", default, skip_serializing_if = "Option::is_none")]
    pub monday: Option<String>,
    #[serde(rename = "អង្គារ៍", default, skip_serializing_if = "Option::is_none")]
    pub tuesday: Option<String>,
    #[serde(rename = "ពុធ", default, skip_serializing_if = "Option::is_none")]
    pub wednesday: Option<String>,
    #[serde(rename = "ព្រហស្បត្តិ៍", default, skip_serializing_if = "Option::is_none")]
    pub thursday: Option<String>,
    #[serde(rename = "សុក្រ", default, skip_serializing_if = "Option::is_none")]
    pub friday: Option<String>,
    #[serde(rename = "សៅរ៍", default, skip_serializing_if = "Option::is_none")]
    pub saturday: Option<String>,
    #[serde(rename = "អាទិត្យ", default, skip_serializing_if = "Option::is_none")]
    pub sunday: Option<String>,
}

impl Schedule {
    pub fn get(&self, day: Day) -> Option<&str> {
        self.slot(day).as_deref()
    }

    pub fn set(&mut self, day: Day, label: Option<String>) {
        *self.slot_mut(day) = label;
    }

    pub fn is_empty(&self) -> bool {
        Day::ALL.iter().all(|d| self.slot(*d).is_none())
    }

    fn slot(&self, day: Day) -> &Option<String> {
        match day {
            Day::Monday => &self.monday,
            Day::Tuesday => &self.tuesday,
            Day::Wednesday => &self.wednesday,
            Day::Thursday => &self.thursday,
            Day::Friday => &self.friday,
            Day::Saturday => &self.saturday,
            Day::Sunday => &self.sunday,
        }
    }

    fn slot_mut(&mut self, day: Day) -> &mut Option<String> {
        match day {
            Day::Monday => &mut self.monday,
            Day::Tuesday => &mut self.tuesday,
            Day::Wednesday => &mut self.wednesday,
            Day::Thursday => &mut self.thursday,
            Day::Friday => &mut self.friday,
            Day::Saturday => &mut self.saturday,
            Day::Sunday => &mut self.sunday,
        }
    }
}

// ============================================================================
// Record
// ============================================================================

/// Gender wire values (the only two the directory enumerates).
pub const GENDER_MALE: &str = "ប្រុស";
pub const GENDER_FEMALE: &str = "ស្រី";

/// Legacy date-of-birth wire key still present on old records.
pub const LEGACY_DOB_KEY: &str = "ថ្ងៃកំណើត";

/// One directory entry. The `key` is the remote child key and is never part
/// of the serialized value (the remote stores `{path}/{key} -> fields`).
///
/// Every scalar field is optional: absence on the wire is absence here, and
/// is distinct from an empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(skip)]
    pub key: String,

    #[serde(rename = "ឈ្មោះ", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "ឈ្មោះឡាតាំង", default, skip_serializing_if = "Option::is_none")]
    pub latin_name: Option<String>,
    #[serde(rename = "ភេទ", default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(rename = "ថ្ងៃខែឆ្នាំកំណើត", default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(rename = "ទីកន្លែងកំណើត", default, skip_serializing_if = "Option::is_none")]
    pub birth_place: Option<String>,
    #[serde(rename = "តេឡេក្រាម", default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    #[serde(rename = "លេខទូរស័ព្ទ", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "រូបថត", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(rename = "ផ្នែកការងារ", default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(rename = "តួនាទី", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "ក្រុម", default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(rename = "ថ្នាក់", default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(rename = "ជំនាញ", default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    #[serde(rename = "ឆ្នាំសិក្សា", default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(rename = "ជំនាន់", default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,

    #[serde(rename = "កាលវិភាគ", default, skip_serializing_if = "Schedule::is_empty")]
    pub schedule: Schedule,

    /// Fields the remote knows about and we don't — carried through writes
    /// untouched so this client never strips another writer's data.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Effective date of birth: the current wire key, falling back to the
    /// legacy key that pre-migration records still carry.
    pub fn effective_date_of_birth(&self) -> Option<&str> {
        if let Some(dob) = self.date_of_birth.as_deref() {
            return Some(dob);
        }
        self.extra.get(LEGACY_DOB_KEY).and_then(Value::as_str)
    }

    /// Replace every field except `key` with `other`'s fields (full-form
    /// save semantics — this is a replace, not a merge).
    pub fn replace_fields(&mut self, mut other: Record) {
        other.key = std::mem::take(&mut self.key);
        *self = other;
    }
}

// ============================================================================
// FieldPath
// ============================================================================

/// Addressable location of a single editable value inside a [`Record`] —
/// either a top-level scalar field or one day slot of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldPath {
    Name,
    LatinName,
    Gender,
    DateOfBirth,
    BirthPlace,
    Telegram,
    Phone,
    PhotoUrl,
    Department,
    Role,
    Group,
    Class,
    Major,
    Year,
    Generation,
    Schedule(Day),
}

impl FieldPath {
    const SCALARS: [(FieldPath, &'static str); 15] = [
        (FieldPath::Name, "ឈ្មោះ"),
        (FieldPath::LatinName, "ឈ្មោះឡាតាំង"),
        (FieldPath::Gender, "ភេទ"),
        (FieldPath::DateOfBirth, "ថ្ងៃខែឆ្នាំកំណើត"),
        (FieldPath::BirthPlace, "ទីកន្លែងកំណើត"),
        (FieldPath::Telegram, "តេឡេក្រាម"),
        (FieldPath::Phone, "លេខទូរស័ព្ទ"),
        (FieldPath::PhotoUrl, "រូបថត"),
        (FieldPath::Department, "ផ្នែកការងារ"),
        (FieldPath::Role, "តួនាទី"),
        (FieldPath::Group, "ក្រុម"),
        (FieldPath::Class, "ថ្នាក់"),
        (FieldPath::Major, "ជំនាញ"),
        (FieldPath::Year, "ឆ្នាំសិក្សា"),
        (FieldPath::Generation, "ជំនាន់"),
    ];

    /// Render the sub-path used in remote patch requests, relative to the
    /// record root (schedule slots address a single nested day, so a patch
    /// never overwrites sibling days).
    pub fn remote_path(&self) -> String {
        match self {
            FieldPath::Schedule(day) => format!("កាលវិភាគ/{}", day.wire_name()),
            scalar => Self::SCALARS
                .iter()
                .find(|(p, _)| p == scalar)
                .map(|(_, wire)| (*wire).to_string())
                .unwrap_or_default(),
        }
    }

    /// Parse a wire sub-path ("ថ្នាក់", "កាលវិភាគ/ចន្ទ") back into a typed path.
    pub fn parse(path: &str) -> Result<FieldPath, EngineError> {
        if let Some(day_name) = path.strip_prefix("កាលវិភាគ/") {
            return Day::parse(day_name)
                .map(FieldPath::Schedule)
                .ok_or_else(|| EngineError::validation(format!("unknown schedule day: {day_name}")));
        }
        Self::SCALARS
            .iter()
            .find(|(_, wire)| *wire == path)
            .map(|(p, _)| *p)
            .ok_or_else(|| EngineError::validation(format!("unknown field path: {path}")))
    }

    /// Read the addressed value from `record`.
    pub fn get<'a>(&self, record: &'a Record) -> Option<&'a str> {
        match self {
            FieldPath::Name => record.name.as_deref(),
            FieldPath::LatinName => record.latin_name.as_deref(),
            FieldPath::Gender => record.gender.as_deref(),
            FieldPath::DateOfBirth => record.date_of_birth.as_deref(),
            FieldPath::BirthPlace => record.birth_place.as_deref(),
            FieldPath::Telegram => record.telegram.as_deref(),
            FieldPath::Phone => record.phone.as_deref(),
            FieldPath::PhotoUrl => record.photo_url.as_deref(),
            FieldPath::Department => record.department.as_deref(),
            FieldPath::Role => record.role.as_deref(),
            FieldPath::Group => record.group.as_deref(),
            FieldPath::Class => record.class.as_deref(),
            FieldPath::Major => record.major.as_deref(),
            FieldPath::Year => record.year.as_deref(),
            FieldPath::Generation => record.generation.as_deref(),
            FieldPath::Schedule(day) => record.schedule.get(*day),
        }
    }

    /// Write the addressed value into `record`. `None` clears the field
    /// (absent on the wire), which is not the same as an empty string.
    pub fn apply(&self, record: &mut Record, value: Option<String>) {
        match self {
            FieldPath::Name => record.name = value,
            FieldPath::LatinName => record.latin_name = value,
            FieldPath::Gender => record.gender = value,
            FieldPath::DateOfBirth => record.date_of_birth = value,
            FieldPath::BirthPlace => record.birth_place = value,
            FieldPath::Telegram => record.telegram = value,
            FieldPath::Phone => record.phone = value,
            FieldPath::PhotoUrl => record.photo_url = value,
            FieldPath::Department => record.department = value,
            FieldPath::Role => record.role = value,
            FieldPath::Group => record.group = value,
            FieldPath::Class => record.class = value,
            FieldPath::Major => record.major = value,
            FieldPath::Year => record.year = value,
            FieldPath::Generation => record.generation = value,
            FieldPath::Schedule(day) => record.schedule.set(*day, value),
        }
    }
}

// ============================================================================
// SettingsCategory
// ============================================================================

/// The five enumerated option-list categories of the settings collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsCategory {
    Classes,
    Skills,
    Sections,
    Groups,
    Schedules,
}

impl SettingsCategory {
    pub const ALL: [SettingsCategory; 5] = [
        SettingsCategory::Classes,
        SettingsCategory::Skills,
        SettingsCategory::Sections,
        SettingsCategory::Groups,
        SettingsCategory::Schedules,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingsCategory::Classes => "classes",
            SettingsCategory::Skills => "skills",
            SettingsCategory::Sections => "sections",
            SettingsCategory::Groups => "groups",
            SettingsCategory::Schedules => "schedules",
        }
    }

    pub fn parse(name: &str) -> Option<SettingsCategory> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

// ============================================================================
// FilterPredicate / Stats
// ============================================================================

/// Three independent, conjunctively combined substring filters. All parts
/// optional; the empty predicate matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPredicate {
    /// Matches against the Khmer name OR the Latin name.
    pub name: Option<String>,
    pub class: Option<String>,
    /// Matches against the record key.
    pub id: Option<String>,
}

impl FilterPredicate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.class.is_none() && self.id.is_none()
    }

    pub fn matches(&self, record: &Record) -> bool {
        let matches_name = match &self.name {
            None => true,
            Some(needle) => {
                contains_ci(record.name.as_deref(), needle)
                    || contains_ci(record.latin_name.as_deref(), needle)
            }
        };
        let matches_class = match &self.class {
            None => true,
            Some(needle) => contains_ci(record.class.as_deref(), needle),
        };
        let matches_id = match &self.id {
            None => true,
            Some(needle) => record.key.contains(needle.as_str()),
        };
        matches_name && matches_class && matches_id
    }
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    match haystack {
        Some(h) => h.to_lowercase().contains(&needle.to_lowercase()),
        None => false,
    }
}

/// Aggregate counts over the whole collection. A record without a gender
/// counts toward `male` (total minus female).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub male: usize,
    pub female: usize,
}

// ============================================================================
// Bulk outcome types
// ============================================================================

/// Per-key failure inside a bulk edit.
#[derive(Debug, Clone)]
pub struct BulkFailure {
    pub key: String,
    pub message: String,
}

/// Result of a bulk edit: which keys kept their new value and which were
/// rejected (and reverted). Partial success is the normal case, not an error.
#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    pub applied: Vec<String>,
    pub failed: Vec<BulkFailure>,
}

impl BulkOutcome {
    pub fn all_applied(&self) -> bool {
        self.failed.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
