//! Behavior definitions and the time marks recorded against them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

/// Milliseconds since the start of the (synchronized) recordings.
pub type TimestampMs = u64;

/// Position of a definition in its catalog; also the trigger index.
pub type BehaviorId = usize;

/// Characters that cannot appear in a behavior name, since names become
/// file names on save and extraction.
pub const FORBIDDEN_NAME_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// The two annotation schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorKind {
    /// Instantaneous occurrence, one timestamp per mark.
    Event,
    /// Closed interval, a `[start, end]` pair per mark.
    State,
}

impl BehaviorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "Event",
            Self::State => "State",
        }
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BehaviorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "event" => Ok(Self::Event),
            "state" => Ok(Self::State),
            other => Err(format!("unknown behavior type '{other}' (use Event or State)")),
        }
    }
}

/// A committed mark.
///
/// Serializes as a bare number for events and a two-element array for
/// states, matching the `time_ms` field of behavior files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeMark {
    Instant(TimestampMs),
    Interval([TimestampMs; 2]),
}

impl TimeMark {
    /// Build an interval from two endpoints in either order.
    pub fn interval(a: TimestampMs, b: TimestampMs) -> Self {
        Self::Interval([a.min(b), a.max(b)])
    }

    /// The kind of definition this mark belongs to.
    pub fn kind(&self) -> BehaviorKind {
        match self {
            Self::Instant(_) => BehaviorKind::Event,
            Self::Interval(_) => BehaviorKind::State,
        }
    }

    /// Displayed extent; an instant is drawn as `[t, t + 1]`.
    pub fn display_span(&self) -> (TimestampMs, TimestampMs) {
        match self {
            Self::Instant(t) => (*t, t.saturating_add(1)),
            Self::Interval([start, end]) => (*start, *end),
        }
    }

    /// Whether `at` falls on this mark. An instant at `t` covers `[t, t+1)`,
    /// an interval covers its closed range.
    pub fn covers(&self, at: TimestampMs) -> bool {
        match self {
            Self::Instant(t) => at == *t,
            Self::Interval([start, end]) => *start <= at && at <= *end,
        }
    }

    /// Intervals must be ascending.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Instant(_) => true,
            Self::Interval([start, end]) => start <= end,
        }
    }
}

impl fmt::Display for TimeMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant(t) => write!(f, "instant {t}ms"),
            Self::Interval([start, end]) => write!(f, "interval [{start}ms, {end}ms]"),
        }
    }
}

/// One named behavior and its committed marks.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorDefinition {
    pub(crate) id: BehaviorId,
    pub(crate) name: String,
    pub(crate) kind: BehaviorKind,
    pub(crate) note: String,
    pub(crate) color_code: String,
    pub(crate) marks: Vec<TimeMark>,
}

impl BehaviorDefinition {
    pub fn id(&self) -> BehaviorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> BehaviorKind {
        self.kind
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn color_code(&self) -> &str {
        &self.color_code
    }

    /// Committed marks in insertion order.
    pub fn marks(&self) -> &[TimeMark] {
        &self.marks
    }

    /// Append a mark after checking it matches this definition's kind.
    pub(crate) fn push_mark(&mut self, mark: TimeMark) -> CatalogResult<()> {
        if mark.kind() != self.kind || !mark.is_well_formed() {
            return Err(CatalogError::MarkKindMismatch {
                name: self.name.clone(),
                kind: self.kind,
                mark: mark.to_string(),
            });
        }
        self.marks.push(mark);
        Ok(())
    }

    /// Remove the first mark covering `at`, if any.
    pub(crate) fn remove_mark_at(&mut self, at: TimestampMs) -> Option<TimeMark> {
        let index = self.marks.iter().position(|mark| mark.covers(at))?;
        Some(self.marks.remove(index))
    }
}

/// User-supplied fields of a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionSpec {
    pub name: String,
    pub kind: BehaviorKind,
    pub note: String,
    pub color_code: String,
}

impl DefinitionSpec {
    pub fn new(name: impl Into<String>, kind: BehaviorKind) -> Self {
        Self {
            name: name.into(),
            kind,
            note: String::new(),
            color_code: "#ffffff".to_string(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_color(mut self, color_code: impl Into<String>) -> Self {
        self.color_code = color_code.into();
        self
    }
}

/// A single settable field of a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionField {
    Name(String),
    Kind(BehaviorKind),
    Note(String),
    Color(String),
}

/// Check that a name is non-empty and filesystem-safe.
pub fn validate_name(name: &str) -> CatalogResult<()> {
    if name.trim().is_empty() {
        return Err(CatalogError::InvalidName {
            name: name.to_string(),
            reason: "name cannot be empty".to_string(),
        });
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return Err(CatalogError::InvalidName {
            name: name.to_string(),
            reason: format!("contains forbidden character '{c}'"),
        });
    }
    Ok(())
}
