//! Observables, PDF sets and member selections.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Conventional name of a QCD perturbative order.
pub fn order_label(order: i32) -> String {
    match order {
        0 => "LO".to_string(),
        1 => "NLO".to_string(),
        2 => "NNLO".to_string(),
        other => format!("order({other})"),
    }
}

/// Identity of an observable: its name and perturbative order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObservableKey {
    pub name: String,
    pub order: i32,
}

impl ObservableKey {
    pub fn new(name: impl Into<String>, order: i32) -> Self {
        Self {
            name: name.into(),
            order,
        }
    }
}

impl fmt::Display for ObservableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, order_label(self.order))
    }
}

/// A grid file convoluted at a fixed perturbative order.
///
/// Two observables are the same when their names (file stems) and orders
/// match, wherever the files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observable {
    pub file: PathBuf,
    pub order: i32,
}

impl Observable {
    pub fn new(file: impl Into<PathBuf>, order: i32) -> Self {
        Self {
            file: file.into(),
            order,
        }
    }

    /// File stem of the grid.
    pub fn name(&self) -> String {
        self.file
            .file_stem()
            .unwrap_or(self.file.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn key(&self) -> ObservableKey {
        ObservableKey::new(self.name(), self.order)
    }
}

impl PartialEq for Observable {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Observable {}

impl PartialOrd for Observable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Observable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for Observable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key().fmt(f)
    }
}

/// Which members of a set to convolute.
///
/// In configuration files this is `"all"`, a single index, or a half-open
/// `{ min, max }` range.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "MemberSelectionRepr", into = "MemberSelectionRepr")]
pub enum MemberSelection {
    #[default]
    All,
    Single(usize),
    Range { min: usize, max: usize },
}

impl MemberSelection {
    /// Member indices to convolute for a set with `num_members` members.
    ///
    /// Indices past the end of the set are kept; selecting them fails in the
    /// bridge.
    pub fn indices(&self, num_members: usize) -> Range<usize> {
        match *self {
            Self::All => 0..num_members,
            Self::Single(index) => index..index.saturating_add(1),
            Self::Range { min, max } => min..max,
        }
    }

    /// Whether member 0, the central value, is selected.
    pub fn includes_central(&self) -> bool {
        match *self {
            Self::All => true,
            Self::Single(index) => index == 0,
            Self::Range { min, max } => min == 0 && max > 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum MemberSelectionRepr {
    Keyword(String),
    Single(usize),
    Range { min: usize, max: usize },
}

impl TryFrom<MemberSelectionRepr> for MemberSelection {
    type Error = String;

    fn try_from(repr: MemberSelectionRepr) -> Result<Self, Self::Error> {
        match repr {
            MemberSelectionRepr::Keyword(word) if word == "all" => Ok(Self::All),
            MemberSelectionRepr::Keyword(word) => {
                Err(format!("unknown member selection `{word}` (expected \"all\")"))
            }
            MemberSelectionRepr::Single(index) => Ok(Self::Single(index)),
            MemberSelectionRepr::Range { min, max } if min < max => Ok(Self::Range { min, max }),
            MemberSelectionRepr::Range { min, max } => {
                Err(format!("empty member range {min}..{max}"))
            }
        }
    }
}

impl From<MemberSelection> for MemberSelectionRepr {
    fn from(selection: MemberSelection) -> Self {
        match selection {
            MemberSelection::All => Self::Keyword("all".to_string()),
            MemberSelection::Single(index) => Self::Single(index),
            MemberSelection::Range { min, max } => Self::Range { min, max },
        }
    }
}

/// A named distribution ensemble to sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfSet {
    pub name: String,
    #[serde(default)]
    pub members: MemberSelection,
}

impl PdfSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: MemberSelection::All,
        }
    }

    pub fn with_members(mut self, members: MemberSelection) -> Self {
        self.members = members;
        self
    }
}

impl fmt::Display for PdfSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
