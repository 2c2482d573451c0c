//! Resolution handling and the remapping plan.
//!
//! Every snapshot theme and group gets exactly one [`Outcome`] before the
//! first write happens. New IDs are generated up front so the whole
//! original-to-final mapping is known in advance.

use crate::io::conflicts::{Conflict, ConflictType};
use crate::io::snapshot::{Snapshot, SnapshotTheme, SnapshotThemeGroup};
use crate::models::{ThemeGroupId, ThemeId};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Suffix appended to names created by [`Resolution::CreateDuplicate`].
pub const DUPLICATE_SUFFIX: &str = " (copie)";

/// What to do with a conflicting item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
    /// Map the item to the existing entity and create nothing.
    ReuseExisting,
    /// Create a new entity with a suffixed name.
    CreateDuplicate,
    /// Import nothing for this item.
    Skip,
}

impl Resolution {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ReuseExisting => "REUSE_EXISTING",
            Self::CreateDuplicate => "CREATE_DUPLICATE",
            Self::Skip => "SKIP",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "REUSE_EXISTING" | "REUSE" => Ok(Self::ReuseExisting),
            "CREATE_DUPLICATE" | "DUPLICATE" => Ok(Self::CreateDuplicate),
            "SKIP" => Ok(Self::Skip),
            _ => Err(Error::InvalidInput(format!("Unknown resolution: {s}"))),
        }
    }
}

/// A caller decision for one conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionEntry {
    /// Original ID of the conflicting snapshot item.
    pub original_id: String,
    /// Conflict kind.
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    /// The decision.
    pub resolution: Resolution,
    /// Live ID the caller saw in the preview, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_id: Option<String>,
}

impl ResolutionEntry {
    /// Creates a resolution entry.
    #[must_use]
    pub fn new(
        conflict_type: ConflictType,
        original_id: impl Into<String>,
        resolution: Resolution,
    ) -> Self {
        Self {
            original_id: original_id.into(),
            conflict_type,
            resolution,
            existing_id: None,
        }
    }

    /// Creates an entry for a detected conflict.
    #[must_use]
    pub fn for_conflict(conflict: &Conflict, resolution: Resolution) -> Self {
        Self {
            original_id: conflict.original_id().to_string(),
            conflict_type: conflict.conflict_type,
            resolution,
            existing_id: Some(conflict.existing_id().to_string()),
        }
    }
}

/// Caller decisions keyed by `(conflict type, original ID)`.
#[derive(Debug, Clone, Default)]
pub struct Resolutions {
    entries: HashMap<(ConflictType, String), Resolution>,
}

impl Resolutions {
    /// Indexes a list of entries.
    ///
    /// Two entries for the same key with different decisions are rejected.
    pub fn from_entries(entries: &[ResolutionEntry]) -> Result<Self> {
        let mut map = HashMap::with_capacity(entries.len());
        for entry in entries {
            let key = (entry.conflict_type, entry.original_id.clone());
            if let Some(previous) = map.insert(key, entry.resolution) {
                if previous != entry.resolution {
                    return Err(Error::InvalidInput(format!(
                        "contradictory resolutions for {} '{}': {previous} and {}",
                        entry.conflict_type, entry.original_id, entry.resolution
                    )));
                }
            }
        }
        Ok(Self { entries: map })
    }

    /// Returns the decision for a conflict, if any.
    #[must_use]
    pub fn get(&self, conflict_type: ConflictType, original_id: &str) -> Option<Resolution> {
        self.entries
            .get(&(conflict_type, original_id.to_string()))
            .copied()
    }

    fn keys(&self) -> impl Iterator<Item = &(ConflictType, String)> {
        self.entries.keys()
    }
}

/// The planned fate of one snapshot theme or group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<I> {
    /// Create a new entity with this ID and name.
    Create {
        /// Pre-generated ID.
        id: I,
        /// Final name.
        name: String,
    },
    /// Map to an existing entity.
    Reuse {
        /// Live ID.
        id: I,
    },
    /// Import nothing.
    Skip,
}

impl<I> Outcome<I> {
    /// The final ID, unless skipped.
    #[must_use]
    pub const fn final_id(&self) -> Option<&I> {
        match self {
            Self::Create { id, .. } | Self::Reuse { id } => Some(id),
            Self::Skip => None,
        }
    }

    /// Whether this outcome is a skip.
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }
}

/// A snapshot entity that can carry a name conflict.
pub trait Resolvable {
    /// ID type in the target store.
    type Id: Clone;

    /// Conflict type raised for this kind.
    const CONFLICT: ConflictType;

    /// Original ID in the snapshot.
    fn original_id(&self) -> &str;

    /// Name in the snapshot.
    fn name(&self) -> &str;

    /// Generates a fresh target-store ID.
    fn fresh_id() -> Self::Id;

    /// Wraps a live ID string.
    fn live_id(id: &str) -> Self::Id;
}

impl Resolvable for SnapshotTheme {
    type Id = ThemeId;
    const CONFLICT: ConflictType = ConflictType::ThemeNameExists;

    fn original_id(&self) -> &str {
        &self.original_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn fresh_id() -> ThemeId {
        ThemeId::generate()
    }

    fn live_id(id: &str) -> ThemeId {
        ThemeId::new(id)
    }
}

impl Resolvable for SnapshotThemeGroup {
    type Id = ThemeGroupId;
    const CONFLICT: ConflictType = ConflictType::ThemeGroupNameExists;

    fn original_id(&self) -> &str {
        &self.original_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn fresh_id() -> ThemeGroupId {
        ThemeGroupId::generate()
    }

    fn live_id(id: &str) -> ThemeGroupId {
        ThemeGroupId::new(id)
    }
}

/// Decides the outcome for one item.
///
/// Items without a conflict are always created under their own name, and
/// any decision supplied for them is ignored. A conflicting item without a
/// decision fails with [`Error::MissingResolution`].
pub fn resolve<T: Resolvable>(
    item: &T,
    conflict: Option<&Conflict>,
    resolution: Option<Resolution>,
) -> Result<Outcome<T::Id>> {
    let Some(conflict) = conflict else {
        return Ok(Outcome::Create {
            id: T::fresh_id(),
            name: item.name().to_string(),
        });
    };
    match resolution {
        None => Err(Error::MissingResolution {
            conflict_type: T::CONFLICT,
            original_id: item.original_id().to_string(),
        }),
        Some(Resolution::ReuseExisting) => Ok(Outcome::Reuse {
            id: T::live_id(conflict.existing_id()),
        }),
        Some(Resolution::CreateDuplicate) => Ok(Outcome::Create {
            id: T::fresh_id(),
            name: format!("{}{DUPLICATE_SUFFIX}", item.name()),
        }),
        Some(Resolution::Skip) => Ok(Outcome::Skip),
    }
}

/// Outcomes for every theme and group of a snapshot, keyed by original ID.
#[derive(Debug, Clone, Default)]
pub struct RemappingPlan {
    themes: HashMap<String, Outcome<ThemeId>>,
    theme_groups: HashMap<String, Outcome<ThemeGroupId>>,
}

impl RemappingPlan {
    /// Outcome for a snapshot theme.
    #[must_use]
    pub fn theme(&self, original_id: &str) -> Option<&Outcome<ThemeId>> {
        self.themes.get(original_id)
    }

    /// Outcome for a snapshot group.
    #[must_use]
    pub fn theme_group(&self, original_id: &str) -> Option<&Outcome<ThemeGroupId>> {
        self.theme_groups.get(original_id)
    }

    /// Number of planned skips.
    #[must_use]
    pub fn skip_count(&self) -> usize {
        self.themes.values().filter(|o| o.is_skip()).count()
            + self.theme_groups.values().filter(|o| o.is_skip()).count()
    }
}

/// Builds the remapping plan for a snapshot.
///
/// Fails before anything is written if a conflict lacks a decision.
pub fn build_plan(
    snapshot: &Snapshot,
    conflicts: &[Conflict],
    resolutions: &Resolutions,
) -> Result<RemappingPlan> {
    let by_key: HashMap<(ConflictType, &str), &Conflict> = conflicts
        .iter()
        .map(|c| ((c.conflict_type, c.original_id()), c))
        .collect();

    for (conflict_type, original_id) in resolutions.keys() {
        if !by_key.contains_key(&(*conflict_type, original_id.as_str())) {
            tracing::debug!(
                conflict_type = %conflict_type,
                original_id = %original_id,
                "Ignoring resolution for item without a conflict"
            );
        }
    }

    let mut plan = RemappingPlan::default();
    for theme in &snapshot.themes {
        plan.themes.insert(
            theme.original_id.clone(),
            plan_item(theme, &by_key, resolutions)?,
        );
    }
    for group in &snapshot.theme_groups {
        plan.theme_groups.insert(
            group.original_id.clone(),
            plan_item(group, &by_key, resolutions)?,
        );
    }
    Ok(plan)
}

fn plan_item<T: Resolvable>(
    item: &T,
    conflicts: &HashMap<(ConflictType, &str), &Conflict>,
    resolutions: &Resolutions,
) -> Result<Outcome<T::Id>> {
    let conflict = conflicts.get(&(T::CONFLICT, item.original_id())).copied();
    let resolution = resolutions.get(T::CONFLICT, item.original_id());
    resolve(item, conflict, resolution)
}
