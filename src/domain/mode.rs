//! Workload modes and the weighted operation mix.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of work a load worker performs on every iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkloadMode {
    /// Insert, commit, read back and verify, update, delete.
    #[default]
    Full,
    InsertOnly,
    SelectOnly,
    UpdateOnly,
    DeleteOnly,
    /// Weighted random dispatch, see [`MixWeights`].
    Mixed,
}

impl WorkloadMode {
    pub const ALL: [Self; 6] = [
        Self::Full,
        Self::InsertOnly,
        Self::SelectOnly,
        Self::UpdateOnly,
        Self::DeleteOnly,
        Self::Mixed,
    ];

    /// Whether the mode can only make progress on rows that already exist.
    #[must_use]
    pub const fn needs_existing_rows(self) -> bool {
        matches!(self, Self::SelectOnly | Self::UpdateOnly | Self::DeleteOnly)
    }

    /// Whether the mode picks target rows by id and so tracks the highest id.
    #[must_use]
    pub const fn tracks_max_id(self) -> bool {
        matches!(
            self,
            Self::SelectOnly | Self::UpdateOnly | Self::DeleteOnly | Self::Mixed
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::InsertOnly => "insert-only",
            Self::SelectOnly => "select-only",
            Self::UpdateOnly => "update-only",
            Self::DeleteOnly => "delete-only",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for WorkloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
                format!("unknown mode '{s}' (expected one of: {})", valid.join(", "))
            })
    }
}

/// A single database operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Select,
    Update,
    Delete,
}

/// Cumulative thresholds for the `mixed` workload.
///
/// One uniform draw in `[0, 1)` is compared against the thresholds in order:
/// below `insert` inserts, below `select` selects, below `update` updates,
/// anything else deletes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixWeights {
    pub insert: f64,
    pub select: f64,
    pub update: f64,
}

impl MixWeights {
    /// 60% insert, 20% select, 15% update, 5% delete.
    pub const DEFAULT: Self = Self {
        insert: 0.60,
        select: 0.80,
        update: 0.95,
    };

    #[must_use]
    pub fn pick(&self, draw: f64) -> Operation {
        if draw < self.insert {
            Operation::Insert
        } else if draw < self.select {
            Operation::Select
        } else if draw < self.update {
            Operation::Update
        } else {
            Operation::Delete
        }
    }
}

impl Default for MixWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_mode_name() {
        for mode in WorkloadMode::ALL {
            assert_eq!(mode.as_str().parse::<WorkloadMode>().unwrap(), mode);
        }
        assert_eq!(
            " Insert-Only ".parse::<WorkloadMode>().unwrap(),
            WorkloadMode::InsertOnly
        );
    }

    #[test]
    fn rejects_unknown_mode() {
        let err = "upsert".parse::<WorkloadMode>().unwrap_err();
        assert!(err.contains("mixed"));
    }

    #[test]
    fn only_single_operation_read_modify_modes_need_rows() {
        assert!(!WorkloadMode::Full.needs_existing_rows());
        assert!(!WorkloadMode::InsertOnly.needs_existing_rows());
        assert!(WorkloadMode::SelectOnly.needs_existing_rows());
        assert!(WorkloadMode::UpdateOnly.needs_existing_rows());
        assert!(WorkloadMode::DeleteOnly.needs_existing_rows());
        assert!(!WorkloadMode::Mixed.needs_existing_rows());
    }

    #[test]
    fn id_targeting_modes_track_max_id() {
        assert!(!WorkloadMode::Full.tracks_max_id());
        assert!(!WorkloadMode::InsertOnly.tracks_max_id());
        assert!(WorkloadMode::SelectOnly.tracks_max_id());
        assert!(WorkloadMode::UpdateOnly.tracks_max_id());
        assert!(WorkloadMode::DeleteOnly.tracks_max_id());
        assert!(WorkloadMode::Mixed.tracks_max_id());
    }

    #[test]
    fn default_mix_thresholds() {
        let mix = MixWeights::default();
        assert_eq!(mix.pick(0.0), Operation::Insert);
        assert_eq!(mix.pick(0.5999), Operation::Insert);
        assert_eq!(mix.pick(0.60), Operation::Select);
        assert_eq!(mix.pick(0.7999), Operation::Select);
        assert_eq!(mix.pick(0.80), Operation::Update);
        assert_eq!(mix.pick(0.9499), Operation::Update);
        assert_eq!(mix.pick(0.95), Operation::Delete);
        assert_eq!(mix.pick(0.9999), Operation::Delete);
    }

    #[test]
    fn mode_deserializes_from_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: WorkloadMode,
        }
        let w: Wrapper = toml::from_str("mode = \"update-only\"").unwrap();
        assert_eq!(w.mode, WorkloadMode::UpdateOnly);
    }
}
