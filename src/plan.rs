use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

use crate::db::edc::EdcArchive;
use crate::errors::PipelineError;
use crate::freshness;
use crate::registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Every available year, force rebuild.
    All,
    /// Most recent available year only.
    Last,
    /// Explicit year list.
    Custom,
}

impl FromStr for RefreshMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(RefreshMode::All),
            "last" => Ok(RefreshMode::Last),
            "custom" => Ok(RefreshMode::Custom),
            _ => Err(PipelineError::InvalidRefreshMode(s.to_string())),
        }
    }
}

impl Display for RefreshMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshMode::All => write!(f, "all"),
            RefreshMode::Last => write!(f, "last"),
            RefreshMode::Custom => write!(f, "custom"),
        }
    }
}

/// Ordered, duplicate-free list of years to process.  Immutable once
/// constructed; one plan per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPlan {
    pub years: Vec<String>,
    pub drop_tables: bool,
}

/// Compute the canonical set of years to process.
///
/// Validation happens before any I/O: a bad year selection never touches
/// the database or the network.  When `check_update` is set, candidates
/// are narrowed to the stale ones and the drop flag is ignored (a
/// freshness-gated refresh never forces a full drop).  Otherwise mode
/// `all` always starts from dropped tables.
pub fn plan(
    archive: &EdcArchive,
    mode: RefreshMode,
    custom_years: Option<&[String]>,
    drop_tables: bool,
    check_update: bool,
) -> Result<RefreshPlan, PipelineError> {
    let available = registry::available_years();

    let candidates = match mode {
        RefreshMode::All => available,
        RefreshMode::Last => available.last().cloned().into_iter().collect(),
        RefreshMode::Custom => {
            let requested = custom_years.unwrap_or_default();
            if requested.is_empty() {
                return Err(PipelineError::InvalidYearSelection {
                    invalid: Vec::new(),
                    valid: available,
                });
            }
            let requested: BTreeSet<String> = requested.iter().cloned().collect();
            let invalid: Vec<String> = requested
                .iter()
                .filter(|y| !available.contains(y))
                .cloned()
                .collect();
            if !invalid.is_empty() {
                return Err(PipelineError::InvalidYearSelection {
                    invalid,
                    valid: available,
                });
            }
            // BTreeSet already deduplicated and sorted ascending
            requested.into_iter().collect()
        }
    };

    if check_update {
        let years = freshness::years_needing_update(archive, &candidates)?;
        Ok(RefreshPlan {
            years,
            drop_tables: false,
        })
    } else {
        Ok(RefreshPlan {
            years: candidates,
            drop_tables: drop_tables || mode == RefreshMode::All,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn archive() -> EdcArchive {
        // plan() only consults the archive when check_update is set
        EdcArchive::new(&Settings::at_root(std::path::Path::new(
            "/tmp/potable_plan_tests",
        )))
    }

    #[test]
    fn mode_all_yields_every_year_and_drops() {
        let plan = plan(&archive(), RefreshMode::All, None, false, false).unwrap();
        assert_eq!(plan.years, registry::available_years());
        assert!(plan.drop_tables);
    }

    #[test]
    fn mode_last_yields_single_max_year() {
        let plan = plan(&archive(), RefreshMode::Last, None, false, false).unwrap();
        assert_eq!(plan.years, vec!["2024".to_string()]);
        assert!(!plan.drop_tables);
    }

    #[test]
    fn mode_last_honors_drop_flag() {
        let plan = plan(&archive(), RefreshMode::Last, None, true, false).unwrap();
        assert!(plan.drop_tables);
    }

    #[test]
    fn custom_years_sorted_intersection() {
        let years = vec!["2024".to_string(), "2018".to_string(), "2018".to_string()];
        let plan = plan(&archive(), RefreshMode::Custom, Some(&years), false, false).unwrap();
        assert_eq!(plan.years, vec!["2018".to_string(), "2024".to_string()]);
        assert!(!plan.drop_tables);
    }

    #[test]
    fn custom_with_invalid_year_enumerates_both_sets() {
        let years = vec!["2018".to_string(), "1999".to_string()];
        match plan(&archive(), RefreshMode::Custom, Some(&years), false, false) {
            Err(PipelineError::InvalidYearSelection { invalid, valid }) => {
                assert_eq!(invalid, vec!["1999".to_string()]);
                assert_eq!(valid, registry::available_years());
            }
            other => panic!("expected InvalidYearSelection, got {:?}", other),
        }
        let message = plan(&archive(), RefreshMode::Custom, Some(&years), false, false)
            .unwrap_err()
            .to_string();
        assert!(message.contains("1999"));
        assert!(message.contains("2015"));
    }

    #[test]
    fn custom_without_years_is_rejected() {
        assert!(matches!(
            plan(&archive(), RefreshMode::Custom, None, false, false),
            Err(PipelineError::InvalidYearSelection { .. })
        ));
        let empty: Vec<String> = Vec::new();
        assert!(matches!(
            plan(&archive(), RefreshMode::Custom, Some(&empty), false, false),
            Err(PipelineError::InvalidYearSelection { .. })
        ));
    }

    #[test]
    fn unknown_mode_string_is_rejected() {
        match "monthly".parse::<RefreshMode>() {
            Err(PipelineError::InvalidRefreshMode(m)) => assert_eq!(m, "monthly"),
            other => panic!("expected InvalidRefreshMode, got {:?}", other),
        }
    }
}
