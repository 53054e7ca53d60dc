use log::info;

use crate::db::edc::EdcArchive;
use crate::db::tables;
use crate::errors::PipelineError;
use crate::fetch;
use crate::registry;

/// Years whose local partition is stale compared to www.data.gouv.fr.
///
/// Per year: a missing table or missing partition means a refresh is
/// needed without any network call; otherwise the stored
/// `dataset_datetime` is compared against the upstream one.  All files
/// of a year are loaded and dropped as a group, so checking a single
/// table stands in for the whole year.
pub fn years_needing_update(
    archive: &EdcArchive,
    years: &[String],
) -> Result<Vec<String>, PipelineError> {
    info!("checking that EDC datasets are up to date according to www.data.gouv.fr");

    // no database file yet: everything is a first-time load
    if !archive.duckdb_path.exists() {
        info!("   database file does not exist yet");
        return Ok(years.to_vec());
    }

    let conn = archive.open_readonly()?;
    let mut update_years: Vec<String> = Vec::new();

    for year in years {
        info!("   checking EDC dataset datetime for {}", year);
        let descriptor = registry::describe(year)?;

        let existing = registry::file_specs()
            .iter()
            .find_map(|spec| match tables::table_exists(&conn, spec.table_name) {
                Ok(true) => Some(Ok(spec)),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            })
            .transpose()?;

        let spec = match existing {
            Some(spec) => spec,
            None => {
                info!("      no table exists yet");
                update_years.push(year.clone());
                continue;
            }
        };

        if !tables::partition_exists(&conn, spec.table_name, year)? {
            info!("      {} does not exist in the database", year);
            update_years.push(year.clone());
            continue;
        }

        let stored = tables::partition_datetime(&conn, spec.table_name, year)?
            .ok_or_else(|| PipelineError::FreshnessCheckFailed {
                year: year.clone(),
                reason: format!("no dataset_datetime stored in {}", spec.table_name),
            })?;
        info!("      database  - EDC dataset datetime: {}", stored);

        let url = archive.dataset_url(descriptor);
        let upstream =
            fetch::extract_dataset_datetime(&url).map_err(|e| PipelineError::FreshnessCheckFailed {
                year: year.clone(),
                reason: e.to_string(),
            })?;
        info!("      data.gouv - EDC dataset datetime: {}", upstream);

        let stored = fetch::parse_dataset_datetime(&stored).map_err(|e| {
            PipelineError::FreshnessCheckFailed {
                year: year.clone(),
                reason: e.to_string(),
            }
        })?;
        let upstream = fetch::parse_dataset_datetime(&upstream).map_err(|e| {
            PipelineError::FreshnessCheckFailed {
                year: year.clone(),
                reason: e.to_string(),
            }
        })?;

        if upstream > stored {
            update_years.push(year.clone());
        }
    }

    if update_years.is_empty() {
        info!("   all EDC datasets are already up to date");
    } else {
        info!("   EDC dataset update is necessary for {:?}", update_years);
    }

    let _ = conn.close();
    Ok(update_years)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use duckdb::{params, Connection};
    use std::fs;

    fn scratch_archive(name: &str) -> EdcArchive {
        let root = std::env::temp_dir().join(format!("potable_freshness_{}", name));
        let _ = fs::remove_dir_all(&root);
        let settings = Settings::at_root(&root);
        settings.ensure_dirs().unwrap();
        EdcArchive::new(&settings)
    }

    #[test]
    fn missing_database_file_marks_every_year_stale() {
        let archive = scratch_archive("no_db");
        let years = vec!["2018".to_string(), "2024".to_string()];
        let stale = years_needing_update(&archive, &years).unwrap();
        assert_eq!(stale, years);
    }

    #[test]
    fn missing_table_short_circuits_without_network() {
        let archive = scratch_archive("no_table");
        // empty database, no table: the year must come back stale before
        // any timestamp comparison is attempted
        let conn = Connection::open(&archive.duckdb_path).unwrap();
        conn.close().unwrap();
        let years = vec!["2020".to_string()];
        let stale = years_needing_update(&archive, &years).unwrap();
        assert_eq!(stale, years);
    }

    #[test]
    fn missing_partition_short_circuits_without_network() {
        let archive = scratch_archive("no_partition");
        let conn = Connection::open(&archive.duckdb_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE edc_communes (commune VARCHAR, partition_year INTEGER, \
             ingestion_date DATE, dataset_datetime VARCHAR);",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO edc_communes VALUES ('Rennes', 2019, current_date, '20200101-000000');",
            params![],
        )
        .unwrap();
        conn.close().unwrap();
        let stale = years_needing_update(&archive, &["2020".to_string()]).unwrap();
        assert_eq!(stale, vec!["2020".to_string()]);
    }

    #[ignore]
    #[test]
    fn timestamp_comparison_against_data_gouv() -> Result<(), PipelineError> {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Info)
            .is_test(true)
            .try_init();
        let archive = scratch_archive("live");
        let conn = Connection::open(&archive.duckdb_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE edc_communes (commune VARCHAR, partition_year INTEGER, \
             ingestion_date DATE, dataset_datetime VARCHAR);",
        )
        .unwrap();
        // a stamp far in the past: upstream must be strictly newer
        conn.execute(
            "INSERT INTO edc_communes VALUES ('Rennes', 2024, current_date, '20000101-000000');",
            params![],
        )
        .unwrap();
        conn.close().unwrap();
        let stale = years_needing_update(&archive, &["2024".to_string()])?;
        assert_eq!(stale, vec!["2024".to_string()]);
        Ok(())
    }
}
