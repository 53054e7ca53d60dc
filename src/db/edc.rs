use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use duckdb::{params, AccessMode, Config, Connection};
use indicatif::ProgressBar;
use log::info;

use crate::config::Settings;
use crate::db::tables;
use crate::errors::PipelineError;
use crate::fetch;
use crate::plan::RefreshPlan;
use crate::registry::{self, YearDescriptor};

/// See https://www.data.gouv.fr/fr/datasets/resultats-du-controle-sanitaire-de-leau-distribuee-commune-par-commune/
pub struct EdcArchive {
    pub base_url: String,
    pub cache_dir: PathBuf,
    pub duckdb_path: PathBuf,
}

impl EdcArchive {
    pub fn new(settings: &Settings) -> EdcArchive {
        EdcArchive {
            base_url: registry::BASE_URL.to_string(),
            cache_dir: settings.cache_dir.clone(),
            duckdb_path: settings.duckdb_path.clone(),
        }
    }

    pub fn dataset_url(&self, descriptor: &YearDescriptor) -> String {
        format!("{}{}", self.base_url, descriptor.remote_id)
    }

    /// Where the year's archive lands in the scratch cache.
    pub fn zip_path(&self, descriptor: &YearDescriptor) -> PathBuf {
        self.cache_dir.join(descriptor.archive_name)
    }

    /// Where the year's archive gets extracted.
    pub fn extract_dir(&self, year: &str) -> PathBuf {
        self.cache_dir.join(format!("raw_data_{}", year))
    }

    pub fn open(&self) -> Result<Connection, duckdb::Error> {
        Connection::open(&self.duckdb_path)
    }

    pub fn open_readonly(&self) -> Result<Connection, duckdb::Error> {
        let config = Config::default().access_mode(AccessMode::ReadOnly)?;
        Connection::open_with_flags(&self.duckdb_path, config)
    }

    /// Download, extract and insert the EDC dataset for one year.
    ///
    /// The load is partition-scoped: rows of other years are never
    /// touched.  The scratch cache is cleared only on success; a failed
    /// run leaves it in place for inspection and the next invocation
    /// redoes the year from the start.
    pub fn load_year(&self, year: &str) -> Result<(), PipelineError> {
        let descriptor = registry::describe(year)?;
        info!("processing EDC dataset for {}...", year);

        let url = self.dataset_url(descriptor);
        let dataset_datetime = fetch::extract_dataset_datetime(&url).map_err(|e| {
            PipelineError::DatasetDatetimeUnavailable {
                year: year.to_string(),
                reason: e.to_string(),
            }
        })?;
        info!("   EDC dataset datetime: {}", dataset_datetime);

        fetch::download_file(&url, &self.zip_path(descriptor))?;

        info!("   extracting files...");
        self.extract_archive(&self.zip_path(descriptor), &self.extract_dir(year))?;

        info!("   creating or updating tables in the database...");
        self.insert_year_files(year, &dataset_datetime)?;

        info!("   cleaning up cache...");
        self.clear_cache(true)?;

        Ok(())
    }

    fn extract_archive(&self, zip_path: &Path, dest_dir: &Path) -> Result<(), PipelineError> {
        let extraction_failed = |reason: String| PipelineError::ExtractionFailed {
            archive: zip_path.to_path_buf(),
            reason,
        };
        let file = File::open(zip_path)?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| extraction_failed(e.to_string()))?;
        fs::create_dir_all(dest_dir)?;

        let pb = ProgressBar::new(archive.len() as u64);
        pb.set_style(fetch::count_style());
        pb.set_message("Extracting");
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| extraction_failed(e.to_string()))?;
            let relative = match entry.enclosed_name() {
                Some(path) => path,
                None => continue,
            };
            let out_path = dest_dir.join(relative);
            if entry.is_dir() {
                fs::create_dir_all(&out_path)?;
            } else {
                if let Some(parent) = out_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out = File::create(&out_path)?;
                io::copy(&mut entry, &mut out)?;
            }
            pb.inc(1);
        }
        pb.finish();
        Ok(())
    }

    /// Create or update the tables from the extracted files of one year,
    /// stamping the provenance columns on every row.
    ///
    /// Existing tables get a partition-scoped replace (delete the year,
    /// re-insert); missing tables are created from the file, with column
    /// names taken from the header line.
    pub fn insert_year_files(&self, year: &str, dataset_datetime: &str) -> Result<(), PipelineError> {
        let conn = self.open()?;
        let extract_dir = self.extract_dir(year);

        let pb = ProgressBar::new(registry::file_specs().len() as u64);
        pb.set_style(fetch::count_style());
        pb.set_message("Handling");
        for spec in registry::file_specs() {
            let filepath = extract_dir
                .join(registry::yearly_filename(spec, year))
                .to_string_lossy()
                .into_owned();

            let query_start = if tables::table_exists(&conn, spec.table_name)? {
                tables::drop_partition(&conn, spec.table_name, year)?;
                format!("INSERT INTO {} ", spec.table_name)
            } else {
                format!("CREATE TABLE {} AS ", spec.table_name)
            };
            let query_select = "\
                SELECT \
                    *, \
                    CAST(? AS INTEGER)  AS partition_year, \
                    current_date        AS ingestion_date, \
                    ?                   AS dataset_datetime \
                FROM read_csv(?, header = true, delim = ',');";
            conn.execute(
                &(query_start + query_select),
                params![year, dataset_datetime, filepath],
            )?;
            pb.inc(1);
        }
        pb.finish();

        let _ = conn.close();
        Ok(())
    }

    pub fn drop_all_tables(&self) -> Result<(), PipelineError> {
        let conn = self.open()?;
        tables::drop_all_tables(&conn)?;
        let _ = conn.close();
        Ok(())
    }

    /// Clear the scratch cache folder.
    pub fn clear_cache(&self, recreate_folder: bool) -> Result<(), PipelineError> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)?;
        }
        if recreate_folder {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Execute a refresh plan: optional full drop, then the years in
    /// ascending order.  A failure on one year aborts the remaining
    /// ones; a half-populated run must not pass for a success.
    pub fn refresh(&self, plan: &RefreshPlan) -> Result<(), PipelineError> {
        if plan.drop_tables {
            self.drop_all_tables()?;
        }

        info!(
            "launching processing of EDC datasets for years: {:?}",
            plan.years
        );
        for year in &plan.years {
            self.load_year(year)?;
        }

        info!("cleaning up cache...");
        self.clear_cache(false)?;
        Ok(())
    }
}
