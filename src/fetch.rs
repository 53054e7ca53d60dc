use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use jiff::civil::DateTime;
use log::info;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::redirect::Policy;
use reqwest::Url;

use crate::errors::PipelineError;

/// Shared progress bar looks, byte transfers and counted operations.
pub(crate) fn bytes_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {bytes:>10}/{total_bytes:10} {msg}")
        .unwrap()
        .progress_chars("##-")
}

pub(crate) fn count_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>4}/{len:4} {msg}")
        .unwrap()
        .progress_chars("##-")
}

/// Metadata-only request.  Redirects are not followed so the `Location`
/// header of the redirect response stays visible to the caller.
pub fn fetch_headers(url: &str) -> Result<HeaderMap, PipelineError> {
    let client = Client::builder()
        .redirect(Policy::none())
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| PipelineError::TransferFailed(e.to_string()))?;
    let response = client
        .head(url)
        .send()
        .map_err(|e| PipelineError::TransferFailed(e.to_string()))?;
    Ok(response.headers().clone())
}

/// Current upstream datetime of a static dataset url, format `YYYYMMDD-HHMMSS`.
///
/// data.gouv.fr answers the static url with a redirect whose target path
/// embeds the datetime of the stored resource as its second-to-last
/// segment.  Callers map a failure here to `FreshnessCheckFailed` or
/// `DatasetDatetimeUnavailable` depending on which operation needed it.
pub fn extract_dataset_datetime(url: &str) -> Result<String, PipelineError> {
    let headers = fetch_headers(url)?;
    let location = headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            PipelineError::TransferFailed(format!("no Location header returned for {}", url))
        })?;
    datetime_from_location(location)
}

fn datetime_from_location(location: &str) -> Result<String, PipelineError> {
    let path = match Url::parse(location) {
        Ok(url) => url.path().to_string(),
        // a relative Location is already a bare path
        Err(_) => location
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let parts: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    if parts.len() < 2 {
        return Err(PipelineError::TransferFailed(format!(
            "no datetime segment in redirect location: {}",
            location
        )));
    }
    let stamp = parts[parts.len() - 2];
    DateTime::strptime("%Y%m%d-%H%M%S", stamp).map_err(|e| {
        PipelineError::TransferFailed(format!(
            "cannot parse '{}' as a dataset datetime: {}",
            stamp, e
        ))
    })?;
    Ok(stamp.to_string())
}

/// Stamps are compared as datetimes, not as strings.
pub fn parse_dataset_datetime(stamp: &str) -> Result<DateTime, PipelineError> {
    DateTime::strptime("%Y%m%d-%H%M%S", stamp).map_err(|e| {
        PipelineError::TransferFailed(format!(
            "cannot parse '{}' as a dataset datetime: {}",
            stamp, e
        ))
    })
}

/// Download a url to a local file, following redirects, with a byte
/// progress bar.  Parent directories are created as needed.
pub fn download_file(url: &str, filepath: &Path) -> Result<(), PipelineError> {
    let client = Client::builder()
        .timeout(None::<Duration>)
        .build()
        .map_err(|e| PipelineError::TransferFailed(e.to_string()))?;
    let response = client
        .get(url)
        .send()
        .map_err(|e| PipelineError::TransferFailed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(PipelineError::TransferFailed(format!(
            "GET {} returned {}",
            url,
            response.status()
        )));
    }
    let total = response.content_length().unwrap_or(0);

    if let Some(dir) = filepath.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut out = File::create(filepath)?;

    let pb = ProgressBar::new(total);
    pb.set_style(bytes_style());
    pb.set_message(format!(
        "Processing file {}",
        filepath
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    ));
    let mut reader = pb.wrap_read(response);
    let n = io::copy(&mut reader, &mut out)?;
    pb.finish();
    info!("downloaded {} bytes to {}", n, filepath.display());

    Ok(())
}
