use std::env;
use std::fs;
use std::path::Path;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use log::info;
use tokio::runtime::Runtime;

use crate::config::{self, Environment, Settings};
use crate::errors::PipelineError;
use crate::fetch;

fn required_var(name: &str) -> Result<String, PipelineError> {
    env::var(name)
        .map_err(|_| PipelineError::TransferFailed(format!("missing environment variable {}", name)))
}

/// S3-compatible object storage client.
///
/// Credentials, endpoint and bucket come from the environment.  The
/// client owns its tokio runtime so callers stay synchronous; the
/// pipeline is a sequential batch job, not a service.
pub struct ObjectStorageClient {
    pub bucket_name: String,
    pub endpoint_url: String,
    client: Client,
    runtime: Runtime,
}

impl ObjectStorageClient {
    pub fn from_env() -> Result<ObjectStorageClient, PipelineError> {
        let access_key = required_var("S3_ACCESS_KEY_ID")?;
        let secret_key = required_var("S3_SECRET_ACCESS_KEY")?;
        let endpoint_url = required_var("S3_ENDPOINT_URL")?;
        let bucket_name = required_var("S3_BUCKET_NAME")?;
        let region = env::var("S3_REGION").unwrap_or_else(|_| "fr-par".to_string());

        let credentials = Credentials::new(access_key, secret_key, None, None, "environment");
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .endpoint_url(&endpoint_url)
            .credentials_provider(credentials)
            .build();

        Ok(ObjectStorageClient {
            bucket_name,
            endpoint_url,
            client: Client::from_conf(s3_config),
            runtime: Runtime::new()?,
        })
    }

    pub fn upload_object(&self, local_path: &Path, remote_key: &str) -> Result<(), PipelineError> {
        self.runtime.block_on(async {
            let body = ByteStream::from_path(local_path)
                .await
                .map_err(|e| PipelineError::TransferFailed(e.to_string()))?;
            self.client
                .put_object()
                .bucket(&self.bucket_name)
                .key(remote_key)
                .body(body)
                .send()
                .await
                .map_err(|e| PipelineError::TransferFailed(e.to_string()))?;
            Ok(())
        })
    }

    pub fn download_object(&self, remote_key: &str, local_path: &Path) -> Result<(), PipelineError> {
        self.runtime.block_on(async {
            let response = self
                .client
                .get_object()
                .bucket(&self.bucket_name)
                .key(remote_key)
                .send()
                .await
                .map_err(|e| PipelineError::TransferFailed(e.to_string()))?;
            let data = response
                .body
                .collect()
                .await
                .map_err(|e| PipelineError::TransferFailed(e.to_string()))?
                .into_bytes();
            if let Some(dir) = local_path.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(local_path, &data)?;
            Ok(())
        })
    }

    /// Public HTTPS url of an object, bucket as a subdomain of the endpoint.
    pub fn public_url(&self, remote_key: &str) -> String {
        let host = self
            .endpoint_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        format!("https://{}.{}/{}", self.bucket_name, host, remote_key)
    }
}

/// How the database file travels: through the S3 API with credentials,
/// or anonymously over the bucket's public HTTPS link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    ObjectStorage,
    Https,
}

impl Transfer {
    pub fn download(&self, env: Environment, dest: &Path) -> Result<(), PipelineError> {
        let s3 = ObjectStorageClient::from_env()?;
        let remote_key = config::remote_db_key(env);
        match self {
            Transfer::ObjectStorage => {
                s3.download_object(&remote_key, dest)?;
                info!(
                    "database downloaded from s3://{}/{} -> {}",
                    s3.bucket_name,
                    remote_key,
                    dest.display()
                );
            }
            Transfer::Https => {
                let url = s3.public_url(&remote_key);
                fetch::download_file(&url, dest)?;
                info!(
                    "database downloaded over HTTPS: {} -> {}",
                    url,
                    dest.display()
                );
            }
        }
        Ok(())
    }
}

pub fn upload_database(settings: &Settings, env: Environment) -> Result<(), PipelineError> {
    let s3 = ObjectStorageClient::from_env()?;
    let remote_key = config::remote_db_key(env);
    s3.upload_object(&settings.duckdb_path, &remote_key)?;
    info!(
        "database uploaded: {} -> s3://{}/{}",
        settings.duckdb_path.display(),
        s3.bucket_name,
        remote_key
    );
    Ok(())
}

pub fn download_database(
    settings: &Settings,
    env: Environment,
    transfer: Transfer,
) -> Result<(), PipelineError> {
    transfer.download(env, &settings.duckdb_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> ObjectStorageClient {
        env::set_var("S3_ACCESS_KEY_ID", "key");
        env::set_var("S3_SECRET_ACCESS_KEY", "secret");
        env::set_var("S3_ENDPOINT_URL", "https://s3.fr-par.scw.cloud");
        env::set_var("S3_BUCKET_NAME", "potable-data");
        ObjectStorageClient::from_env().unwrap()
    }

    #[test]
    fn public_url_uses_bucket_subdomain() {
        let s3 = test_client();
        assert_eq!(
            s3.public_url(&config::remote_db_key(Environment::Prod)),
            "https://potable-data.s3.fr-par.scw.cloud/prod/data.duckdb"
        );
    }

    #[ignore]
    #[test]
    fn roundtrip_database_file() -> Result<(), PipelineError> {
        let s3 = test_client();
        let dir = std::env::temp_dir().join("potable_storage_roundtrip");
        std::fs::create_dir_all(&dir)?;
        let local = dir.join("data.duckdb");
        std::fs::write(&local, b"not really a database")?;
        s3.upload_object(&local, "dev/data.duckdb")?;
        let back = dir.join("back.duckdb");
        s3.download_object("dev/data.duckdb", &back)?;
        assert_eq!(std::fs::read(&local)?, std::fs::read(&back)?);
        Ok(())
    }
}
