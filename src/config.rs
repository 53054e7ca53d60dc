use std::env;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

impl FromStr for Environment {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(PipelineError::InvalidEnvironment(s.to_string())),
        }
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Dev => write!(f, "dev"),
            Environment::Prod => write!(f, "prod"),
        }
    }
}

/// Local layout: `<root>/database/data.duckdb` next to a
/// `<root>/database/cache` scratch folder for in-flight downloads.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_dir: PathBuf,
    pub duckdb_path: PathBuf,
    pub cache_dir: PathBuf,
}

impl Settings {
    /// Root defaults to the working directory; override with POTABLE_ROOT.
    pub fn from_env() -> Settings {
        let root = env::var("POTABLE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        Settings::at_root(&root)
    }

    pub fn at_root(root: &std::path::Path) -> Settings {
        let database_dir = root.join("database");
        Settings {
            duckdb_path: database_dir.join("data.duckdb"),
            cache_dir: database_dir.join("cache"),
            database_dir,
        }
    }

    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.database_dir)?;
        fs::create_dir_all(&self.cache_dir)
    }
}

/// Remote key of the database file for one environment.
pub fn remote_db_key(env: Environment) -> String {
    format!("{}/data.duckdb", env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_environment() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn settings_layout() {
        let settings = Settings::at_root(std::path::Path::new("/tmp/wq"));
        assert_eq!(
            settings.duckdb_path,
            PathBuf::from("/tmp/wq/database/data.duckdb")
        );
        assert_eq!(settings.cache_dir, PathBuf::from("/tmp/wq/database/cache"));
    }

    #[test]
    fn remote_key_per_env() {
        assert_eq!(remote_db_key(Environment::Prod), "prod/data.duckdb");
        assert_eq!(remote_db_key(Environment::Dev), "dev/data.duckdb");
    }
}
