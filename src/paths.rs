//! Storage layout: archive, plugins and history live under one directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, Timelike};
use thiserror::Error;

use crate::{config::AppConfig, serde_types::Config};

pub const HISTORY_FILE_NAME: &str = "sharenix.csv";

const MAX_ARCHIVE_ATTEMPTS: u32 = 1000;

#[derive(Error, Debug)]
pub enum PathsError {
    #[error("could not determine the home directory")]
    NoHome,
    #[error("failed to create directory `{path}`: `{source}`")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to generate a unique archive filename")]
    ArchiveExhausted,
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf, PathsError> {
    std::fs::create_dir_all(&path).map_err(|source| PathsError::CreateDir {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path)
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    organized: bool,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>, organized: bool) -> Self {
        Self {
            root: root.into(),
            organized,
        }
    }

    /// Resolve storage from the app config override or `$HOME/<SaveFolder>`.
    pub fn resolve(app: &AppConfig, sites: &Config) -> Result<Self, PathsError> {
        let root = match &app.storage_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .ok_or(PathsError::NoHome)?
                .join(&sites.save_folder),
        };
        Ok(Self::new(root, sites.organized_folders))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn history_file(&self) -> PathBuf {
        self.root.join(HISTORY_FILE_NAME)
    }

    pub fn plugins_dir(&self) -> Result<PathBuf, PathsError> {
        ensure_dir(self.root.join("plugins"))
    }

    /// `archive/`, or one folder per month when folders are organized.
    pub fn archive_dir(&self, now: &DateTime<Local>) -> Result<PathBuf, PathsError> {
        let dir = if self.organized {
            self.root
                .join(format!("{:04}-{:02}", now.year(), now.month()))
        } else {
            self.root.join("archive")
        };
        ensure_dir(dir)
    }

    /// First unused `Y-M-D_h-m-s_i.ext` path in the archive directory.
    pub fn archive_file(&self, extension: &str, now: &DateTime<Local>) -> Result<PathBuf, PathsError> {
        let dir = self.archive_dir(now)?;
        for i in 0..MAX_ARCHIVE_ATTEMPTS {
            let path = dir.join(format!(
                "{}-{}-{}_{}-{}-{}_{}.{}",
                now.year(),
                now.month(),
                now.day(),
                now.hour(),
                now.minute(),
                now.second(),
                i,
                extension
            ));
            if !path.exists() {
                return Ok(path);
            }
        }
        Err(PathsError::ArchiveExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 2, 9, 10, 11, 12).unwrap()
    }

    #[test]
    fn test_archive_dir_layout() {
        let dir = tempfile::tempdir().unwrap();
        let flat = Storage::new(dir.path(), false);
        assert_eq!(flat.archive_dir(&now()).unwrap(), dir.path().join("archive"));
        let organized = Storage::new(dir.path(), true);
        assert_eq!(organized.archive_dir(&now()).unwrap(), dir.path().join("2024-02"));
        assert!(dir.path().join("2024-02").is_dir());
    }

    #[test]
    fn test_archive_file_is_unique() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path(), false);
        let first = storage.archive_file("png", &now()).unwrap();
        assert_eq!(first.file_name().unwrap(), "2024-2-9_10-11-12_0.png");
        std::fs::write(&first, b"x").unwrap();
        let second = storage.archive_file("png", &now()).unwrap();
        assert_eq!(second.file_name().unwrap(), "2024-2-9_10-11-12_1.png");
    }

    #[test]
    fn test_storage_override() {
        let app = AppConfig {
            storage_dir: Some(PathBuf::from("/tmp/sharenix-test")),
            ..Default::default()
        };
        let storage = Storage::resolve(&app, &Config::default()).unwrap();
        assert_eq!(storage.root(), Path::new("/tmp/sharenix-test"));
        assert_eq!(
            storage.history_file(),
            Path::new("/tmp/sharenix-test/sharenix.csv")
        );
    }
}
