//! Persisted features keyed by their configuration path components.
//!
//! A stored unit lives at `<root>/<feature>/<param=value>/.../<stem>.json`,
//! which is the same layout the table compiler walks later on.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{FeatureError, Result};
use crate::types::Feature;

pub const FEATURE_EXTENSION: &str = "json";

/// Where computed features go and how reruns find them again.
pub trait FeatureStore: Send + Sync {
    /// Best-effort check; a concurrent writer may create the unit right after.
    fn exists(&self, components: &[String], stem: &str) -> bool;

    fn save(&self, feature: &Feature, components: &[String], stem: &str) -> Result<PathBuf>;

    fn load(&self, components: &[String], stem: &str) -> Result<Feature>;
}

#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, components: &[String], stem: &str) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(components);
        path.push(format!("{stem}.{FEATURE_EXTENSION}"));
        path
    }
}

impl FeatureStore for DirectoryStore {
    fn exists(&self, components: &[String], stem: &str) -> bool {
        self.path_for(components, stem).is_file()
    }

    fn save(&self, feature: &Feature, components: &[String], stem: &str) -> Result<PathBuf> {
        let path = self.path_for(components, stem);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| FeatureError::storage(parent, err))?;
        }

        // write next to the target and rename so readers never see a half-written file
        let partial = path.with_extension(format!("{FEATURE_EXTENSION}.partial"));
        let file = fs::File::create(&partial).map_err(|err| FeatureError::storage(&partial, err))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, feature)
            .map_err(|err| FeatureError::storage(&partial, err.into()))?;
        writer
            .flush()
            .map_err(|err| FeatureError::storage(&partial, err))?;
        drop(writer);
        fs::rename(&partial, &path).map_err(|err| FeatureError::storage(&path, err))?;

        debug!(path = %path.display(), "stored feature");
        Ok(path)
    }

    fn load(&self, components: &[String], stem: &str) -> Result<Feature> {
        load_feature(&self.path_for(components, stem))
    }
}

/// Read one stored feature file.
pub fn load_feature(path: &Path) -> Result<Feature> {
    let file = fs::File::open(path).map_err(|err| FeatureError::storage(path, err))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|err| FeatureError::storage(path, err.into()))
}
