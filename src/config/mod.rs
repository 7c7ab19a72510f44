use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::info;

use crate::sweep::SweepPlan;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub plan: SweepPlan,
    /// File the plan was read from, if any.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_override(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(custom) => {
                let canonical = canonicalize_file(&custom)?;
                let plan = load_plan(&canonical)?;
                info!(path = %canonical.display(), "loaded sweep plan");
                Ok(Self {
                    plan,
                    source: Some(canonical),
                })
            }
            None => Ok(Self {
                plan: SweepPlan::default(),
                source: None,
            }),
        }
    }
}

fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("failed to resolve sweep plan at {:?}", path))?;
    if canonical.is_file() {
        Ok(canonical)
    } else {
        Err(anyhow!("sweep plan path {:?} is not a file", canonical))
    }
}

fn load_plan(path: &Path) -> Result<SweepPlan> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
    let plan: SweepPlan = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse sweep plan {:?}", path))?;
    if plan.analysis_rate == 0 {
        return Err(anyhow!("analysis_rate in {:?} must be positive", path));
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::AppConfig;
    use crate::sweep::SweepPlan;

    #[test]
    fn defaults_without_override() {
        let config = AppConfig::from_override(None).unwrap();
        assert_eq!(config.plan, SweepPlan::default());
        assert!(config.source.is_none());
    }

    #[test]
    fn accepts_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, r#"{"analysis_rate": 16000, "tempo": null}"#).unwrap();
        let config = AppConfig::from_override(Some(path)).unwrap();
        assert_eq!(config.plan.analysis_rate, 16_000);
        assert!(config.plan.tempo.is_none());
        assert!(config.source.unwrap().ends_with("plan.json"));
    }

    #[test]
    fn rejects_directory_and_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::from_override(Some(dir.path().to_path_buf())).is_err());

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::from_override(Some(path)).is_err());
    }
}
