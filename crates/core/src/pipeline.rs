//! Pipeline configuration document and provider.
//!
//! The pipeline object is owned by the cluster control plane; the
//! scheduler holds it read-only and re-fetches it on every admission
//! decision and every harvest sweep. Nothing here is cached across
//! cycles — a stale `max_jobs` would silently widen the admission gate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ChurroError, Result};
use crate::source::ExtractSource;

/// Worker cap applied when the document omits `max_jobs` or sets it to zero.
pub const DEFAULT_MAX_JOBS: usize = 4;
/// Harvest sweep schedule applied when the document omits one (every 20s).
pub const DEFAULT_HARVEST_FREQUENCY: &str = "*/20 * * * * *";
/// Maximum settled-pod age before harvest, in hours.
pub const DEFAULT_HARVEST_POD_DURATION_HOURS: i64 = 44;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    pub namespace: String,
    /// Maximum concurrently running extraction workers.
    #[serde(default)]
    pub max_jobs: usize,
    /// Cron schedule for the harvest sweep.
    #[serde(default)]
    pub harvest_frequency: String,
    /// Settled pods older than this many hours are harvested.
    #[serde(default)]
    pub harvest_pod_duration_hours: i64,
    /// Extract sources keyed by source id.
    #[serde(default)]
    pub sources: BTreeMap<String, ExtractSource>,
}

impl Pipeline {
    /// Effective worker cap (document value, or the default when unset).
    pub fn effective_max_jobs(&self) -> usize {
        if self.max_jobs == 0 {
            DEFAULT_MAX_JOBS
        } else {
            self.max_jobs
        }
    }

    /// Effective harvest schedule expression.
    pub fn effective_harvest_frequency(&self) -> &str {
        if self.harvest_frequency.trim().is_empty() {
            DEFAULT_HARVEST_FREQUENCY
        } else {
            &self.harvest_frequency
        }
    }

    /// Effective maximum settled-pod age.
    pub fn effective_harvest_pod_duration(&self) -> chrono::Duration {
        let hours = if self.harvest_pod_duration_hours <= 0 {
            DEFAULT_HARVEST_POD_DURATION_HOURS
        } else {
            self.harvest_pod_duration_hours
        };
        chrono::Duration::hours(hours)
    }

    /// Resolve the source whose watched directory is `dir`.
    pub fn source_for_dir(&self, dir: &Path) -> Option<&ExtractSource> {
        self.sources
            .values()
            .find(|s| !s.scheme.is_api() && Path::new(&s.path) == dir)
    }

    /// Resolve a source by its id.
    pub fn source_by_id(&self, id: &str) -> Option<&ExtractSource> {
        self.sources.get(id)
    }

    /// Validate every source definition in the document.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ChurroError::Pipeline("pipeline name is empty".into()));
        }
        for source in self.sources.values() {
            source.validate()?;
        }
        Ok(())
    }
}

// ── Provider ──────────────────────────────────────────────────

/// Read-only access to the authoritative pipeline document.
#[async_trait]
pub trait PipelineProvider: Send + Sync {
    /// Fetch the current pipeline configuration. Implementations must
    /// not serve a copy cached across calls.
    async fn fetch(&self) -> Result<Pipeline>;
}

/// Provider backed by a YAML document on disk (mounted into the
/// scheduler pod by the control plane). Re-reads the file on each call.
pub struct YamlPipelineProvider {
    path: PathBuf,
}

impl YamlPipelineProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PipelineProvider for YamlPipelineProvider {
    async fn fetch(&self) -> Result<Pipeline> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ChurroError::Pipeline(format!(
                "cannot read pipeline config {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let pipeline: Pipeline = serde_yaml::from_str(&raw)
            .map_err(|e| ChurroError::Pipeline(format!("malformed pipeline config: {}", e)))?;
        pipeline.validate()?;
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DOC: &str = r#"
name: sales
namespace: pipelines
max_jobs: 2
harvest_frequency: "*/20 * * * * *"
harvest_pod_duration_hours: 44
sources:
  src1:
    id: src1
    name: csvfiles
    path: /data/csv
    scheme: csv
    regex: ".*\\.csv$"
    tablename: sales
    skip_headers: 1
  src2:
    id: src2
    name: ticker
    path: https://example.com/feed
    scheme: api
    tablename: ticks
    cron_expression: "*/5 * * * *"
"#;

    #[test]
    fn defaults_kick_in_when_unset() {
        let p = Pipeline {
            name: "p".into(),
            namespace: "ns".into(),
            max_jobs: 0,
            harvest_frequency: String::new(),
            harvest_pod_duration_hours: 0,
            sources: BTreeMap::new(),
        };
        assert_eq!(p.effective_max_jobs(), DEFAULT_MAX_JOBS);
        assert_eq!(p.effective_harvest_frequency(), DEFAULT_HARVEST_FREQUENCY);
        assert_eq!(p.effective_harvest_pod_duration(), chrono::Duration::hours(44));
    }

    #[tokio::test]
    async fn yaml_provider_re_reads_per_fetch() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOC.as_bytes()).unwrap();
        file.flush().unwrap();

        let provider = YamlPipelineProvider::new(file.path());
        let p = provider.fetch().await.unwrap();
        assert_eq!(p.name, "sales");
        assert_eq!(p.effective_max_jobs(), 2);
        assert_eq!(p.sources.len(), 2);

        // Mutate the document; the next fetch must observe the change.
        let updated = DOC.replace("max_jobs: 2", "max_jobs: 5");
        std::fs::write(file.path(), updated).unwrap();
        let p = provider.fetch().await.unwrap();
        assert_eq!(p.effective_max_jobs(), 5);
    }

    #[tokio::test]
    async fn yaml_provider_rejects_invalid_sources() {
        let doc = DOC.replace("regex: \".*\\\\.csv$\"", "regex: \"\"");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(doc.as_bytes()).unwrap();
        file.flush().unwrap();

        let err = YamlPipelineProvider::new(file.path()).fetch().await.unwrap_err();
        assert!(matches!(err, ChurroError::InvalidSource(_)));
    }

    #[test]
    fn source_for_dir_skips_api_sources() {
        let p: Pipeline = serde_yaml::from_str(DOC).unwrap();
        assert_eq!(
            p.source_for_dir(Path::new("/data/csv")).unwrap().name,
            "csvfiles"
        );
        assert!(p.source_for_dir(Path::new("https://example.com/feed")).is_none());
        assert!(p.source_for_dir(Path::new("/data/other")).is_none());
    }
}
