use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::errors::{AppError, AppResult};
use crate::core::types::Dimensions;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkerConfig {
    pub max_chunk_size: usize,
    pub overlap: usize,
    pub min_orphan: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 2000,
            overlap: 300,
            min_orphan: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicConfig {
    pub default_baseline: f64,
    /// Size ratio that makes any short node a heading.
    pub strong_ratio: f64,
    /// Size ratio that makes a short bold node a heading.
    pub bold_ratio: f64,
    pub heading_max_chars: usize,
    /// Bold nodes at baseline size count as headings below this length.
    pub short_bold_max_chars: usize,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            default_baseline: 12.0,
            strong_ratio: 1.3,
            bold_ratio: 1.1,
            heading_max_chars: 120,
            short_bold_max_chars: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub chunker: ChunkerConfig,
    pub topics: TopicConfig,
    /// Images covering more than this fraction of both page dimensions are
    /// treated as background and dropped.
    pub background_coverage: f64,
    /// Slide canvas in EMU used when the deck does not declare one (4:3).
    pub default_slide_size: Dimensions,
    pub max_form_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            topics: TopicConfig::default(),
            background_coverage: 0.95,
            default_slide_size: Dimensions {
                width: 9_144_000.0,
                height: 6_858_000.0,
            },
            max_form_depth: 8,
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `DOCGRAPH_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn from_json_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| AppError::Io(format!("cannot read config {}: {err}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validated()
    }

    /// Apply overrides from a key lookup. Unparseable values keep the current
    /// setting and log a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        override_from(&lookup, "DOCGRAPH_MAX_CHUNK_SIZE", &mut self.chunker.max_chunk_size);
        override_from(&lookup, "DOCGRAPH_CHUNK_OVERLAP", &mut self.chunker.overlap);
        override_from(&lookup, "DOCGRAPH_MIN_ORPHAN", &mut self.chunker.min_orphan);
        override_from(&lookup, "DOCGRAPH_BASELINE_FONT_SIZE", &mut self.topics.default_baseline);
        override_from(&lookup, "DOCGRAPH_BACKGROUND_COVERAGE", &mut self.background_coverage);
        override_from(&lookup, "DOCGRAPH_MAX_FORM_DEPTH", &mut self.max_form_depth);

        if let Ok(valid) = self.clone().validated() {
            *self = valid;
        } else {
            warn!("invalid DOCGRAPH_* overrides, falling back to defaults");
            *self = Self::default();
        }
    }

    pub fn validated(self) -> AppResult<Self> {
        let chunker = &self.chunker;
        if chunker.max_chunk_size == 0 {
            return Err(AppError::InvalidInput("maxChunkSize must be positive".to_string()));
        }
        if chunker.overlap >= chunker.max_chunk_size {
            return Err(AppError::InvalidInput(
                "overlap must be smaller than maxChunkSize".to_string(),
            ));
        }
        if !(self.background_coverage > 0.0 && self.background_coverage <= 1.0) {
            return Err(AppError::InvalidInput(
                "backgroundCoverage must be in (0, 1]".to_string(),
            ));
        }
        if !(self.topics.default_baseline.is_finite() && self.topics.default_baseline > 0.0) {
            return Err(AppError::InvalidInput("defaultBaseline must be positive".to_string()));
        }
        if self.default_slide_size.width <= 0.0 || self.default_slide_size.height <= 0.0 {
            return Err(AppError::InvalidInput("defaultSlideSize must be positive".to_string()));
        }
        Ok(self)
    }
}

fn override_from<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => warn!(key, value = %raw, "ignoring unparseable override"),
    }
}

/// Log filter from `DOCGRAPH_LOG`, defaulting to `info`.
pub fn log_level_from_env() -> &'static str {
    match std::env::var("DOCGRAPH_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .to_ascii_lowercase()
        .as_str()
    {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}
