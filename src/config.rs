use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::alert::AlertPolicy;
use crate::classify::{LabelNormalizer, VehicleClass};
use crate::timing::GreenTimePolicy;

const DEFAULT_LANES_PATH: &str = "configs/lane_configs.json";
const DEFAULT_OUTPUT_PATH: &str = "out/processed_result.json";
const DEFAULT_DETECTOR: &str = "sidecar";
const DEFAULT_WORKERS: usize = 1;

#[derive(Debug, Deserialize, Default)]
struct SignalConfigFile {
    lanes_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    search_roots: Option<Vec<PathBuf>>,
    detector: Option<String>,
    workers: Option<usize>,
    timing: Option<TimingConfigFile>,
    aliases: Option<BTreeMap<String, String>>,
    alert: Option<AlertConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct TimingConfigFile {
    min_green: Option<u32>,
    max_green: Option<u32>,
    safety_buffer: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    threshold: Option<u32>,
    url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub lanes_path: PathBuf,
    pub output_path: PathBuf,
    pub search_roots: Vec<PathBuf>,
    pub detector: String,
    pub workers: usize,
    pub timing: GreenTimePolicy,
    /// Extra label corrections on top of the built-in ones.
    pub aliases: BTreeMap<String, VehicleClass>,
    pub alert: AlertPolicy,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            lanes_path: PathBuf::from(DEFAULT_LANES_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            search_roots: vec![PathBuf::from(".")],
            detector: DEFAULT_DETECTOR.to_string(),
            workers: DEFAULT_WORKERS,
            timing: GreenTimePolicy::default(),
            aliases: BTreeMap::new(),
            alert: AlertPolicy::default(),
        }
    }
}

impl SignalConfig {
    /// Load from `LANE_SIGNAL_CONFIG` (when set), then apply environment
    /// overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LANE_SIGNAL_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty());
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, with an explicit config file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => SignalConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SignalConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let timing = file.timing.unwrap_or_default();
        let timing = GreenTimePolicy {
            min_green: timing.min_green.unwrap_or(defaults.timing.min_green),
            max_green: timing.max_green.unwrap_or(defaults.timing.max_green),
            safety_buffer: timing.safety_buffer.unwrap_or(defaults.timing.safety_buffer),
        };
        let aliases = file
            .aliases
            .unwrap_or_default()
            .into_iter()
            .map(|(alias, class)| {
                let class = class
                    .trim()
                    .to_lowercase()
                    .parse::<VehicleClass>()
                    .with_context(|| format!("alias '{}' has an invalid target", alias))?;
                Ok((alias, class))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        let alert = file.alert.unwrap_or_default();
        Ok(Self {
            lanes_path: file.lanes_path.unwrap_or(defaults.lanes_path),
            output_path: file.output_path.unwrap_or(defaults.output_path),
            search_roots: file.search_roots.unwrap_or(defaults.search_roots),
            detector: file.detector.unwrap_or(defaults.detector),
            workers: file.workers.unwrap_or(defaults.workers),
            timing,
            aliases,
            alert: AlertPolicy {
                threshold: alert.threshold.unwrap_or(defaults.alert.threshold),
                url: alert.url.filter(|u| !u.trim().is_empty()),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("LANE_SIGNAL_LANES") {
            if !path.trim().is_empty() {
                self.lanes_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("LANE_SIGNAL_OUTPUT") {
            if !path.trim().is_empty() {
                self.output_path = PathBuf::from(path);
            }
        }
        if let Ok(roots) = std::env::var("LANE_SIGNAL_SEARCH_ROOTS") {
            let parsed = split_csv(&roots);
            if !parsed.is_empty() {
                self.search_roots = parsed.into_iter().map(PathBuf::from).collect();
            }
        }
        if let Ok(detector) = std::env::var("LANE_SIGNAL_DETECTOR") {
            if !detector.trim().is_empty() {
                self.detector = detector.trim().to_string();
            }
        }
        if let Ok(workers) = std::env::var("LANE_SIGNAL_WORKERS") {
            self.workers = workers
                .trim()
                .parse()
                .map_err(|_| anyhow!("LANE_SIGNAL_WORKERS must be a positive integer"))?;
        }
        if let Ok(url) = std::env::var("LANE_SIGNAL_ALERT_URL") {
            if !url.trim().is_empty() {
                self.alert.url = Some(url);
            }
        }
        if let Ok(threshold) = std::env::var("LANE_SIGNAL_ALERT_THRESHOLD") {
            self.alert.threshold = threshold.trim().parse().map_err(|_| {
                anyhow!("LANE_SIGNAL_ALERT_THRESHOLD must be a non-negative integer")
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.timing.validate()?;
        if self.workers == 0 {
            return Err(anyhow!("workers must be >= 1"));
        }
        if self.search_roots.is_empty() {
            return Err(anyhow!("search_roots must not be empty"));
        }
        Ok(())
    }

    /// Label normalizer with the built-in aliases plus configured ones.
    pub fn normalizer(&self) -> LabelNormalizer {
        let mut normalizer = LabelNormalizer::default();
        for (alias, class) in &self.aliases {
            normalizer.add_alias(alias, *class);
        }
        normalizer
    }
}

fn read_config_file(path: &Path) -> Result<SignalConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
