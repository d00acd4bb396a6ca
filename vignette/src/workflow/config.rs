use crate::generator::survey::GeneratorConfig;
use anyhow::{ensure, Context};
use dsmcore::detection::KeyFunction;
use dsmcore::model::{FitOptions, SamplerConfig};
use dsmcore::processing::{CvBins, UncertaintyMethod};
use dsmcore::survey::{AreaUnit, EqualAreaProjection};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Segments duplicated per platform, three nested models.
    #[default]
    TwoPlatform,
    /// Platform A only, no duplication, no-platform model only.
    SinglePlatform,
}

/// How one platform's detection function is obtained.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionSpec {
    /// Maximum likelihood over each key; the lowest AIC is kept.
    Fitted {
        keys: Vec<KeyFunction>,
        width: f64,
        #[serde(default)]
        cutpoints: Option<Vec<f64>>,
    },
    /// Strip count with detection probability one.
    Dummy { width: f64 },
}

impl DetectionSpec {
    pub fn width(&self) -> f64 {
        match self {
            DetectionSpec::Fitted { width, .. } | DetectionSpec::Dummy { width } => *width,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Survey bundle directory; unset generates a synthetic survey.
    pub input: Option<PathBuf>,
    pub generator: GeneratorConfig,
    pub output: PathBuf,
    pub mode: AnalysisMode,
    pub platform_a: DetectionSpec,
    pub platform_b: DetectionSpec,
    pub basis_size: usize,
    pub fit: FitOptions,
    pub varprop: bool,
    pub sampler: SamplerConfig,
    pub cv_breaks: Vec<f64>,
    pub uncertainty: UncertaintyMethod,
    pub area_unit: AreaUnit,
    /// Used to project a lon/lat survey track onto the grid's coordinates.
    pub projection: Option<EqualAreaProjection>,
    pub figures: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            input: None,
            generator: GeneratorConfig::default(),
            output: PathBuf::from("output"),
            mode: AnalysisMode::TwoPlatform,
            platform_a: DetectionSpec::Fitted {
                keys: vec![KeyFunction::HalfNormal, KeyFunction::HazardRate],
                width: 800.0,
                cutpoints: None,
            },
            platform_b: DetectionSpec::Dummy { width: 400.0 },
            basis_size: 8,
            fit: FitOptions::default(),
            varprop: true,
            sampler: SamplerConfig::default(),
            cv_breaks: CvBins::default().breaks().to_vec(),
            uncertainty: UncertaintyMethod::default(),
            area_unit: AreaUnit::default(),
            projection: None,
            figures: true,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .validate()
            .with_context(|| format!("validating workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(
        input: Option<PathBuf>,
        output: PathBuf,
        mode: AnalysisMode,
        samples: usize,
        seed: Option<u64>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            input,
            output,
            mode,
            sampler: SamplerConfig {
                samples,
                seed,
                ..defaults.sampler.clone()
            },
            generator: GeneratorConfig {
                seed: seed.unwrap_or(defaults.generator.seed),
                ..defaults.generator.clone()
            },
            ..defaults
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.basis_size >= 4, "basis_size must be at least 4, got {}", self.basis_size);
        ensure!(self.platform_a.width() > 0.0, "platform_a width must be positive");
        if self.mode == AnalysisMode::TwoPlatform {
            ensure!(self.platform_b.width() > 0.0, "platform_b width must be positive");
        }
        if let DetectionSpec::Fitted { keys, .. } = &self.platform_a {
            ensure!(!keys.is_empty(), "platform_a lists no key functions");
        }
        self.cv_bins()?;
        Ok(())
    }

    pub fn cv_bins(&self) -> anyhow::Result<CvBins> {
        CvBins::new(self.cv_breaks.clone()).context("building CV bins")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_sets_sampler_and_seed() {
        let cfg = WorkflowConfig::from_args(
            None,
            PathBuf::from("out"),
            AnalysisMode::SinglePlatform,
            250,
            Some(9),
        );
        assert_eq!(cfg.sampler.samples, 250);
        assert_eq!(cfg.sampler.seed, Some(9));
        assert_eq!(cfg.generator.seed, 9);
        assert_eq!(cfg.mode, AnalysisMode::SinglePlatform);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"mode: two_platform\n\
              basis_size: 6\n\
              platform_a:\n  kind: fitted\n  keys: [half_normal]\n  width: 500.0\n\
              platform_b:\n  kind: dummy\n  width: 250.0\n\
              uncertainty: drawwise_propagation\n\
              cv_breaks: [0.0, 0.25, .inf]\n\
              sampler:\n  samples: 50\n  seed: 3\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.basis_size, 6);
        assert_eq!(cfg.platform_b, DetectionSpec::Dummy { width: 250.0 });
        assert_eq!(cfg.uncertainty, UncertaintyMethod::DrawwisePropagation);
        assert_eq!(cfg.sampler.samples, 50);
        assert_eq!(cfg.sampler.burn_in, SamplerConfig::default().burn_in);
        assert_eq!(cfg.cv_bins().unwrap().count(), 2);
    }

    #[test]
    fn config_load_rejects_unordered_breaks() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"cv_breaks: [0.0, 0.5, 0.2]\n").unwrap();
        let path = temp.into_temp_path();
        assert!(WorkflowConfig::load(&path).is_err());
    }
}
