use crate::generator::survey::generate_survey;
use crate::workflow::config::{AnalysisMode, DetectionSpec, WorkflowConfig};
use anyhow::{anyhow, Context};
use dsmcore::detection::{
    select_by_aic, DetectionFitter, DetectionFunction, DetectionFunctionSet, DummyFitter,
    MaximumLikelihoodFitter,
};
use dsmcore::model::{
    density_surface, predict_abundance, propagate_detection_variance, FittedModel,
    MetropolisHastings, ModelData, ModelSpec, PenalizedIrls, PosteriorSampler, SpatialBasis,
    SpatialModelFitter,
};
use dsmcore::processing::posterior::uncertainty_cells;
use dsmcore::processing::{
    combined_and_difference, duplicate_by_platform, observed_vs_expected, single_platform,
    summarise_uncertainty, CellSurface, CountComparison, CvBins, PredictionDraws, ReshapedSurvey,
};
use dsmcore::survey::{Distance, Observation, PredictionGrid, SurveyBundle};
use dsmcore::Platform;
use log::{info, warn};
use visualizer::UncertaintyLayer;

pub struct PlatformSurfaces {
    pub platform: Platform,
    pub abundance: CellSurface,
    pub density: CellSurface,
}

/// One fitted model with its maps.
pub struct ModelOutcome {
    pub model: FittedModel,
    pub predictions: Vec<PlatformSurfaces>,
    pub combined: Option<CellSurface>,
    pub difference: Option<CellSurface>,
    pub acceptance_rate: f64,
    pub uncertainty: Vec<UncertaintyLayer>,
}

pub struct WorkflowResult {
    pub bundle: SurveyBundle,
    pub detection: DetectionFunctionSet,
    pub outcomes: Vec<ModelOutcome>,
    pub summary: Vec<CountComparison>,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

fn distances(observations: &[Observation], platform: Platform) -> Vec<Distance> {
    observations
        .iter()
        .filter(|o| o.platform == platform)
        .filter_map(Observation::measured)
        .collect()
}

fn fit_detection_function(
    spec: &DetectionSpec,
    distances: &[Distance],
) -> anyhow::Result<DetectionFunction> {
    match spec {
        DetectionSpec::Dummy { width } => Ok(DummyFitter { width: *width }.fit(distances)?),
        DetectionSpec::Fitted {
            keys,
            width,
            cutpoints,
        } => {
            let mut candidates = Vec::with_capacity(keys.len());
            let mut last_error = None;
            for key in keys {
                let mut fitter = MaximumLikelihoodFitter::new(*key, *width);
                if let Some(cuts) = cutpoints {
                    fitter = fitter.with_cutpoints(cuts.clone());
                }
                match fitter.fit(distances) {
                    Ok(function) => candidates.push(function),
                    Err(err) => {
                        warn!("{} detection function dropped from comparison: {}", key.name(), err);
                        last_error = Some(err);
                    }
                }
            }
            if candidates.is_empty() {
                return Err(match last_error {
                    Some(err) => anyhow!(err).context("no key function could be fitted"),
                    None => anyhow!("no key functions configured"),
                });
            }
            Ok(select_by_aic(candidates)?)
        }
    }
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    fn platforms(&self) -> &'static [Platform] {
        match self.config.mode {
            AnalysisMode::TwoPlatform => &Platform::ALL,
            AnalysisMode::SinglePlatform => &[Platform::A],
        }
    }

    pub fn load_bundle(&self) -> anyhow::Result<SurveyBundle> {
        match &self.config.input {
            Some(dir) => {
                let mut bundle = SurveyBundle::load(dir)
                    .with_context(|| format!("loading survey bundle {}", dir.display()))?;
                if let (Some(track), Some(projection)) = (&bundle.track, &self.config.projection) {
                    bundle.track = Some(track.projected(projection));
                }
                Ok(bundle)
            }
            None => {
                let (bundle, _) = generate_survey(&self.config.generator)
                    .context("generating synthetic survey")?;
                Ok(bundle)
            }
        }
    }

    pub fn execute(&self) -> anyhow::Result<WorkflowResult> {
        let bundle = self.load_bundle()?;
        self.execute_bundle(bundle)
    }

    pub fn execute_bundle(&self, bundle: SurveyBundle) -> anyhow::Result<WorkflowResult> {
        let detection = self
            .fit_detection(&bundle)
            .context("executing detection stage")?;
        let reshaped = self.reshape(&bundle).context("executing reshape stage")?;
        let basis = SpatialBasis::covering(
            bundle.segments.iter().map(|s| (s.x, s.y)),
            self.config.basis_size,
        )
        .context("building spatial basis")?;
        let bins = self.config.cv_bins()?;

        let specs: &[ModelSpec] = match self.config.mode {
            AnalysisMode::TwoPlatform => &ModelSpec::ALL,
            AnalysisMode::SinglePlatform => &[ModelSpec::NoPlatform],
        };
        let fitter = PenalizedIrls::new(self.config.fit.clone());
        let mut outcomes = Vec::with_capacity(specs.len());
        let mut summary = Vec::new();
        for &spec in specs {
            let data = ModelData::build(spec, &basis, &reshaped, &detection)
                .with_context(|| format!("building model data for {}", spec.name()))?;
            let fitted = fitter
                .fit(spec, &basis, data, 0)
                .with_context(|| format!("executing model stage for {}", spec.name()))?;
            summary.extend(observed_vs_expected(&fitted));
            let model = if self.config.varprop {
                propagate_detection_variance(&fitted, &detection, &self.config.fit)
                    .with_context(|| format!("executing varprop stage for {}", spec.name()))?
            } else {
                fitted
            };
            let outcome = self
                .analyse(model, &bundle.grid, &bins)
                .with_context(|| format!("executing prediction stage for {}", spec.name()))?;
            outcomes.push(outcome);
        }

        Ok(WorkflowResult {
            bundle,
            detection,
            outcomes,
            summary,
        })
    }

    fn fit_detection(&self, bundle: &SurveyBundle) -> anyhow::Result<DetectionFunctionSet> {
        let mut set = DetectionFunctionSet::new();
        for &platform in self.platforms() {
            let spec = match platform {
                Platform::A => &self.config.platform_a,
                Platform::B => &self.config.platform_b,
            };
            let function = fit_detection_function(spec, &distances(&bundle.observations, platform))
                .with_context(|| format!("fitting detection function for platform {}", platform))?;
            info!(
                "platform {}: {} detection, p = {:.3}",
                platform,
                function.summary(platform.ddf_index()).model,
                function.probability()
            );
            set.insert(platform.ddf_index(), function);
        }
        Ok(set)
    }

    fn reshape(&self, bundle: &SurveyBundle) -> anyhow::Result<ReshapedSurvey> {
        let reshaped = match self.config.mode {
            AnalysisMode::TwoPlatform => {
                duplicate_by_platform(&bundle.segments, &bundle.observations)?
            }
            AnalysisMode::SinglePlatform => {
                let platform_a: Vec<Observation> = bundle
                    .observations
                    .iter()
                    .filter(|o| o.platform == Platform::A)
                    .cloned()
                    .collect();
                single_platform(&bundle.segments, &platform_a)?
            }
        };
        Ok(reshaped)
    }

    fn analyse(
        &self,
        model: FittedModel,
        grid: &PredictionGrid,
        bins: &CvBins,
    ) -> anyhow::Result<ModelOutcome> {
        let platforms = self.platforms();
        let mut predictions = Vec::with_capacity(platforms.len());
        for &platform in platforms {
            let abundance = predict_abundance(&model, grid, Some(platform))?;
            let density = density_surface(&abundance, grid, self.config.area_unit)?;
            info!(
                "{}: platform {} abundance {:.1}",
                model.label(),
                platform,
                abundance.total()
            );
            predictions.push(PlatformSurfaces {
                platform,
                abundance,
                density,
            });
        }

        let draws = MetropolisHastings::new(self.config.sampler.clone())
            .sample(&model)
            .context("executing mcmc stage")?;
        let prediction_draws = PredictionDraws::from_coefficients(&model, grid, &draws, platforms)?;

        let (combined, difference, uncertainty) = match predictions.as_slice() {
            [a, b] => {
                let (combined, difference) = combined_and_difference(&a.abundance, &b.abundance)?;
                let surfaces = summarise_uncertainty(
                    &prediction_draws,
                    &a.abundance,
                    &b.abundance,
                    self.config.uncertainty,
                    bins,
                )?;
                (
                    Some(combined),
                    Some(difference),
                    UncertaintyLayer::from_surfaces(surfaces),
                )
            }
            [only] => {
                let std_dev = prediction_draws.platform_variance(only.platform)?.map(f64::sqrt);
                let layer = UncertaintyLayer {
                    name: only.platform.to_string(),
                    method: None,
                    cells: uncertainty_cells(&only.abundance, &std_dev, bins)?,
                };
                (None, None, vec![layer])
            }
            _ => (None, None, Vec::new()),
        };

        Ok(ModelOutcome {
            model,
            predictions,
            combined,
            difference,
            acceptance_rate: draws.acceptance_rate,
            uncertainty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::survey::GeneratorConfig;
    use dsmcore::detection::KeyFunction;
    use dsmcore::model::SamplerConfig;
    use std::path::PathBuf;

    fn quick_config(mode: AnalysisMode) -> WorkflowConfig {
        let mut cfg = WorkflowConfig::from_args(None, PathBuf::from("unused"), mode, 60, Some(5));
        cfg.generator = GeneratorConfig {
            width: 20_000.0,
            height: 16_000.0,
            transects: 5,
            cell_size: 4_000.0,
            peak_density: 8.0,
            base_density: 2.0,
            seed: 5,
            ..GeneratorConfig::default()
        };
        cfg.basis_size = 5;
        cfg.sampler = SamplerConfig {
            samples: 60,
            burn_in: 40,
            thin: 1,
            scale: 0.3,
            seed: Some(5),
        };
        cfg.platform_a = DetectionSpec::Fitted {
            keys: vec![KeyFunction::HalfNormal],
            width: 800.0,
            cutpoints: None,
        };
        cfg
    }

    #[test]
    fn runner_executes_two_platform_workflow() {
        let runner = Runner::new(quick_config(AnalysisMode::TwoPlatform));
        let result = runner.execute().unwrap();
        assert_eq!(result.outcomes.len(), 3);
        assert_eq!(result.summary.len(), 3 * 2);
        assert_eq!(result.detection.iter().count(), 2);
        let grid_len = result.bundle.grid.len();
        for outcome in &result.outcomes {
            assert_eq!(outcome.model.extra_columns, 1);
            assert_eq!(outcome.predictions.len(), 2);
            let combined = outcome.combined.as_ref().unwrap();
            assert_eq!(combined.len(), grid_len);
            let a = &outcome.predictions[0].abundance;
            let b = &outcome.predictions[1].abundance;
            let first = combined.values[0].cell_id;
            let sum = a.get(first).unwrap() + b.get(first).unwrap();
            assert!((combined.get(first).unwrap() - sum).abs() < 1e-9 * sum.max(1.0));
            assert_eq!(outcome.uncertainty.len(), 4);
        }
    }

    #[test]
    fn combined_surface_recovers_the_simulated_population() {
        let mut cfg = quick_config(AnalysisMode::TwoPlatform);
        cfg.generator.transects = 8;
        cfg.generator.peak_density = 16.0;
        cfg.generator.base_density = 4.0;
        cfg.varprop = false;
        let truth = cfg.generator.expected_individuals();
        let result = Runner::new(cfg).execute().unwrap();
        for outcome in &result.outcomes {
            let total = outcome.combined.as_ref().unwrap().total();
            let ratio = total / truth;
            assert!(
                (0.7..1.3).contains(&ratio),
                "{}: estimated {:.1} against {:.1}",
                outcome.model.label(),
                total,
                truth
            );
        }
    }

    #[test]
    fn single_platform_mode_fits_one_model() {
        let runner = Runner::new(quick_config(AnalysisMode::SinglePlatform));
        let result = runner.execute().unwrap();
        assert_eq!(result.outcomes.len(), 1);
        assert_eq!(result.outcomes[0].model.spec, ModelSpec::NoPlatform);
        assert!(result.outcomes[0].combined.is_none());
        assert_eq!(result.outcomes[0].uncertainty.len(), 1);
        assert!(result.summary.iter().all(|row| row.platform == Platform::A));
    }

    #[test]
    fn detection_stage_falls_back_to_the_keys_that_fit() {
        let spec = DetectionSpec::Fitted {
            keys: vec![KeyFunction::HalfNormal],
            width: 100.0,
            cutpoints: None,
        };
        assert!(fit_detection_function(&spec, &[]).is_err());
        let dummy = fit_detection_function(&DetectionSpec::Dummy { width: 50.0 }, &[]).unwrap();
        assert_eq!(dummy.probability(), 1.0);
    }
}
