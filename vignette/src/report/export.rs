use crate::workflow::config::WorkflowConfig;
use crate::workflow::runner::{ModelOutcome, WorkflowResult};
use anyhow::Context;
use dsmcore::processing::summary::write_csv;
use dsmcore::Platform;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use visualizer::{ModelReport, PlatformReport, ReportCell, ResultsReport, RESULTS_FILE};

pub const SUMMARY_FILE: &str = "summary.csv";
pub const PREDICTIONS_FILE: &str = "predictions.csv";

#[derive(Debug, Serialize)]
struct PredictionRow<'a> {
    model: &'a str,
    platform: Platform,
    cell_id: u64,
    abundance: f64,
    density: f64,
}

fn model_report(outcome: &ModelOutcome) -> ModelReport {
    let model = &outcome.model;
    ModelReport {
        label: model.label(),
        spec: model.spec,
        varprop: model.extra_columns > 0,
        lambda: model.lambda,
        edf: model.edf,
        deviance: model.deviance,
        scale: model.scale,
        platforms: outcome
            .predictions
            .iter()
            .map(|p| PlatformReport {
                platform: p.platform,
                total: p.abundance.total(),
                abundance: p.abundance.clone(),
                density: p.density.clone(),
            })
            .collect(),
        combined: outcome.combined.clone(),
        difference: outcome.difference.clone(),
        acceptance_rate: Some(outcome.acceptance_rate),
        uncertainty: outcome.uncertainty.clone(),
    }
}

pub fn build_report(
    result: &WorkflowResult,
    config: &WorkflowConfig,
) -> anyhow::Result<ResultsReport> {
    Ok(ResultsReport {
        area_unit: config.area_unit,
        cv_labels: config.cv_bins()?.labels(),
        detection: result.detection.summaries(),
        summary: result.summary.clone(),
        cells: ReportCell::from_grid(&result.bundle.grid),
        track: result.bundle.track.clone(),
        models: result.outcomes.iter().map(model_report).collect(),
    })
}

fn write_predictions(path: &Path, report: &ResultsReport) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for model in &report.models {
        for platform in &model.platforms {
            let rows = platform.abundance.values.iter().zip(&platform.density.values);
            for (abundance, density) in rows {
                writer.serialize(PredictionRow {
                    model: &model.label,
                    platform: platform.platform,
                    cell_id: abundance.cell_id,
                    abundance: abundance.value,
                    density: density.value,
                })?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes the results file, the count summary and the per-cell predictions.
pub fn write_outputs(report: &ResultsReport, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;

    let results = dir.join(RESULTS_FILE);
    report.save(&results)?;

    let summary = dir.join(SUMMARY_FILE);
    let file = File::create(&summary).with_context(|| format!("creating {}", summary.display()))?;
    write_csv(file, &report.summary).with_context(|| format!("writing {}", summary.display()))?;

    let predictions = dir.join(PREDICTIONS_FILE);
    write_predictions(&predictions, report)
        .with_context(|| format!("writing {}", predictions.display()))?;

    Ok(vec![results, summary, predictions])
}
