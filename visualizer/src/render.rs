use crate::model::{ModelReport, ReportCell, ResultsReport, UncertaintyLayer};
use crate::palette::{bin_colour, ColourScale, MISSING};
use anyhow::Context;
use dsmcore::processing::CellSurface;
use dsmcore::survey::{SurveyTrack, TrackCrs};
use geo::Rect;
use log::{info, warn};
use plotters::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub size: (u32, u32),
    /// Only cells touching this box are drawn.
    pub crop: Option<Rect<f64>>,
    pub track: bool,
    /// Captions, axes and legends. Needs a system font.
    pub labels: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            size: (900, 800),
            crop: None,
            track: true,
            labels: true,
        }
    }
}

enum Fill<'a> {
    Continuous {
        values: HashMap<u64, f64>,
        scale: ColourScale,
    },
    Binned {
        bins: HashMap<u64, Option<usize>>,
        labels: &'a [String],
    },
}

impl Fill<'_> {
    fn colour(&self, cell_id: u64) -> RGBColor {
        match self {
            Fill::Continuous { values, scale } => values
                .get(&cell_id)
                .map(|v| scale.colour(*v))
                .unwrap_or(MISSING),
            Fill::Binned { bins, labels } => match bins.get(&cell_id) {
                Some(Some(bin)) => bin_colour(*bin, labels.len()),
                _ => MISSING,
            },
        }
    }
}

fn surface_values(surface: &CellSurface) -> HashMap<u64, f64> {
    surface.values.iter().map(|v| (v.cell_id, v.value)).collect()
}

struct MapFigure<'a> {
    title: String,
    cells: &'a [&'a ReportCell],
    extent: Rect<f64>,
    track: Option<&'a SurveyTrack>,
}

fn draw_map(
    path: &Path,
    figure: &MapFigure<'_>,
    fill: &Fill<'_>,
    options: &RenderOptions,
) -> anyhow::Result<()> {
    let root = SVGBackend::new(path, options.size).into_drawing_area();
    root.fill(&WHITE)?;
    let (min, max) = (figure.extent.min(), figure.extent.max());

    let mut builder = ChartBuilder::on(&root);
    builder.margin(10);
    if options.labels {
        builder
            .caption(&figure.title, ("sans-serif", 20))
            .x_label_area_size(30)
            .y_label_area_size(60);
    }
    let mut chart = builder.build_cartesian_2d(min.x..max.x, min.y..max.y)?;
    if options.labels {
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("x (m)")
            .y_desc("y (m)")
            .draw()?;
    }

    for cell in figure.cells {
        let points: Vec<(f64, f64)> = cell.exterior.iter().map(|p| (p[0], p[1])).collect();
        let colour = fill.colour(cell.cell_id);
        chart.draw_series(std::iter::once(Polygon::new(points, colour.filled())))?;
    }

    if let Some(track) = figure.track {
        for line in &track.lines {
            chart.draw_series(std::iter::once(PathElement::new(
                line.iter().map(|p| (p[0], p[1])).collect::<Vec<_>>(),
                BLACK.mix(0.6),
            )))?;
        }
    }

    if options.labels {
        if let Fill::Binned { labels, .. } = fill {
            for (bin, label) in labels.iter().enumerate() {
                let colour = bin_colour(bin, labels.len());
                chart
                    .draw_series(std::iter::empty::<Polygon<(f64, f64)>>())?
                    .label(format!("CV {}", label))
                    .legend(move |(x, y)| {
                        Rectangle::new([(x, y - 5), (x + 10, y + 5)], colour.filled())
                    });
            }
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }
    }

    root.present()
        .with_context(|| format!("writing figure {}", path.display()))?;
    Ok(())
}

fn continuous(surface: &CellSurface, diverging: bool) -> Fill<'static> {
    let values = surface_values(surface);
    let scale = if diverging {
        ColourScale::diverging(values.values())
    } else {
        ColourScale::sequential(values.values())
    };
    Fill::Continuous { values, scale }
}

fn render_model(
    report: &ResultsReport,
    model: &ModelReport,
    base: &MapFigure<'_>,
    out_dir: &Path,
    options: &RenderOptions,
) -> anyhow::Result<Vec<PathBuf>> {
    let stem = model.file_stem();
    let mut written = Vec::new();
    let mut emit = |name: String, title: String, fill: Fill<'_>| -> anyhow::Result<()> {
        let path = out_dir.join(format!("{}_{}.svg", stem, name));
        let figure = MapFigure {
            title,
            cells: base.cells,
            extent: base.extent,
            track: base.track,
        };
        draw_map(&path, &figure, &fill, options)?;
        written.push(path);
        Ok(())
    };

    for platform in &model.platforms {
        emit(
            format!("abundance_{}", platform.platform),
            format!(
                "{}: abundance, platform {} (N = {:.1})",
                model.label, platform.platform, platform.total
            ),
            continuous(&platform.abundance, false),
        )?;
    }
    if let Some(combined) = &model.combined {
        emit(
            "combined".into(),
            format!("{}: combined abundance (A + B)", model.label),
            continuous(combined, false),
        )?;
    }
    if let Some(difference) = &model.difference {
        emit(
            "difference".into(),
            format!("{}: difference (A - B)", model.label),
            continuous(difference, true),
        )?;
    }
    for layer in &model.uncertainty {
        emit(
            format!("cv_{}", layer.name),
            cv_title(model, layer),
            Fill::Binned {
                bins: layer.cells.iter().map(|c| (c.cell_id, c.cv_bin)).collect(),
                labels: &report.cv_labels,
            },
        )?;
    }
    Ok(written)
}

fn cv_title(model: &ModelReport, layer: &UncertaintyLayer) -> String {
    match layer.method {
        Some(method) => format!("{}: CV, {} ({:?})", model.label, layer.name, method),
        None => format!("{}: CV, platform {}", model.label, layer.name),
    }
}

/// Writes every map for every model in `report` into `out_dir`.
pub fn render_report(
    report: &ResultsReport,
    out_dir: &Path,
    options: &RenderOptions,
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating figure directory {}", out_dir.display()))?;
    let cells = report.visible_cells(options.crop);
    let extent = match options.crop.or_else(|| ResultsReport::extent(&cells)) {
        Some(extent) => extent,
        None => {
            warn!("no grid cells to draw");
            return Ok(Vec::new());
        }
    };
    let track = match (&report.track, options.track) {
        (Some(track), true) if track.crs == TrackCrs::Projected => Some(track),
        (Some(_), true) => {
            warn!("survey track is not projected; drawing maps without it");
            None
        }
        _ => None,
    };
    let base = MapFigure {
        title: String::new(),
        cells: &cells,
        extent,
        track,
    };

    let mut written = Vec::new();
    for model in &report.models {
        written.extend(render_model(report, model, &base, out_dir, options)?);
    }
    info!("wrote {} figures to {}", written.len(), out_dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlatformReport;
    use dsmcore::model::ModelSpec;
    use dsmcore::processing::{CellValue, UncertaintyCell};
    use dsmcore::survey::{AreaUnit, GridCell, PredictionGrid};
    use dsmcore::Platform;
    use tempfile::tempdir;

    fn surface(values: &[(u64, f64)]) -> CellSurface {
        CellSurface::new(
            values
                .iter()
                .map(|&(cell_id, value)| CellValue { cell_id, value })
                .collect(),
        )
    }

    fn report() -> ResultsReport {
        let grid = PredictionGrid::new(
            (0..4)
                .map(|i| GridCell {
                    cell_id: i + 1,
                    x: 50.0 + 100.0 * (i % 2) as f64,
                    y: 50.0 + 100.0 * (i / 2) as f64,
                    area: 10_000.0,
                })
                .collect(),
        )
        .unwrap();
        let a = surface(&[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)]);
        let b = surface(&[(1, 2.0), (2, 2.0), (3, 1.0), (4, 0.5)]);
        let model = ModelReport {
            label: "platform_factor+varprop".into(),
            spec: ModelSpec::PlatformFactor,
            varprop: true,
            lambda: 1.0,
            edf: 4.2,
            deviance: 10.0,
            scale: 1.0,
            platforms: vec![
                PlatformReport {
                    platform: Platform::A,
                    total: a.total(),
                    density: a.clone(),
                    abundance: a,
                },
                PlatformReport {
                    platform: Platform::B,
                    total: b.total(),
                    density: b.clone(),
                    abundance: b,
                },
            ],
            combined: Some(surface(&[(1, 3.0), (2, 4.0), (3, 4.0), (4, 4.5)])),
            difference: Some(surface(&[(1, -1.0), (2, 0.0), (3, 2.0), (4, 3.5)])),
            acceptance_rate: Some(0.3),
            uncertainty: vec![UncertaintyLayer {
                name: "A".into(),
                method: None,
                cells: (1..=4)
                    .map(|cell_id| UncertaintyCell {
                        cell_id,
                        estimate: 1.0,
                        std_dev: 0.1,
                        cv: 0.1,
                        cv_bin: if cell_id == 4 { None } else { Some(1) },
                    })
                    .collect(),
            }],
        };
        ResultsReport {
            area_unit: AreaUnit::SquareKilometres,
            cv_labels: vec!["[0, 0.05]".into(), "(0.05, 0.1]".into(), "(0.1, Inf]".into()],
            detection: vec![],
            summary: vec![],
            cells: ReportCell::from_grid(&grid),
            track: Some(SurveyTrack {
                crs: TrackCrs::Projected,
                lines: vec![vec![[0.0, 100.0], [200.0, 100.0]]],
            }),
            models: vec![model],
        }
    }

    fn unlabelled() -> RenderOptions {
        RenderOptions {
            size: (200, 200),
            labels: false,
            ..RenderOptions::default()
        }
    }

    #[test]
    fn every_surface_gets_a_figure() {
        let dir = tempdir().unwrap();
        let written = render_report(&report(), dir.path(), &unlabelled()).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "platform_factor_varprop_abundance_A.svg",
                "platform_factor_varprop_abundance_B.svg",
                "platform_factor_varprop_combined.svg",
                "platform_factor_varprop_difference.svg",
                "platform_factor_varprop_cv_A.svg",
            ]
        );
        let svg = std::fs::read_to_string(&written[3]).unwrap();
        assert!(svg.contains("<polygon"));
        assert!(svg.contains("<polyline"));
    }

    #[test]
    fn crop_drops_cells_outside_the_box() {
        let dir = tempdir().unwrap();
        let options = RenderOptions {
            crop: Some(Rect::new((110.0, 110.0), (190.0, 190.0))),
            track: false,
            ..unlabelled()
        };
        let written = render_report(&report(), dir.path(), &options).unwrap();
        let svg = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(svg.matches("<polygon").count(), 1);
        assert!(!svg.contains("<polyline"));
    }

    #[test]
    fn difference_fill_is_diverging() {
        let fill = continuous(&surface(&[(1, -2.0), (2, 0.0)]), true);
        assert_eq!(fill.colour(2), RGBColor(247, 247, 247));
        assert_eq!(fill.colour(9), MISSING);
    }
}
