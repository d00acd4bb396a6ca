use anyhow::{bail, Context};
use clap::Parser;
use geo::Rect;
use std::path::PathBuf;
use visualizer::{render_report, RenderOptions, ResultsReport};

#[derive(Parser)]
#[command(author, version, about = "Renders density surface maps from exported results")]
struct Args {
    /// Results file written by the workflow driver
    results: PathBuf,
    /// Directory for the SVG figures
    #[arg(long, default_value = "figures")]
    out: PathBuf,
    /// Crop to min_x min_y max_x max_y (projected metres)
    #[arg(
        long,
        num_args = 4,
        value_names = ["MIN_X", "MIN_Y", "MAX_X", "MAX_Y"],
        allow_negative_numbers = true
    )]
    crop: Option<Vec<f64>>,
    /// Leave the survey track off the maps
    #[arg(long, default_value_t = false)]
    no_track: bool,
    #[arg(long, default_value_t = 900)]
    width: u32,
    #[arg(long, default_value_t = 800)]
    height: u32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let crop = match args.crop.as_deref() {
        None => None,
        Some([min_x, min_y, max_x, max_y]) => {
            if min_x >= max_x || min_y >= max_y {
                bail!("crop box must have min below max on both axes");
            }
            Some(Rect::new((*min_x, *min_y), (*max_x, *max_y)))
        }
        Some(other) => bail!("crop needs four values, got {}", other.len()),
    };

    let report = ResultsReport::load(&args.results)?;
    let options = RenderOptions {
        size: (args.width, args.height),
        crop,
        track: !args.no_track,
        labels: true,
    };
    let written = render_report(&report, &args.out, &options)
        .with_context(|| format!("rendering {}", args.results.display()))?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}
