use anyhow::Context;
use clap::Parser;
use dsmcore::processing::render_table;
use generator::survey::generate_survey;
use report::export::{build_report, write_outputs};
use std::path::PathBuf;
use visualizer::{render_report, RenderOptions};
use workflow::config::{AnalysisMode, WorkflowConfig};
use workflow::runner::Runner;

mod generator;
mod report;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Two-platform density surface analysis driver")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Survey bundle directory; a synthetic survey is generated when omitted
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long, default_value = "output")]
    output: PathBuf,
    /// Analyse platform A alone with the no-platform model
    #[arg(long, default_value_t = false)]
    single_platform: bool,
    #[arg(long, default_value_t = 1000)]
    samples: usize,
    /// Seed for the sampler and the synthetic survey; unset draws from entropy
    #[arg(long)]
    seed: Option<u64>,
    /// Write the synthetic survey bundle to this directory and exit
    #[arg(long)]
    generate: Option<PathBuf>,
    /// Skip the SVG figures
    #[arg(long, default_value_t = false)]
    no_figures: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mode = if args.single_platform {
        AnalysisMode::SinglePlatform
    } else {
        AnalysisMode::TwoPlatform
    };
    let workflow_config = if let Some(path) = args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.input, args.output, mode, args.samples, args.seed)
    };

    if let Some(dir) = args.generate {
        let (bundle, geometry) = generate_survey(&workflow_config.generator)?;
        bundle
            .write(&dir, Some(&geometry))
            .with_context(|| format!("writing survey bundle {}", dir.display()))?;
        println!(
            "Synthetic survey -> {} segments, {} observations, {} cells in {}",
            bundle.segments.len(),
            bundle.observations.len(),
            bundle.grid.len(),
            dir.display()
        );
        return Ok(());
    }

    let runner = Runner::new(workflow_config.clone());
    let result = runner.execute()?;
    print!("{}", render_table(&result.summary));

    let report = build_report(&result, &workflow_config).context("assembling results")?;
    let written = write_outputs(&report, &workflow_config.output)?;
    for path in &written {
        println!("wrote {}", path.display());
    }

    if workflow_config.figures && !args.no_figures {
        let figures = render_report(
            &report,
            &workflow_config.output.join("figures"),
            &RenderOptions::default(),
        )
        .context("rendering figures")?;
        println!("rendered {} figures", figures.len());
    }
    Ok(())
}
