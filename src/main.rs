use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use scene_navigator::controller::SimulatedApplication;
use scene_navigator::detection::SimulatedOcr;
use scene_navigator::regions::{ClickRegionResolver, HeuristicRegionResolver};
use scene_navigator::{
    Configuration, CoordinatorBuilder, NavigationMap, NavigationReport, NavigatorError, RunStatus,
};
use tracing::Level;

const EXIT_ABORTED: u8 = 1;
const EXIT_SETUP: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

/// Walks every scene of a navigation map against a running application and
/// writes a screenshot per scene plus a JSON report.
#[derive(Parser)]
#[command(name = "scene-navigator")]
#[command(about = "Breadth-first scene traversal with screenshots and a coverage report")]
struct Args {
    /// Navigation map (JSON with `scenes` and `edges`)
    #[arg(short = 'm', long)]
    map: Option<PathBuf>,

    /// Application executable to launch
    #[arg(short = 'a', long)]
    app: Option<PathBuf>,

    /// Directory for the report and screenshots
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Optional configuration file (TOML, YAML or JSON)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Substring of the window title to wait for
    #[arg(long)]
    window_title: Option<String>,

    /// Attempts per edge before it is recorded as failed
    #[arg(long)]
    retries: Option<u32>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn configuration(args: &Args) -> Result<Configuration, NavigatorError> {
    let mut configuration = Configuration::load(args.config.as_deref())?;
    if let Some(map) = &args.map {
        configuration.map_path = map.clone();
    }
    if let Some(app) = &args.app {
        configuration.app_path = app.clone();
    }
    if let Some(output) = &args.output {
        configuration.output_dir = output.clone();
    }
    if let Some(title) = &args.window_title {
        configuration.window_title_hint = title.clone();
    }
    if let Some(retries) = args.retries {
        configuration.retry_bound = retries;
    }
    Ok(configuration)
}

async fn navigate(args: &Args) -> Result<NavigationReport, NavigatorError> {
    let configuration = configuration(args)?;
    let graph = NavigationMap::load(&configuration.map_path)?.into_graph()?;
    tracing::info!(
        "Loaded {} scenes and {} edges (start '{}', hub {:?})",
        graph.scene_count(),
        graph.edge_count(),
        graph.start(),
        graph.hub()
    );

    // Rehearsal backend: the application is simulated from the map itself.
    let resolver: Arc<dyn ClickRegionResolver> =
        Arc::new(HeuristicRegionResolver::new(configuration.regions.clone()));
    let application = SimulatedApplication::builder(graph.clone())
        .resolver(Arc::clone(&resolver))
        .require_executable(true)
        .build();
    let ocr = SimulatedOcr::new(graph.scenes().cloned().collect());

    CoordinatorBuilder::new(configuration)
        .graph(graph)
        .controller(Arc::new(application))
        .text_extractor(Box::new(ocr))
        .resolver(resolver)
        .build()?
        .run()
        .await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match navigate(&args).await {
        Ok(report) => match report.status {
            RunStatus::Completed => ExitCode::SUCCESS,
            RunStatus::Aborted { .. } => ExitCode::from(EXIT_ABORTED),
            RunStatus::Cancelled => ExitCode::from(EXIT_CANCELLED),
        },
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(EXIT_SETUP)
        }
    }
}
