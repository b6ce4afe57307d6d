use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use pcalign::{
    error::Result,
    model::{load_from_checkpoint, ModelRegistry},
    pipeline::{AlignParams, PairwiseAligner},
    scene::write_scene,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Aligns two point clouds with a trained registration model")]
struct Args {
    /// Path to the model checkpoint
    #[arg(long, short = 'c')]
    checkpoint: PathBuf,
    /// Whether to refine the model pose afterwards
    #[arg(long = "fine_tune", short = 'f', default_value_t = true, action = clap::ArgAction::Set)]
    fine_tune: bool,
    /// Cloud the target is aligned to
    #[arg(long, default_value = "./pcds/cloud_bin_0.pcd")]
    source: PathBuf,
    /// Cloud moved by the estimated pose
    #[arg(long, default_value = "./pcds/cloud_bin_1.pcd")]
    target: PathBuf,
    /// Voxel size used to downsample both clouds, overrides the config file
    #[arg(long)]
    voxel_size: Option<f32>,
    /// JSON file with alignment parameters
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory where source.ply, target.ply and result.ply are written
    #[arg(long, short, default_value = "./out")]
    output: PathBuf,
}

fn run(args: Args) -> Result<()> {
    let mut params = match &args.config {
        Some(path) => AlignParams::from_json_file(path)?,
        None => AlignParams::default(),
    };
    params.fine_tune(args.fine_tune);
    if let Some(voxel_size) = args.voxel_size {
        params.voxel_size(voxel_size);
    }

    let model = load_from_checkpoint(&args.checkpoint, &ModelRegistry::default())?;
    let alignment = PairwiseAligner::new(params, model.as_ref()).align_files(&args.source, &args.target)?;
    write_scene(&alignment, &args.output)?;

    println!("{}", alignment.registration.pose.0);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
