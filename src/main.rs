use clap::{Args, Parser, Subcommand};
use packcard::config::{BackgroundSpec, PipelineConfig};
use packcard::pipeline::{
    AccessoryInput, StarterPackJob, build_cutout_relief, build_starter_pack, slugify,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "packcard", version, about = "3D-printable starter pack card builder")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the full card: STL, print texture, and project file.
    Build(BuildArgs),
    /// Export a standalone cut-out relief from one color/depth pair.
    Cutout(CutoutArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Figure artwork (painted on the print texture).
    #[arg(long)]
    figure_img: PathBuf,
    /// Figure depth map (white displaces toward the viewer).
    #[arg(long)]
    figure_depth: PathBuf,

    #[arg(long)]
    acc1_img: Option<PathBuf>,
    #[arg(long, requires = "acc1_img")]
    acc1_depth: Option<PathBuf>,
    #[arg(long)]
    acc2_img: Option<PathBuf>,
    #[arg(long, requires = "acc2_img")]
    acc2_depth: Option<PathBuf>,
    #[arg(long)]
    acc3_img: Option<PathBuf>,
    #[arg(long, requires = "acc3_img")]
    acc3_depth: Option<PathBuf>,

    #[arg(long)]
    title: String,
    #[arg(long)]
    subtitle: Option<String>,
    /// Lettering color name.
    #[arg(long, default_value = "red")]
    text_color: String,
    /// TTF font for the lettering; without it the text is omitted.
    #[arg(long)]
    font: Option<PathBuf>,

    /// transparent | solid | image
    #[arg(long, default_value = "transparent")]
    background_type: String,
    /// Color name for --background-type solid.
    #[arg(long, default_value = "white")]
    background_color: String,
    /// Raster for --background-type image.
    #[arg(long)]
    background_image: Option<PathBuf>,

    /// Names the artifacts; defaults to a slug of the title.
    #[arg(long)]
    job_id: Option<String>,
    #[arg(long, default_value = "out")]
    output_dir: PathBuf,
}

#[derive(Args)]
struct CutoutArgs {
    #[arg(long)]
    color: PathBuf,
    #[arg(long)]
    depth: PathBuf,
    #[arg(long, default_value = "cutout.stl")]
    out: PathBuf,
}

fn accessory_pairs(args: &BuildArgs) -> Vec<AccessoryInput> {
    [
        (&args.acc1_img, &args.acc1_depth),
        (&args.acc2_img, &args.acc2_depth),
        (&args.acc3_img, &args.acc3_depth),
    ]
    .into_iter()
    .filter_map(|(img, depth)| match (img, depth) {
        (Some(color), Some(depth)) => Some(AccessoryInput {
            color: color.clone(),
            depth: depth.clone(),
        }),
        _ => None,
    })
    .collect()
}

fn background(args: &BuildArgs) -> BackgroundSpec {
    match args.background_type.as_str() {
        "solid" => BackgroundSpec::Solid(args.background_color.clone()),
        "image" => match &args.background_image {
            Some(path) => BackgroundSpec::Image(path.clone()),
            None => BackgroundSpec::Transparent,
        },
        _ => BackgroundSpec::Transparent,
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::default();
    let result = match cli.command {
        Command::Build(args) => {
            let job = StarterPackJob {
                job_id: args.job_id.clone().unwrap_or_else(|| slugify(&args.title)),
                figure_color: args.figure_img.clone(),
                figure_depth: args.figure_depth.clone(),
                accessories: accessory_pairs(&args),
                title: args.title.clone(),
                subtitle: args.subtitle.clone(),
                text_color: args.text_color.clone(),
                background: background(&args),
                font: args.font.clone(),
            };
            build_starter_pack(&job, &config, &args.output_dir).map(|report| {
                println!("{}", report.stl_path.display());
                println!("{}", report.texture_path.display());
                println!("{}", report.project_path.display());
                for omission in &report.omissions {
                    eprintln!("omitted {}: {}", omission.what, omission.reason);
                }
            })
        },
        Command::Cutout(args) => build_cutout_relief(&args.color, &args.depth, &config, &args.out),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(stage = %err.stage, "build failed: {err}");
            let mut source: Option<&dyn std::error::Error> = std::error::Error::source(&err);
            while let Some(cause) = source {
                error!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        },
    }
}
