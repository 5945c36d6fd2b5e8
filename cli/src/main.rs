use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::*;
use log::{error, info};
use picker_lib::{
    Dpi, Error, ImageFormat, OutputConfig, PageTile, PdfSession, PdfiumRasterizer, Preview,
    SessionSnapshot,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;

/// Exit code for failures that do not come from the picker itself.
const GENERIC_FAILURE: u8 = 100;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// More output; repeat for more detail
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON file with output settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Base name of the files written
    #[arg(long, global = true)]
    name: Option<String>,

    /// Directory holding the pdfium shared library
    #[arg(long, global = true)]
    pdfium_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the selected pages to a new PDF, in page order
    Extract {
        pdf: PathBuf,
        /// Pages to toggle, 1-indexed, in click order
        #[arg(long, value_delimiter = ',', required = true)]
        pages: Vec<usize>,
    },
    /// Append SECOND to FIRST
    Merge { first: PathBuf, second: PathBuf },
    /// Write every page as an image
    Rasterize {
        pdf: PathBuf,
        #[arg(long)]
        dpi: Option<u32>,
        #[arg(long)]
        format: Option<ImageFormat>,
    },
    /// Print the session as JSON
    Inspect {
        pdf: PathBuf,
        #[arg(long, value_delimiter = ',')]
        pages: Vec<usize>,
        /// Include base64 thumbnails
        #[arg(long)]
        previews: bool,
    },
}

#[derive(Serialize)]
struct Inspection {
    #[serde(flatten)]
    snapshot: SessionSnapshot,
    tiles: Vec<PageTile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    previews: Option<Vec<Preview>>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => ExitCode::from(report_failure(&e)),
    }
}

/// Logs `failure` and returns the exit code for it.
fn report_failure(failure: &anyhow::Error) -> u8 {
    error!("{:#}", failure);
    failure
        .downcast_ref::<Error>()
        .map(|e| e.kind().code() as u8)
        .unwrap_or(GENERIC_FAILURE)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref(), cli.name, cli.output_dir)?;

    let mut rasterizer = PdfiumRasterizer::new();
    if let Some(dir) = cli.pdfium_dir {
        rasterizer = rasterizer.with_library_dir(dir);
    }

    match cli.command {
        Commands::Extract { pdf, pages } => {
            let mut session = PdfSession::new(rasterizer, config);
            session.load_primary(&pdf)?;
            for index in page_indices(&pages)? {
                session.toggle(index)?;
            }

            let path = session.extract()?;
            println!("{} {}", "Saved:".green(), path.display());
        }
        Commands::Merge { first, second } => {
            let mut session = PdfSession::new(rasterizer, config);
            session.load_primary(&first)?;
            session.load_secondary(&second)?;

            let path = session.merge()?;
            println!("{} {}", "Saved:".green(), path.display());
        }
        Commands::Rasterize { pdf, dpi, format } => {
            let (sender, receiver) = mpsc::channel();
            let progress = thread::spawn(move || {
                for (rendered, total) in receiver {
                    info!("Rendered page {}/{}", rendered, total);
                }
            });

            let mut session = PdfSession::new(rasterizer.with_progress(sender), config);
            if let Some(dpi) = dpi {
                session.set_dpi(Dpi::new(dpi)?);
            }
            if let Some(format) = format {
                session.set_image_format(format);
            }
            session.load_primary(&pdf)?;

            let written = session.rasterize_all();
            drop(session);
            let _ = progress.join();

            for path in written? {
                println!("{} {}", "Saved:".green(), path.display());
            }
        }
        Commands::Inspect {
            pdf,
            pages,
            previews,
        } => {
            let mut session = PdfSession::new(rasterizer, config);
            session.load_primary(&pdf)?;
            for index in page_indices(&pages)? {
                session.toggle(index)?;
            }

            let inspection = Inspection {
                snapshot: session.snapshot(),
                tiles: session.tiles(),
                previews: if previews {
                    Some(session.previews()?)
                } else {
                    None
                },
            };
            println!("{}", serde_json::to_string_pretty(&inspection)?);
        }
    }

    Ok(())
}

fn load_config(
    path: Option<&Path>,
    name: Option<String>,
    output_dir: Option<PathBuf>,
) -> Result<OutputConfig> {
    let mut config = match path {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid settings in {}", path.display()))?
        }
        None => OutputConfig::default(),
    };

    if let Some(name) = name {
        config.basename = name;
    }
    if let Some(output_dir) = output_dir {
        config.output_dir = output_dir;
    }

    Ok(config)
}

/// Converts the 1-indexed page numbers users see into page indices.
fn page_indices(pages: &[usize]) -> Result<Vec<usize>> {
    pages
        .iter()
        .map(|&page| {
            page.checked_sub(1)
                .ok_or_else(|| anyhow!("Page numbers start at 1"))
        })
        .collect()
}
