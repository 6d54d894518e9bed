//! PDF Stamp CLI tool
//!
//! A command-line tool for stamping a text watermark onto every page of a PDF.

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use pdf_stamp::pdf::{composite, inspect_file};
use pdf_stamp::watermark::{Color, WatermarkSpec};

/// PDF Stamp - watermark every page of a PDF
#[derive(Parser)]
#[command(name = "pdf-stamp")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Diagonal red CONFIDENTIAL stamp across every page
    pdf-stamp stamp input.pdf -o output.pdf --text CONFIDENTIAL

    # Subtle gray draft mark, straightened and nudged down
    pdf-stamp stamp input.pdf --text DRAFT --color '#888' --opacity 0.3 --rotate 0 --y-offset -200

    # Default output name (Signed_<timestamp>.pdf), then open it
    pdf-stamp stamp input.pdf --text APPROVED --open

    # Inspect a PDF before stamping
    pdf-stamp info input.pdf")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stamp a text watermark onto every page of a PDF
    Stamp {
        /// Input PDF file
        input: PathBuf,

        /// Output PDF file path (defaults to Signed_<timestamp>.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Watermark text
        #[arg(long)]
        text: String,

        /// Font size in points
        #[arg(long, default_value_t = 40.0)]
        size: f64,

        /// Text color as #RGB or #RRGGBB
        #[arg(long, default_value = "#ff0000")]
        color: String,

        /// Opacity between 0 and 1
        #[arg(long, default_value_t = 0.5)]
        opacity: f64,

        /// Rotation in degrees, counter-clockwise positive
        #[arg(long, default_value_t = 45.0, allow_negative_numbers = true)]
        rotate: f64,

        /// Horizontal offset of the stamp center from the page center (points)
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        x_offset: f64,

        /// Vertical offset of the stamp center from the page center (points)
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        y_offset: f64,

        /// Open the output file after creation
        #[arg(long)]
        open: bool,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Stamp {
            input,
            output,
            text,
            size,
            color,
            opacity,
            rotate,
            x_offset,
            y_offset,
            open,
        } => cmd_stamp(
            input, output, text, size, color, opacity, rotate, x_offset, y_offset, open,
        ),
        Commands::Info { input } => cmd_info(input),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Default output name mirroring the usual "signed copy" download
fn default_output_name() -> PathBuf {
    PathBuf::from(format!("Signed_{}.pdf", Local::now().format("%Y%m%d-%H%M%S")))
}

/// Open a file with the system default application
fn open_file(path: &PathBuf) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(path).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(path).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

/// Stamp a watermark onto every page of a PDF
#[allow(clippy::too_many_arguments)]
fn cmd_stamp(
    input: PathBuf,
    output: Option<PathBuf>,
    text: String,
    size: f64,
    color: String,
    opacity: f64,
    rotate: f64,
    x_offset: f64,
    y_offset: f64,
    open: bool,
) -> Result<()> {
    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }
    if !(0.0..=1.0).contains(&opacity) {
        bail!("Opacity must be between 0 and 1, got {}", opacity);
    }

    let source = std::fs::read(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let spec = WatermarkSpec {
        text,
        font_size_pt: size,
        color: Color::parse(&color)?,
        opacity,
        rotation_deg: rotate,
        offset_x: x_offset,
        offset_y: y_offset,
    };

    let output = output.unwrap_or_else(default_output_name);

    eprintln!("Stamping {}...", input.display());
    let stamped = composite(&source, &spec)?;

    std::fs::write(&output, stamped)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    eprintln!("Output: {}", output.display());

    if open {
        open_file(&output)?;
    }

    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: PathBuf) -> Result<()> {
    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }

    let metadata = inspect_file(&input)?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);

    if let Some(title) = metadata.title {
        println!("Title: {}", title);
    }
    if let Some(author) = metadata.author {
        println!("Author: {}", author);
    }

    Ok(())
}
