//! jpegcoef CLI - inspect the quantized DCT coefficients of JPEG files.
//!
//! Opens each file with a decode session, the way a steganalysis tool
//! would, and reports what the session captured.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use jpegcoef_rs::{CommentOverflow, Session, SessionOptions};

/// Coefficient-level JPEG inspector
#[derive(Parser)]
#[command(name = "jpegcoef")]
#[command(version)]
#[command(about = "Inspect quantized DCT coefficients, comments and APPn markers of JPEG files", long_about = None)]
#[command(after_help = "EXAMPLES:
    jpegcoef info photo.jpg
    jpegcoef info --verbose *.jpg
    jpegcoef block photo.jpg -c 0 -r 2 -x 5")]
struct Cli {
    /// Log decoder traces and warnings (RUST_LOG overrides the level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Comments kept per image
    #[arg(long, global = true, default_value_t = 10)]
    max_comments: usize,

    /// Fail on images with more comments than --max-comments instead of dropping the rest
    #[arg(long, global = true)]
    reject_extra_comments: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show frame shape, block grids, comments and APPn markers
    #[command(visible_alias = "i")]
    Info {
        /// JPEG files to open
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print one 8x8 coefficient block
    #[command(visible_alias = "b")]
    Block {
        /// JPEG file to open
        file: PathBuf,

        /// Component index (0..3)
        #[arg(short, long, default_value = "0")]
        component: usize,

        /// Block row
        #[arg(short, long, default_value = "0")]
        row: usize,

        /// Block column
        #[arg(short = 'x', long, default_value = "0")]
        col: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};
        let default_level = if cli.verbose { "debug" } else { "warn" };
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
            .init();
    }

    let options = SessionOptions {
        max_comments: cli.max_comments,
        comment_overflow: if cli.reject_extra_comments {
            CommentOverflow::Reject
        } else {
            CommentOverflow::Discard
        },
    };
    let mut session = Session::with_options(options);

    let ok = match cli.command {
        Commands::Info { files } => {
            let mut all_ok = true;
            for file in &files {
                all_ok &= show_info(&mut session, file);
            }
            all_ok
        }
        Commands::Block {
            file,
            component,
            row,
            col,
        } => show_block(&mut session, &file, component, row, col),
    };

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn show_info(session: &mut Session, input: &Path) -> bool {
    let trailing = Rc::new(Cell::new(false));
    let seen = trailing.clone();
    session.set_end_of_image_observer(move |_| seen.set(true));

    // Open failures are already reported on stderr by the session.
    if session.open(input).is_err() {
        return false;
    }

    println!("File: {}", input.display());
    if let Some(info) = session.frame_info() {
        println!("  Dimensions: {}x{}", info.width, info.height);
        println!("  Bit depth:  {} bits", info.bits_per_sample);
        println!("  Process:    {:?}", info.process);
        println!("  Color:      {:?} -> {:?}", info.jpeg_color_space, info.out_color_space);
    }
    if let Some(grids) = session.block_grids() {
        for (i, grid) in grids.iter().enumerate() {
            println!(
                "  Component {i}: {}x{} blocks",
                grid.width_in_blocks, grid.height_in_blocks
            );
        }
    }

    let comments = session.comments();
    println!(
        "  Comments:   {} ({} discarded)",
        comments.len(),
        session.discarded_comments()
    );
    for (i, comment) in comments.iter().enumerate() {
        println!("    [{i}] {} bytes: {:?}", comment.len(), comment.text());
    }

    let markers: Vec<String> = session.app_markers().iter().map(|n| format!("APP{n}")).collect();
    if markers.is_empty() {
        println!("  Markers:    none");
    } else {
        println!("  Markers:    {}", markers.join(" "));
    }
    println!("  Warnings:   {}", session.num_warnings());
    if trailing.get() {
        println!("  Data follows the end of image");
    }

    session.finish();
    true
}

fn show_block(session: &mut Session, input: &Path, component: usize, row: usize, col: usize) -> bool {
    if session.open(input).is_err() {
        return false;
    }

    let block = session
        .coefficients()
        .and_then(|view| view.component(component))
        .and_then(|coefficients| coefficients.block(row, col));
    let found = match block {
        Some(block) => {
            println!("{}: component {component} block ({row}, {col})", input.display());
            for line in block.chunks(8) {
                let cells: Vec<String> = line.iter().map(|c| format!("{c:5}")).collect();
                println!("{}", cells.join(" "));
            }
            true
        }
        None => {
            eprintln!("{} : error: no block ({row}, {col}) in component {component}", input.display());
            false
        }
    };

    session.finish();
    found
}
