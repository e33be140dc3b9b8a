use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use hwpx_pdf::GenerateOptions;

#[derive(Parser)]
#[command(name = "hwpx-pdf")]
#[command(version)]
#[command(about = "Convert HWPX documents to paginated PDF", long_about = None)]
struct Cli {
    /// Input HWPX file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output PDF file (defaults to the input path with a .pdf extension)
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Font file used for serif (Myeongjo/Batang) text
    #[arg(long, value_name = "FILE")]
    serif_font: Option<PathBuf>,

    /// Font file used for sans (Gothic/Dotum) text
    #[arg(long, value_name = "FILE")]
    sans_font: Option<PathBuf>,

    /// Extra directory searched for fonts; may be repeated
    #[arg(long = "font-dir", value_name = "DIR")]
    font_dirs: Vec<PathBuf>,

    /// Apply CJK line-start/line-end prohibitions when wrapping
    #[arg(long)]
    kinsoku: bool,

    /// Only use the standard PDF faces and explicitly given fonts
    #[arg(long)]
    no_system_fonts: bool,

    /// Log timing and layout decisions
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("pdf"));
    let options = GenerateOptions {
        serif_font: cli.serif_font,
        sans_font: cli.sans_font,
        font_dirs: cli.font_dirs,
        kinsoku: cli.kinsoku,
        use_system_fonts: !cli.no_system_fonts,
    };

    match hwpx_pdf::convert_hwpx_to_pdf(&cli.input, &output, &options) {
        Ok(()) => {
            println!("{} -> {}", cli.input.display(), output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
