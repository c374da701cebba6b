//! poextract CLI - purchase-order extraction tool

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use poextract::render::{self, JsonFormat, SizeSheet};
use poextract::{Coordinator, Error, ExtractOptions, PdfParser, Severity, ValidatedRecord};

/// Exit code when a record was produced but carries error-severity issues.
const EXIT_NEEDS_REVIEW: u8 = 2;

#[derive(Parser)]
#[command(name = "poextract")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Extract and validate purchase orders from vendor PDFs", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Options file (JSON)
    #[arg(long, global = true, value_name = "FILE", env = "POEXTRACT_CONFIG")]
    config: Option<PathBuf>,

    /// Skip pages that fail to decode
    #[arg(long, global = true)]
    lenient: bool,

    /// Document password
    #[arg(long, global = true, value_name = "PASSWORD")]
    password: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a purchase order to JSON
    Extract {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        /// Include the QA report and size sheet
        #[arg(long)]
        bundle: bool,
    },

    /// Print the QA report; exits with 2 when any error-level issue is found
    Check {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Print the size sheet as tab-separated values
    Sizes {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Extract many files in parallel, one JSON file each
    Batch {
        /// Input PDF files
        #[arg(value_name = "FILES", required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();

    let options = match load_options(cli.config.as_deref(), cli.lenient, cli.password) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Some(Commands::Extract {
            input,
            output,
            compact,
            bundle,
        }) => cmd_extract(&input, output.as_deref(), compact, bundle, options),
        Some(Commands::Check { input }) => cmd_check(&input, options),
        Some(Commands::Sizes { input, output }) => cmd_sizes(&input, output.as_deref(), options),
        Some(Commands::Batch { inputs, output }) => cmd_batch(&inputs, output.as_deref(), &options),
        Some(Commands::Version) => {
            cmd_version();
            Ok(ExitCode::SUCCESS)
        }
        None => {
            // Default behavior: extract if input is provided
            if let Some(input) = cli.input {
                cmd_extract(&input, None, false, false, options)
            } else {
                println!("{}", "Usage: poextract <FILE>".yellow());
                println!("       poextract --help for more information");
                Ok(ExitCode::SUCCESS)
            }
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            if let Some(Error::ExtractionIncomplete { missing }) = e.downcast_ref::<Error>() {
                for field in missing {
                    eprintln!("  {} {}", "missing".yellow(), field);
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn load_options(
    config: Option<&Path>,
    lenient: bool,
    password: Option<String>,
) -> Result<ExtractOptions, Box<dyn std::error::Error>> {
    let mut options = match config {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            ExtractOptions::from_json(&json)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?
        }
        None => ExtractOptions::default(),
    };
    if lenient {
        options = options.lenient();
    }
    if let Some(password) = password {
        options = options.with_password(password);
    }
    Ok(options)
}

fn extract_one(coordinator: &Coordinator, input: &Path) -> poextract::Result<ValidatedRecord> {
    let parser = PdfParser::open_with_options(input, coordinator.options().parse_options())?;
    let name = input.file_name().map(|n| n.to_string_lossy().into_owned());
    coordinator.extract(&parser, name.as_deref())
}

fn write_or_print(output: Option<&Path>, content: &str) -> std::io::Result<()> {
    if let Some(path) = output {
        fs::write(path, content)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", content);
    }
    Ok(())
}

fn cmd_extract(
    input: &Path,
    output: Option<&Path>,
    compact: bool,
    bundle: bool,
    options: ExtractOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let vocabulary = options.size_vocabulary.clone();
    let record = extract_one(&Coordinator::new(options), input)?;

    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };
    let json = if bundle {
        let sheet = SizeSheet::from_record(&record, &vocabulary);
        render::to_json_bundle(&record, &sheet, format)?
    } else {
        render::to_json(&record, format)?
    };

    write_or_print(output, &json)?;

    let report = record.report();
    if !report.ok || report.warnings > 0 {
        eprintln!(
            "{} {} errors, {} warnings",
            "QA:".yellow().bold(),
            report.errors,
            report.warnings
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_check(input: &Path, options: ExtractOptions) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let record = extract_one(&Coordinator::new(options), input)?;

    println!("{}", "Purchase Order".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for line in render::to_report(&record).lines() {
        if line.contains("[error]") {
            println!("{}", line.red());
        } else if line.contains("[warning]") {
            println!("{}", line.yellow());
        } else {
            println!("{}", line);
        }
    }

    let has_errors = record.qa_flags().iter().any(|i| i.severity == Severity::Error);
    if has_errors {
        Ok(ExitCode::from(EXIT_NEEDS_REVIEW))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn cmd_sizes(
    input: &Path,
    output: Option<&Path>,
    options: ExtractOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let vocabulary = options.size_vocabulary.clone();
    let record = extract_one(&Coordinator::new(options), input)?;
    let sheet = SizeSheet::from_record(&record, &vocabulary);

    write_or_print(output, &size_sheet_tsv(&sheet))?;
    Ok(ExitCode::SUCCESS)
}

fn size_sheet_tsv(sheet: &SizeSheet) -> String {
    let mut lines = vec![sheet.header().join("\t")];
    for row in &sheet.rows {
        let mut cells = vec![
            row.style.clone().unwrap_or_default(),
            row.dev_code.clone().unwrap_or_default(),
            row.hts_code.clone().unwrap_or_default(),
            row.product.clone(),
        ];
        cells.extend(row.quantities.iter().map(|q| q.to_string()));
        cells.push(row.total.to_string());
        lines.push(cells.join("\t"));
    }
    lines.join("\n")
}

fn cmd_batch(
    inputs: &[PathBuf],
    output: Option<&Path>,
    options: &ExtractOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let output_dir = output
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&output_dir)?;

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let coordinator = Coordinator::new(options.clone());
    let failed = AtomicUsize::new(0);
    let needs_review = AtomicUsize::new(0);

    inputs.par_iter().for_each(|input| {
        let result = extract_one(&coordinator, input).map_err(|e| e.to_string()).and_then(|record| {
            let json = render::to_json(&record, JsonFormat::Pretty).map_err(|e| e.to_string())?;
            let stem = input.file_stem().unwrap_or_default().to_string_lossy();
            fs::write(output_dir.join(format!("{}.json", stem)), json).map_err(|e| e.to_string())?;
            Ok(record.report().ok)
        });

        match result {
            Ok(true) => {}
            Ok(false) => {
                needs_review.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                failed.fetch_add(1, Ordering::Relaxed);
                pb.println(format!("{} {}: {}", "Failed".red(), input.display(), e));
            }
        }
        pb.set_message(input.file_name().unwrap_or_default().to_string_lossy().into_owned());
        pb.inc(1);
    });

    pb.finish_with_message("Done!");

    let failed = failed.into_inner();
    let needs_review = needs_review.into_inner();
    println!(
        "\n{} {} extracted, {} need review, {} failed",
        "Summary:".green().bold(),
        inputs.len() - failed,
        needs_review,
        failed
    );

    if failed > 0 {
        Ok(ExitCode::FAILURE)
    } else if needs_review > 0 {
        Ok(ExitCode::from(EXIT_NEEDS_REVIEW))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn cmd_version() {
    println!("{} {}", "poextract".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Purchase-order extraction tool");
    println!();
    println!("Repository: {}", "https://github.com/iyulab/poextract".dimmed());
    println!("License: MIT");
}
