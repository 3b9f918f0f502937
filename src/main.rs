use std::path::PathBuf;
use std::process::ExitCode;

use cv_photo_extract::config;
use cv_photo_extract::pipeline::runner::{PhotoJob, run_all};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: cv_photo_extract [--data-url] <file>...");
        eprintln!("  Extract the embedded photo from CV documents (PDF or DOCX).");
        eprintln!("  --data-url  print a JSON {{mimeType, data}} payload instead of writing files");
        return if args.is_empty() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!("cv_photo_extract {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(unknown) = args
        .iter()
        .find(|a| a.starts_with('-') && a.as_str() != "--data-url")
    {
        eprintln!("ERROR: unknown option: {unknown}");
        eprintln!("Usage: cv_photo_extract [--data-url] <file>...");
        return ExitCode::FAILURE;
    }

    let data_url = args.iter().any(|a| a == "--data-url");
    let inputs: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();
    if inputs.is_empty() {
        eprintln!("ERROR: no input files given");
        return ExitCode::FAILURE;
    }

    // Load settings from the same directory as each input file.
    let mut jobs: Vec<PhotoJob> = Vec::new();
    for input in inputs {
        let input_path = PathBuf::from(input);
        let settings = match config::load_settings_for_input(&input_path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("ERROR: Failed to load settings for {input}: {e}");
                return ExitCode::FAILURE;
            }
        };

        jobs.push(PhotoJob {
            input_path,
            limits: settings.limits,
            write_output: !data_url,
        });
    }

    let results = run_all(&jobs);

    let mut has_error = false;
    for (job, result) in jobs.iter().zip(&results) {
        match result {
            Ok(report) => match (&report.photo, &report.output_path) {
                (Some(photo), _) if data_url => match serde_json::to_string(&photo.payload()) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("ERROR: {}: {e}", job.input_path.display());
                        has_error = true;
                    }
                },
                (Some(photo), Some(output_path)) => {
                    eprintln!(
                        "OK: {} -> {} ({}, {} bytes)",
                        report.input_path.display(),
                        output_path.display(),
                        photo.mime_type,
                        photo.data.len()
                    );
                }
                _ => eprintln!("NONE: {}", report.input_path.display()),
            },
            Err(e) => {
                eprintln!("ERROR: {}: {e}", job.input_path.display());
                has_error = true;
            }
        }
    }

    if has_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
