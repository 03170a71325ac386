use std::fs;
use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

use panelcal::{
    CorrectionParams, EventProvider, FileOutcome, ScriptDirectory, ScriptedEvents,
    TerminalEvents, process_directory_to_path, process_path,
};

use super::args::CliArgs;
use super::errors::AppError;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_single<P: EventProvider>(
    input: &Path,
    output_dir: &Path,
    events: &mut P,
    params: &CorrectionParams,
) -> Result<(), AppError> {
    match process_path(input, output_dir, events, params)? {
        FileOutcome::Corrected(outputs) => {
            info!(
                "Successfully processed: {:?} -> {:?}",
                input, outputs.output_dir
            );
        }
        FileOutcome::Skipped => {
            info!("No polygon was drawn or it was not closed; nothing written for {:?}", input);
        }
    }
    Ok(())
}

fn run_batch<P: EventProvider>(
    input_dir: &Path,
    output_dir: &Path,
    events: &mut P,
    params: &CorrectionParams,
    continue_on_error: bool,
) -> Result<(), AppError> {
    info!("Starting batch processing from directory: {:?}", input_dir);
    info!("Output directory: {:?}", output_dir);

    let report =
        process_directory_to_path(input_dir, output_dir, events, params, continue_on_error)?;

    info!("Batch processing complete!");
    info!("Processed: {}", report.processed);
    info!("Skipped: {}", report.skipped);
    info!("Errors: {}", report.errors);
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.log);

    let params = args.params().map_err(AppError::from)?;
    let output_dir = args.output_dir.clone().ok_or(AppError::MissingArgument {
        arg: "--output-dir".to_string(),
    })?;
    fs::create_dir_all(&output_dir)?;

    if let Some(input_dir) = &args.input_dir {
        let continue_on_error = !args.fail_fast;
        match (&args.events, &args.events_dir) {
            (Some(script), _) => run_batch(
                input_dir,
                &output_dir,
                &mut ScriptedEvents::load(script).map_err(AppError::from)?,
                &params,
                continue_on_error,
            )?,
            (None, Some(dir)) => run_batch(
                input_dir,
                &output_dir,
                &mut ScriptDirectory::new(dir),
                &params,
                continue_on_error,
            )?,
            (None, None) => run_batch(
                input_dir,
                &output_dir,
                &mut TerminalEvents,
                &params,
                continue_on_error,
            )?,
        }
    } else {
        let input = args.input.clone().ok_or(AppError::MissingArgument {
            arg: "--input or --input-dir".to_string(),
        })?;
        match (&args.events, &args.events_dir) {
            (Some(script), _) => run_single(
                &input,
                &output_dir,
                &mut ScriptedEvents::load(script).map_err(AppError::from)?,
                &params,
            )?,
            (None, Some(dir)) => {
                run_single(&input, &output_dir, &mut ScriptDirectory::new(dir), &params)?
            }
            (None, None) => run_single(&input, &output_dir, &mut TerminalEvents, &params)?,
        }
    }

    Ok(())
}
