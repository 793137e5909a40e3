//! mdctl CLI entrypoint.
//!
//! This is the main entrypoint for the mdctl command-line tool.

use std::io::Write;
use std::process::ExitCode;

use managed_delivery::cli::{Cli, Commands, OutputFormatter};
use managed_delivery::error::{DeliveryError, RemoteError, Result};
use managed_delivery::export::export_application;
use managed_delivery::processor::DeliveryConfigProcessor;
use managed_delivery::spinnaker::{SpinnakerClient, pause_management, resume_management};

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    // Values from .env apply before argument parsing so `env` defaults see them
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env: {e}");
        }
    }

    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(cli, &formatter)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", formatter.error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<ExitCode> {
    let mut processor = DeliveryConfigProcessor::new(cli.processor_config());
    debug!(path = %processor.path().display(), "Using delivery config");

    match &cli.command {
        Commands::Export { app, .. } => {
            let client = cli.client_settings().client()?;
            let options = cli.command.export_options().unwrap_or_default();
            let summary = export_application(&client, &mut processor, app, &options).await?;
            println!("{}", formatter.format_export(&summary));
            Ok(exit_code(summary.is_success()))
        }
        Commands::Publish { force } => {
            cmd_publish(&mut processor, &cli.client_settings().client()?, *force, formatter).await
        }
        Commands::Diff { all } => {
            let client = cli.client_settings().client()?;
            let diffs = processor.diff(&client).await?;
            println!("{}", formatter.format_diff(&diffs, *all));
            Ok(exit_code(!diffs.iter().any(|diff| diff.has_changes())))
        }
        Commands::Validate => {
            let client = cli.client_settings().client()?;
            let detail = processor.validate(&client).await?;
            println!("{}", formatter.format_validation(detail.as_ref()));
            Ok(exit_code(detail.is_none()))
        }
        Commands::Delete { yes } => {
            cmd_delete(&mut processor, &cli.client_settings().client()?, *yes, formatter).await
        }
        Commands::Fmt { check } => cmd_fmt(&mut processor, *check, formatter),
        Commands::Plan => {
            let client = cli.client_settings().client()?;
            let plan = processor.plan(&client).await?;
            println!("{}", formatter.format_plan(&plan));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Pause { app } => {
            pause_management(&cli.client_settings().client()?, app).await?;
            println!("{}", formatter.success(&format!("Paused management of {app}")));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Resume { app } => {
            resume_management(&cli.client_settings().client()?, app).await?;
            println!("{}", formatter.success(&format!("Resumed management of {app}")));
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Publish the delivery config.
async fn cmd_publish(
    processor: &mut DeliveryConfigProcessor,
    client: &SpinnakerClient,
    force: bool,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    match processor.publish(client, force).await {
        Ok(()) => {
            println!("{}", formatter.success("Delivery config published"));
            Ok(ExitCode::SUCCESS)
        }
        Err(DeliveryError::Remote(RemoteError::PublishFailed(publish_error))) => {
            eprintln!(
                "{}",
                formatter.error(&format!("Publish rejected: {}", publish_error.message()))
            );
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e),
    }
}

/// Delete the published delivery config.
async fn cmd_delete(
    processor: &mut DeliveryConfigProcessor,
    client: &SpinnakerClient,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    processor.load()?;
    let name = processor.delivery_config().name.clone();

    // Confirm
    if !auto_approve {
        eprint!("Delete delivery config {name:?} from Spinnaker? Type the name to confirm: ");
        std::io::stderr()
            .flush()
            .map_err(|e| DeliveryError::io("flush", "stderr", e))?;

        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .map_err(|e| DeliveryError::io("read", "stdin", e))?;

        if input.trim() != name {
            eprintln!("Deletion cancelled.");
            return Ok(ExitCode::FAILURE);
        }
    }

    processor.delete(client).await?;
    println!("{}", formatter.success(&format!("Deleted delivery config {name}")));
    Ok(ExitCode::SUCCESS)
}

/// Rewrite the delivery config in canonical form.
fn cmd_fmt(
    processor: &mut DeliveryConfigProcessor,
    check: bool,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    processor.load()?;
    let original = processor.content().to_vec();
    let rendered = processor.render()?;

    if rendered == original {
        info!("Delivery config already formatted");
        return Ok(ExitCode::SUCCESS);
    }
    if check {
        eprintln!(
            "{}",
            formatter.warning(&format!("{} is not formatted", processor.path().display()))
        );
        return Ok(ExitCode::FAILURE);
    }

    processor.save()?;
    println!(
        "{}",
        formatter.success(&format!("Formatted {}", processor.path().display()))
    );
    Ok(ExitCode::SUCCESS)
}

/// Maps a success flag to an exit code.
fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
