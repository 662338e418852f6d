//! FormVault CLI: sign form state and reconcile upload payloads against the
//! configured file store.
//!
//! Reads FORMVAULT_SECRET, FORMVAULT_STORAGE_PATH and the other FORMVAULT_*
//! settings from the environment (or a .env file).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use formvault_core::models::{ConflictMode, DeletionRequest, FileId, ResourcePointer};
use formvault_core::{AppError, Config};
use formvault_processing::upload::{redisplay_entries, submitted_files_value};
use formvault_processing::{
    Conversion, CountValidator, FieldOptions, FileSizeValidator, MimeTypeValidator, TargetShape,
    ValidatorSet,
};
use formvault_cli::{init_tracing, is_production_env, log_error, ErrorResponse, Runtime};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "formvault", about = "Reconcile form file uploads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a resource pointer (`file:<id>` or a reference id)
    SignPointer {
        pointer: String,
    },
    /// Verify a signed resource pointer
    VerifyPointer {
        token: String,
    },
    /// Sign a deletion request for the file at `index` of `property`
    DeleteToken {
        #[arg(long)]
        property: String,
        #[arg(long)]
        index: usize,
        #[arg(long)]
        file_id: u64,
    },
    /// Convert a field payload (JSON) into file resources
    Reconcile {
        /// Path to the JSON payload of one form field
        payload: PathBuf,
        /// Treat the field as a collection instead of a single file
        #[arg(long)]
        collection: bool,
        /// Per-session seed for the upload sub-folder
        #[arg(long)]
        seed: Option<String>,
        /// Parent upload folder, overrides FORMVAULT_UPLOAD_FOLDER
        #[arg(long)]
        folder: Option<String>,
        /// cancel, replace or rename
        #[arg(long)]
        conflict: Option<ConflictMode>,
        /// Honor signed deletion requests
        #[arg(long)]
        allow_removal: bool,
        /// Property path deletion requests must target
        #[arg(long, default_value = "file")]
        property: String,
        /// Size bounds such as 1K or 10M
        #[arg(long)]
        min_size: Option<String>,
        #[arg(long)]
        max_size: Option<String>,
        /// Allowed media types, repeatable
        #[arg(long = "media-type")]
        media_types: Vec<String>,
        /// Maximum number of files in a collection
        #[arg(long)]
        max_files: Option<usize>,
        /// Delete the resulting files once converted
        #[arg(long)]
        discard: bool,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReconcileOutput {
    conversion: Conversion,
    redisplay: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    cleanup: Option<formvault_processing::CleanupReport>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn validators(
    min_size: Option<String>,
    max_size: Option<String>,
    media_types: Vec<String>,
    max_files: Option<usize>,
) -> anyhow::Result<ValidatorSet> {
    let mut set = ValidatorSet::new();
    if min_size.is_some() || max_size.is_some() {
        set = set.with_element(FileSizeValidator::new(
            min_size.as_deref().unwrap_or("0B"),
            max_size.as_deref().unwrap_or("1024G"),
        )?);
    }
    if !media_types.is_empty() {
        set = set.with_element(MimeTypeValidator::new(media_types));
    }
    if let Some(max_files) = max_files {
        set = set.with_collection(CountValidator::new(0, max_files)?);
    }
    Ok(set)
}

/// Print a failed command: `AppError`s as a JSON error body on stdout,
/// anything else as plain text on stderr.
fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<AppError>() {
        Some(app_error) => {
            log_error(app_error);
            let body = ErrorResponse::from_app_error(app_error, is_production_env());
            if let Err(e) = print_json(&body) {
                eprintln!("Error: {:#}", e);
            }
        }
        None => eprintln!("Error: {:#}", err),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let runtime = Runtime::from_config(&config).await?;

    match cli.command {
        Commands::SignPointer { pointer } => {
            let pointer: ResourcePointer = pointer.parse().map_err(AppError::from)?;
            let token = runtime.integrity.sign_pointer(pointer);
            print_json(&serde_json::json!({ "resourcePointer": token }))?;
        }
        Commands::VerifyPointer { token } => {
            let pointer = runtime
                .integrity
                .verify_pointer(&token)
                .map_err(AppError::from)?;
            print_json(&serde_json::json!({ "pointer": pointer.to_string() }))?;
        }
        Commands::DeleteToken {
            property,
            index,
            file_id,
        } => {
            let token = runtime.integrity.sign_deletion(&DeletionRequest {
                property,
                file_index: index,
                file_uid: FileId(file_id),
            })?;
            print_json(&serde_json::json!({ "deleteFile": token }))?;
        }
        Commands::Reconcile {
            payload,
            collection,
            seed,
            folder,
            conflict,
            allow_removal,
            property,
            min_size,
            max_size,
            media_types,
            max_files,
            discard,
        } => {
            let raw = std::fs::read_to_string(&payload)
                .with_context(|| format!("Failed to read {}", payload.display()))?;
            let raw: serde_json::Value =
                serde_json::from_str(&raw).context("Payload is not valid JSON")?;

            let mut options = FieldOptions::from_config(&config)
                .with_property(property.clone())
                .with_validators(validators(min_size, max_size, media_types, max_files)?);
            if let Some(seed) = seed {
                options = options.with_seed(seed);
            }
            if let Some(folder) = folder {
                options = options.with_upload_folder(folder);
            }
            if let Some(conflict) = conflict {
                options = options.with_conflict_mode(conflict);
            }
            if allow_removal {
                options = options.with_allow_removal(true);
            }

            let shape = if collection {
                TargetShape::Collection
            } else {
                TargetShape::Single
            };
            let conversion = runtime.engine.convert(&raw, shape, &options).await?;

            let cleanup = if discard {
                Some(runtime.cleanup.delete_uploads(&conversion).await)
            } else {
                None
            };
            let redisplay = if cleanup.is_some() {
                serde_json::Value::Null
            } else {
                let entries = redisplay_entries(&runtime.integrity, &property, &conversion)?;
                submitted_files_value(&entries)
            };

            print_json(&ReconcileOutput {
                conversion,
                redisplay,
                cleanup,
            })?;
        }
    }

    Ok(())
}
