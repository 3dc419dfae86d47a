//! opensrp - drive the artifact sync core against a YAML seed catalog
//!
//! Every command prints the HTTP status the service would answer with, then
//! the body, and exits non-zero on a 4xx/5xx status.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use opensrp_core::api::{ApiResponse, ClientFormApi, FormSearchParams, JsonCodec, ManifestApi};
use opensrp_core::catalog::{ArtifactMetadataRecord, ArtifactStore, InMemoryCatalog};
use opensrp_core::config::ServiceConfig;
use opensrp_core::{ApiError, ContentKind, UploadContentValidator};

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "opensrp",
    about = "Resolve, expand and validate OpenSRP sync artifacts",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Log level
    #[clap(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[clap(long, global = true)]
    log_json: bool,

    /// Service configuration file (YAML)
    #[clap(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the form version a client should receive
    Resolve {
        /// Seed catalog (YAML)
        #[clap(long)]
        catalog: PathBuf,

        #[clap(long)]
        identifier: String,

        /// Version the client asks for
        #[clap(long)]
        version: String,

        /// Only return the requested version or report no change
        #[clap(long)]
        strict: bool,

        /// Version the client already holds
        #[clap(long)]
        current: Option<String>,

        /// Resolve validator artifacts instead of regular ones
        #[clap(long)]
        json_validator: bool,
    },

    /// List the newest artifacts of a release
    ReleaseFiles {
        #[clap(long)]
        catalog: PathBuf,

        /// Release (manifest) identifier
        #[clap(long)]
        identifier: String,
    },

    /// Validate a file as if it were uploaded, without admitting it
    Validate {
        #[clap(long)]
        catalog: PathBuf,

        /// File to check
        file: PathBuf,

        /// Content type; guessed from the file extension when omitted
        #[clap(long)]
        content_type: Option<String>,

        /// Identifier the upload would be stored under
        #[clap(long)]
        identifier: Option<String>,

        #[clap(long)]
        json_validator: bool,
    },

    /// List artifact metadata
    Metadata {
        #[clap(long)]
        catalog: PathBuf,

        /// Filter on the draft flag
        #[clap(long)]
        is_draft: Option<String>,

        /// Render as a table instead of JSON
        #[clap(long)]
        table: bool,
    },

    /// Find the manifest for an application version
    ManifestSearch {
        #[clap(long)]
        catalog: PathBuf,

        #[clap(long)]
        app_id: String,

        #[clap(long)]
        app_version: String,

        #[clap(long)]
        strict: bool,
    },
}

fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let filter = EnvFilter::new(log_level.to_filter_directive());

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_tracing(&cli.log_level, cli.log_json);

    let config = match &cli.config {
        Some(path) => ServiceConfig::load_from_path(path)?,
        None => ServiceConfig::default(),
    };

    let response = run(cli.command, &config)?;
    emit(&response)
}

fn run(command: Command, config: &ServiceConfig) -> Result<ApiResponse> {
    let response = match command {
        Command::Resolve {
            catalog,
            identifier,
            version,
            strict,
            current,
            json_validator,
        } => {
            let api = form_api(&load_catalog(&catalog)?, config);
            api.search(&FormSearchParams {
                form_identifier: &identifier,
                form_version: &version,
                strict: Some(flag(strict)),
                current_form_version: current.as_deref(),
                is_json_validator: Some(flag(json_validator)),
            })
        }
        Command::ReleaseFiles {
            catalog,
            identifier,
        } => form_api(&load_catalog(&catalog)?, config).release_related_files(&identifier),
        Command::Validate {
            catalog,
            file,
            content_type,
            identifier,
            json_validator,
        } => validate_command(
            &load_catalog(&catalog)?,
            config,
            &file,
            content_type.as_deref(),
            identifier.as_deref(),
            json_validator,
        )?,
        Command::Metadata {
            catalog,
            is_draft,
            table,
        } => {
            let catalog = load_catalog(&catalog)?;
            if table {
                print_metadata_table(catalog.as_ref(), is_draft.as_deref())?;
                return Ok(ApiResponse::new(200, None));
            }
            form_api(&catalog, config).metadata(is_draft.as_deref())
        }
        Command::ManifestSearch {
            catalog,
            app_id,
            app_version,
            strict,
        } => ManifestApi::new(load_catalog(&catalog)?, JsonCodec::from_config(&config.json))
            .search(&app_id, &app_version, Some(flag(strict))),
    };
    Ok(response)
}

fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn load_catalog(path: &Path) -> Result<Arc<InMemoryCatalog>> {
    let catalog = InMemoryCatalog::load_from_path(path)?;
    info!("Loaded catalog from {}", path.display());
    Ok(Arc::new(catalog))
}

fn form_api(catalog: &Arc<InMemoryCatalog>, config: &ServiceConfig) -> ClientFormApi {
    ClientFormApi::new(catalog.clone(), catalog.clone(), config)
}

/// Content type a client would send for a file with this extension
fn guess_content_type(file: &Path) -> Option<&'static str> {
    match file.extension()?.to_str()? {
        "json" => Some("application/json"),
        "yml" | "yaml" => Some("application/x-yaml"),
        "properties" => Some("application/octet-stream"),
        _ => None,
    }
}

fn validate_command(
    catalog: &Arc<InMemoryCatalog>,
    config: &ServiceConfig,
    file: &Path,
    content_type: Option<&str>,
    identifier: Option<&str>,
    json_validator: bool,
) -> Result<ApiResponse> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let content_type = content_type
        .or_else(|| guess_content_type(file))
        .ok_or_else(|| anyhow!("Cannot guess the content type of {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    debug!("Validating {} as {}", file.display(), content_type);

    let Some(kind) = ContentKind::detect(content_type, &file_name, &config.upload) else {
        return Ok(ApiError::UnsupportedContentType(content_type.to_string()).into());
    };

    let identifier = identifier.unwrap_or(&file_name);
    let validator = UploadContentValidator::new(catalog.clone());
    let response = match validator.validate(&content, kind, Some(identifier), json_validator) {
        Ok(outcome) if outcome.is_empty() => {
            let body = JsonCodec::from_config(&config.json).encode(&outcome)?;
            ApiResponse::ok(body)
        }
        Ok(outcome) => ApiError::MissingReferences(outcome).into(),
        Err(err) => err.into(),
    };
    Ok(response)
}

#[derive(Tabled)]
struct MetadataRow {
    #[tabled(rename = "Id")]
    id: u64,
    #[tabled(rename = "Identifier")]
    identifier: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Validator")]
    validator: bool,
    #[tabled(rename = "Draft")]
    draft: bool,
}

impl From<ArtifactMetadataRecord> for MetadataRow {
    fn from(record: ArtifactMetadataRecord) -> Self {
        Self {
            id: record.id,
            identifier: record.identifier,
            version: record.version.to_string(),
            label: record.label,
            validator: record.is_json_validator,
            draft: record.is_draft,
        }
    }
}

fn print_metadata_table(catalog: &dyn ArtifactStore, is_draft: Option<&str>) -> Result<()> {
    let wanted = is_draft.map(|flag| flag.eq_ignore_ascii_case("true"));
    let rows: Vec<MetadataRow> = catalog
        .all_records()?
        .into_iter()
        .filter(|r| wanted.map_or(true, |draft| r.is_draft == draft))
        .map(MetadataRow::from)
        .collect();

    if rows.is_empty() {
        println!("No artifacts found.");
        return Ok(());
    }

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("Found {} artifacts\n", rows.len());
    println!("{table}");
    Ok(())
}

fn emit(response: &ApiResponse) -> Result<()> {
    if response.body.is_none() && response.status == 200 {
        return Ok(());
    }

    println!("{}", response.status);
    for (name, value) in &response.headers {
        println!("{}: {}", name, value);
    }
    if let Some(body) = &response.body {
        println!("{}", body);
    }

    if response.status >= 400 {
        return Err(anyhow!("request failed with status {}", response.status));
    }
    Ok(())
}
