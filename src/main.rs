//! gdoc-export: export a Google Docs document as DOCX and PDF in parallel.
//!
//! The first run asks for a one-time authorization code; later runs reuse the
//! stored credential. Pass a document id or URL, or `--tui` to pick from a list.

use anyhow::Context;
use bridge_desktop::ReqwestHttpClient;
use bridge_traits::http::HttpClient;
use bridge_traits::storage::DocumentService;
use bridge_traits::time::{LogLevel, SystemClock};
use clap::{CommandFactory, Parser};
use core_auth::{
    is_configuration_error, AuthCoordinator, ClientSecret, ConsolePrompt, OAuthFlowManager,
    TokenStore,
};
use core_export::{
    parse_document_id, ConsolePicker, DocumentDirectory, ExportJob, ExportPipeline, ExportTarget,
    JobOutcome, RunSummary, SelectionFrontend, SelectionOutcome,
};
use core_runtime::config::{
    AppConfig, DEFAULT_CLIENT_SECRET_PATH, DEFAULT_OUTPUT_DIR, DEFAULT_TOKEN_PATH,
};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use provider_google_drive::GoogleDriveConnector;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Exit code for a missing or unusable document argument
const USAGE_EXIT_CODE: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "gdoc-export",
    version,
    about = "Export a Google Docs document as DOCX and PDF"
)]
struct Cli {
    /// Document id, or a URL such as https://docs.google.com/document/d/<id>/edit
    document: Option<String>,

    /// Choose the document from an interactive list
    #[arg(long)]
    tui: bool,

    /// Directory receiving the exported files
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// OAuth client file downloaded from the Google Cloud console
    #[arg(long, default_value = DEFAULT_CLIENT_SECRET_PATH)]
    credentials: PathBuf,

    /// Where the authorized credential is stored
    #[arg(long, default_value = DEFAULT_TOKEN_PATH)]
    token: PathBuf,

    #[arg(long, default_value = "info")]
    log_level: LogLevel,

    /// pretty, json or compact
    #[arg(long, default_value = "compact")]
    log_format: LogFormat,
}

enum Mode {
    Interactive,
    Direct(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Fatal error");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mode = match (cli.tui, cli.document.as_deref()) {
        (true, document) => {
            if document.is_some() {
                eprintln!("Ignoring the document argument in interactive mode");
            }
            Mode::Interactive
        }
        (false, Some(input)) => match parse_document_id(input) {
            Ok(id) => Mode::Direct(id),
            Err(e) => return Ok(usage(&e.to_string())),
        },
        (false, None) => return Ok(usage("a document id or URL is required without --tui")),
    };

    let config = AppConfig::builder()
        .client_secret_path(cli.credentials)
        .token_path(cli.token)
        .output_dir(cli.output_dir)
        .logging(
            LoggingConfig::default()
                .with_level(cli.log_level)
                .with_format(cli.log_format),
        )
        .build()
        .context("Invalid configuration")?;

    init_logging(config.logging.clone()).context("Failed to initialize logging")?;

    // Read before anything touches the network
    let client_secret = ClientSecret::from_file(&config.client_secret_path)
        .await
        .map_err(|e| {
            let hint = if is_configuration_error(&e) {
                "Create an OAuth client of type \"Desktop app\" and save it as the credentials file"
            } else {
                "Could not read the OAuth client"
            };
            anyhow::Error::new(e).context(hint)
        })?;

    let http_client: Arc<dyn HttpClient> =
        Arc::new(ReqwestHttpClient::new().context("Failed to create HTTP client")?);
    let oauth = Arc::new(OAuthFlowManager::new(
        client_secret.to_oauth_config(),
        http_client.clone(),
        Arc::new(SystemClock),
    ));

    let mut coordinator = AuthCoordinator::new(
        TokenStore::new(config.token_path.clone()),
        oauth,
        http_client,
    );
    let mut prompt = ConsolePrompt::stdio();
    let transport = coordinator
        .authorize(&mut prompt)
        .await
        .context("Authorization failed")?;

    let service: Arc<dyn DocumentService> =
        Arc::new(GoogleDriveConnector::new(Arc::new(transport)));
    let directory = DocumentDirectory::new(service.clone());
    let pipeline = ExportPipeline::new(service, config.output_dir.clone());
    let targets: Vec<ExportTarget> = config
        .export_mime_types
        .iter()
        .map(|mime_type| ExportTarget::from_mime(mime_type.as_str()))
        .collect();

    match mode {
        Mode::Direct(id) => {
            let document = directory
                .get(&id)
                .await
                .with_context(|| format!("Could not look up document {}", id))?;
            info!(id = %document.id, name = %document.display_name, "Exporting document");

            let jobs = pipeline.run(&document.id, &targets).await;
            report(&document.display_name, &jobs);
        }
        Mode::Interactive => {
            let documents = directory
                .list_native()
                .await
                .context("Could not list documents")?;
            if documents.is_empty() {
                warn!("No documents available");
            }

            let frontend = SelectionFrontend::new(documents, pipeline, targets);
            let mut picker = ConsolePicker::stdio();
            match frontend.run(&mut picker).await? {
                SelectionOutcome::Exported { document, jobs } => {
                    report(&document.display_name, &jobs)
                }
                SelectionOutcome::Quit => info!("Nothing exported"),
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn usage(reason: &str) -> ExitCode {
    eprintln!("error: {}\n\n{}", reason, Cli::command().render_usage());
    ExitCode::from(USAGE_EXIT_CODE)
}

/// Partial failures are reported but do not change the exit code
fn report(display_name: &str, jobs: &[ExportJob]) {
    for job in jobs {
        match &job.outcome {
            JobOutcome::Failed(_) => eprintln!("{}", job),
            _ => println!("{}", job),
        }
    }

    let summary = RunSummary::of(jobs);
    println!(
        "{}: {} exported, {} failed",
        display_name, summary.succeeded, summary.failed
    );
}
