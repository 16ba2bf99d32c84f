//! mdi-intake - device manual intake client
//!
//! Drives the intake wizard against a Processing Backend from the command
//! line: register a device, upload its manual, wait for extraction, then
//! inspect the extracted pages.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mdi_common::config::load_config;
use mdi_common::events::{EventBus, IntakeEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mdi_intake::config::IntakeSettings;
use mdi_intake::db::SessionStore;
use mdi_intake::models::{DeviceDraft, PdfFile, WizardStep};
use mdi_intake::services::{HttpProcessingBackend, PageEditor, ProcessingBackend, WorkflowController};

/// Command-line arguments for mdi-intake
#[derive(Parser, Debug)]
#[command(name = "mdi-intake")]
#[command(about = "Device manual intake client")]
#[command(version)]
struct Args {
    /// Processing Backend base URL (overrides MDI_BACKEND_URL)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Config file (default: ~/.config/mdi/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session state database (overrides MDI_SESSION_DB)
    #[arg(long, global = true)]
    session_db: Option<PathBuf>,

    /// Sign in as this admin before running the command
    #[arg(long, global = true, env = "MDI_ADMIN_USER")]
    admin_user: Option<String>,

    #[arg(long, global = true, env = "MDI_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the device types and brands the backend offers
    Catalog,

    /// Check the --admin-user credentials and exit
    ///
    /// The token lives only for one invocation; other commands sign in
    /// themselves when --admin-user is given.
    Login,

    /// Register a device, upload its manual and run extraction
    Intake {
        /// Device type name or id
        #[arg(long)]
        device_type: String,
        /// Brand name or id
        #[arg(long)]
        brand: String,
        /// Device label
        #[arg(long)]
        name: String,
        /// PDF manual to upload
        #[arg(long)]
        pdf: PathBuf,
    },

    /// Show the chunks and images of one extracted page
    Page {
        #[arg(long)]
        pdf_id: i64,
        #[arg(long, default_value = "1")]
        page: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_config(args.config.as_deref()).context("Failed to load config")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("mdi-intake {}", env!("CARGO_PKG_VERSION"));

    let settings = IntakeSettings::resolve(
        args.backend_url.as_deref(),
        args.session_db.as_deref(),
        &toml_config,
    );

    let backend = Arc::new(
        HttpProcessingBackend::with_timeout(&settings.backend_url, settings.request_timeout)
            .context("Failed to create backend client")?,
    );

    match (&args.admin_user, &args.admin_password) {
        (Some(user), Some(password)) => {
            backend.sign_in(user, password).await.map_err(user_error)?
        }
        (Some(_), None) => {
            anyhow::bail!("--admin-user needs --admin-password or MDI_ADMIN_PASSWORD")
        }
        _ => {}
    }

    match args.command {
        Command::Catalog => print_catalog(backend.as_ref()).await,
        Command::Login => {
            let user = args
                .admin_user
                .context("login needs --admin-user or MDI_ADMIN_USER")?;
            println!("Logged in as {}", user);
            Ok(())
        }
        Command::Intake {
            device_type,
            brand,
            name,
            pdf,
        } => {
            let draft = DeviceDraft::new(device_type, brand, name);
            run_intake(backend, &settings, draft, &pdf).await
        }
        Command::Page { pdf_id, page } => show_page(backend, pdf_id, page).await,
    }
}

async fn print_catalog(backend: &dyn ProcessingBackend) -> Result<()> {
    let catalog = backend
        .get_brands_and_device_types()
        .await
        .map_err(user_error)?;

    println!("Device types:");
    for entry in &catalog.device_types {
        println!("  {:>5}  {}", entry.id, entry.name);
    }
    println!("Brands:");
    for entry in &catalog.brands {
        println!("  {:>5}  {}", entry.id, entry.name);
    }
    Ok(())
}

async fn run_intake(
    backend: Arc<HttpProcessingBackend>,
    settings: &IntakeSettings,
    draft: DeviceDraft,
    pdf: &Path,
) -> Result<()> {
    let event_bus = EventBus::new(100);
    let printer = tokio::spawn(print_progress(event_bus.subscribe()));

    let store = SessionStore::open(&settings.session_db)
        .await
        .with_context(|| format!("Failed to open session db {}", settings.session_db.display()))?;

    let controller =
        WorkflowController::new(backend.clone(), event_bus.clone(), settings.controller_settings())
            .with_session_store(store);

    let device_id = controller
        .submit_device_info(draft)
        .await
        .map_err(user_error)?;
    println!("Device registered (id {})", device_id);

    let file = PdfFile::from_path(pdf)
        .await
        .with_context(|| format!("Failed to read {}", pdf.display()))?;
    let ticket = controller.submit_upload(file).await.map_err(user_error)?;
    println!("Uploaded {} ({} bytes)", ticket.file.name, ticket.file.size());

    let run = controller.run_extraction().await.map_err(user_error);
    drop(event_bus);
    drop(controller);
    join_printer(printer).await;
    let run = run?;

    println!("Extraction finished for PDF {}", run.pdf_id);
    show_page(backend, run.pdf_id, 1).await?;
    println!(
        "Continue editing with: mdi-intake page --pdf-id {} --page <n>",
        run.pdf_id
    );
    Ok(())
}

async fn show_page(backend: Arc<HttpProcessingBackend>, pdf_id: i64, page: u32) -> Result<()> {
    let mut editor = PageEditor::open(backend, EventBus::new(16), pdf_id)
        .await
        .map_err(user_error)?;

    if page > 1 {
        // The page count bounds navigation; without it every page clamps to 1
        if let Err(e) = editor.load_document().await {
            tracing::warn!(error = %e, "Could not determine page count");
            editor.set_num_pages(page);
        }
        editor.go_to_page(page).await.map_err(user_error)?;
    }

    println!(
        "PDF {} page {}/{}",
        editor.pdf_id(),
        editor.page(),
        editor.num_pages()
    );
    for (i, slot) in editor.chunks().iter().enumerate() {
        let id = slot
            .chunk
            .id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "new".to_string());
        println!("  [{}] chunk {}: {}", i, id, slot.chunk.value());
    }
    for image in editor.images() {
        let alt: &str = if image.alt.is_empty() { "(no alt text)" } else { &image.alt };
        println!("  image {}: {}", image.id, alt);
    }
    Ok(())
}

/// Wait for the progress printer; its failure never fails the command
async fn join_printer(printer: JoinHandle<()>) {
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "Progress printer task failed");
    }
}

/// Print wizard progress until every sender is gone
async fn print_progress(mut rx: broadcast::Receiver<IntakeEvent>) {
    loop {
        match rx.recv().await {
            Ok(IntakeEvent::StepChanged { new_step, .. }) => {
                if let Some(step) = WizardStep::from_number(new_step) {
                    println!("-> {}", step);
                }
            }
            Ok(IntakeEvent::ExtractionProgress {
                progress, status, ..
            }) => match progress {
                Some(p) => println!("   extraction {:>3}% ({:?})", p, status),
                None => println!("   extraction in progress ({:?})", status),
            },
            Ok(IntakeEvent::ActionFailed { action, message, .. }) => {
                eprintln!("   {} failed: {}", action, message);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => tracing::debug!(skipped = n, "Progress printer lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn user_error(err: mdi_intake::IntakeError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}
