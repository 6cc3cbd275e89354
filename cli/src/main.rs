//! CLI entrypoint for bitrelay
//!
//! This is the main binary that wires together all layers using
//! dependency injection: an in-process bus, a simulated collection built
//! from the configured contributor list, the conversation mediator and the
//! operation client.

mod commands;
mod output;

use anyhow::{Context, Result, anyhow, bail};
use bitrelay_application::{
    BlockingEventSink, ClientSettings, CompositeEventSink, Conversation, ConversationMediator,
    DeleteFileInput, EventSink, OperationClient, QueryScope,
};
use bitrelay_domain::{ChecksumData, ChecksumSpec, ContributorId, OperationEvent};
use bitrelay_infrastructure::{
    ConfigLoader, InMemoryFileExchange, InMemoryMessageBus, JsonlEventRecorder,
    RecordingEventSink, Sha2ChecksumProvider, SimulatedCollection, TracingEventSink,
};
use clap::Parser;
use commands::{Cli, Command};
use output::{ConsoleEventPrinter, OutputFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Extra time granted on top of the conversation timeout before giving up
/// on the terminal event.
const FINISH_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Kept alive until exit so buffered log lines are flushed
    let _log_guard = init_tracing(cli.verbose, cli.log_file.as_deref())?;

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(());
    }

    let Some(command) = cli.command else {
        bail!("A command is required. Run `bitrelay --help` for usage.");
    };

    // === Configuration ===
    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };
    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("config error: {}", problem);
        }
        bail!("Invalid configuration ({} problem(s))", problems.len());
    }
    let settings = config.client_settings();
    let conversation_config = config.conversation_config();

    info!(
        "Starting bitrelay client '{}' for collection '{}'",
        settings.client_id, settings.collection_id
    );

    // === Dependency Injection ===
    let bus = InMemoryMessageBus::new();
    let collection = SimulatedCollection::spawn(&bus, &settings);
    for path in &cli.seed {
        let content = read_file(path)?;
        let file_id = file_name(path)?;
        debug!("Seeding '{}' ({} bytes)", file_id, content.len());
        collection.store_everywhere(&file_id, &content);
    }

    let mediator = ConversationMediator::new(
        bus.clone(),
        settings.receiver_destination.clone(),
        conversation_config.mediator_cleanup_interval,
    );
    let wait_limit = conversation_config.conversation_timeout
        + conversation_config.mediator_cleanup_interval
        + FINISH_GRACE;
    let client = OperationClient::new(
        settings.clone(),
        conversation_config,
        mediator.clone(),
        bus.clone(),
        Arc::new(Sha2ChecksumProvider),
    );

    // === Event sinks ===
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let mut sink: Arc<dyn EventSink> = Arc::new(CompositeEventSink::new(vec![
        Arc::new(TracingEventSink),
        Arc::new(ConsoleEventPrinter::new(format)),
    ]));
    if let Some(path) = &config.events.log_file {
        match JsonlEventRecorder::new(path) {
            Some(recorder) => {
                info!("Recording events to {}", recorder.path().display());
                sink = Arc::new(RecordingEventSink::new(Arc::new(recorder), sink));
            }
            None => warn!("Event recording disabled"),
        }
    }
    let events = Arc::new(BlockingEventSink::forwarding_to(sink));

    // === Run ===
    let download = match &command {
        Command::Get {
            file_id, output, ..
        } => Some((download_address(&settings, file_id), output.clone())),
        _ => None,
    };
    let conversation = start(&client, collection.exchange(), command, events.clone())?;
    debug!("Started conversation {}", conversation.correlation_id());

    let finished = events.wait_for_finish(wait_limit).await;
    mediator.shutdown();

    let Some(terminal) = finished else {
        bail!("Operation did not finish within {:?}", wait_limit);
    };
    if terminal.is_failure() {
        bail!("{}", failure_message(&terminal));
    }

    if let Some((address, output)) = download {
        let content = collection
            .exchange()
            .download(&address)
            .with_context(|| format!("No content delivered to {}", address))?;
        match output {
            Some(path) => {
                std::fs::write(&path, &content)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                if !cli.json {
                    println!("Wrote {} bytes to {}", content.len(), path.display());
                }
            }
            None if !cli.json => println!("Fetched {} bytes", content.len()),
            None => {}
        }
    }

    Ok(())
}

/// Starts the conversation for `command`.
fn start(
    client: &OperationClient,
    exchange: &Arc<InMemoryFileExchange>,
    command: Command,
    events: Arc<BlockingEventSink>,
) -> Result<Arc<Conversation>> {
    let conversation = match command {
        Command::Put {
            path,
            file_id,
            algorithm,
        } => {
            let content = read_file(&path)?;
            let file_id = match file_id {
                Some(id) => id,
                None => file_name(&path)?,
            };
            let address = upload_address(client.settings(), &file_id);
            exchange.upload(&address, content.clone());
            client.put_file_from_bytes(file_id, address, &content, algorithm.into(), events)?
        }
        Command::Get {
            file_id,
            contributor,
            ..
        } => {
            let address = download_address(client.settings(), &file_id);
            client.get_file(file_id, address, contributor.map(ContributorId::new), events)?
        }
        Command::Delete {
            file_id,
            contributor,
        } => {
            let mut input = DeleteFileInput::new(file_id);
            if let Some(target) = contributor {
                input = input.at(ContributorId::new(target));
            }
            client.delete_file(input, events)?
        }
        Command::Replace {
            path,
            file_id,
            existing_checksum,
            algorithm,
            contributor,
        } => {
            let content = read_file(&path)?;
            let address = upload_address(client.settings(), &file_id);
            exchange.upload(&address, content.clone());
            client.replace_file_from_bytes(
                file_id,
                contributor.map(ContributorId::new),
                ChecksumData::new(algorithm.into(), existing_checksum),
                address,
                &content,
                events,
            )?
        }
        Command::List {
            file_id,
            contributor,
        } => client.get_file_ids(scope(file_id, contributor), events)?,
        Command::Checksums {
            file_id,
            algorithm,
            contributor,
        } => client.get_checksums(
            ChecksumSpec::new(algorithm.into()),
            scope(file_id, contributor),
            events,
        )?,
        Command::Audit {
            min_sequence,
            file_id,
            contributor,
        } => client.get_audit_trails(min_sequence, scope(file_id, contributor), events)?,
    };
    Ok(conversation)
}

// ==================== Helpers ====================

fn init_tracing(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Initialize logging based on verbosity level
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };

    // Diagnostics go to stderr so `--json` output stays parseable
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("Invalid log file path: {}", path.display()))?;
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(&dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(console)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("Cannot derive a file id from {}", path.display()))
}

fn upload_address(settings: &ClientSettings, file_id: &str) -> String {
    InMemoryFileExchange::address_for(&format!("{}/upload/{}", settings.client_id, file_id))
}

fn download_address(settings: &ClientSettings, file_id: &str) -> String {
    InMemoryFileExchange::address_for(&format!("{}/download/{}", settings.client_id, file_id))
}

fn scope(file_id: Option<String>, contributors: Vec<String>) -> QueryScope {
    let mut scope = QueryScope::all();
    if let Some(file_id) = file_id {
        scope = scope.for_file(file_id);
    }
    if !contributors.is_empty() {
        scope = scope.at(contributors.into_iter().map(ContributorId::new).collect());
    }
    scope
}

fn failure_message(event: &OperationEvent) -> String {
    let mut message = format!("{} {}", event.operation, event.kind);
    if !event.info.is_empty() {
        message.push_str(&format!(": {}", event.info));
    }
    message
}
