use anyhow::Context;
use folio::cli::{Cli, Commands, ConfigAction, FolderAction, NoteAction};
use folio::completion::build_transcriber;
use folio::config::Config;
use folio::error::{FolioError, Result};
use folio::ingest::{transcription_prompt, IngestReport, TranscriptLanguage, TranscriptResult};
use folio::service::NoteService;
use folio::storage::NewNote;
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    match cli.command {
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action).context("Config command failed")
        }
        command => {
            let config =
                load_config(cli.config, cli.profile).context("Failed to load configuration")?;
            let service = open_service(&config).with_context(|| {
                format!(
                    "Failed to open note store at {}",
                    config.storage.database_path.display()
                )
            })?;
            Ok(run(&service, &config, command)?)
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "folio=debug" } else { "folio=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn open_service(config: &Config) -> Result<NoteService> {
    let db_path = expand_path(&config.storage.database_path)?;
    tracing::debug!("Opening database at {}", db_path.display());
    NoteService::from_config(config, &db_path)
}

fn run(service: &NoteService, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Folder { action } => cmd_folder(service, action),
        Commands::Note { action } => cmd_note(service, action),
        Commands::Ingest {
            note_id,
            file,
            audio,
            language,
            prompt,
            background,
        } => cmd_ingest(
            service,
            config,
            note_id,
            file,
            audio,
            &language,
            prompt.as_deref(),
            background,
        ),
        Commands::Ask {
            folder_id,
            question,
            sources,
        } => cmd_ask(service, folder_id, &question, sources),
        Commands::Search {
            folder_id,
            query,
            k,
            json,
        } => cmd_search(service, folder_id, &query, k, json),
        Commands::Chunks { note_id } => cmd_chunks(service, note_id),
        Commands::Stats => cmd_stats(service),
        // Handled before the service is opened
        Commands::Config { .. } => Ok(()),
    }
}

fn cmd_folder(service: &NoteService, action: FolderAction) -> Result<()> {
    match action {
        FolderAction::Create { name, user_id } => {
            let folder = service.notes().create_folder(&name, user_id)?;
            println!("✓ Created folder {} ({})", folder.id, folder.name);
        }
        FolderAction::List => {
            let folders = service.notes().list_folders()?;
            if folders.is_empty() {
                println!("No folders yet");
            }
            for folder in folders {
                println!(
                    "{:>4}  {}  (created {})",
                    folder.id,
                    folder.name,
                    folder.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }
    Ok(())
}

fn cmd_note(service: &NoteService, action: NoteAction) -> Result<()> {
    match action {
        NoteAction::Create { title, folder } => {
            let note = service.notes().create_note(NewNote {
                title,
                folder_id: folder,
            })?;
            println!("✓ Created note {} ({})", note.id, note.title);
        }
        NoteAction::Show { note_id } => {
            let note = service.notes().require_note(note_id)?;
            println!("Note {}: {}", note.id, note.title);
            println!("  Folder: {}", folder_label(note.folder_id));
            println!("  Status: {}", note.processing_status);
            println!("  Updated: {}", note.updated_at.format("%Y-%m-%d %H:%M:%S"));
            if let Some(summary) = &note.summary {
                println!("\nSummary:\n{}", summary);
            }
            match &note.transcript {
                Some(transcript) => println!("\nTranscript:\n{}", transcript),
                None => println!("\nNo transcript yet"),
            }
        }
        NoteAction::List { folder } => {
            let notes = service.notes().list_notes(folder)?;
            if notes.is_empty() {
                println!("No notes in {}", folder_label(folder));
            }
            for note in notes {
                println!(
                    "{:>4}  {:<10}  {}",
                    note.id,
                    note.processing_status.to_string(),
                    note.title
                );
            }
        }
        NoteAction::Move { note_id, folder } => {
            let note = service.move_note(note_id, folder)?;
            println!("✓ Moved note {} to {}", note.id, folder_label(note.folder_id));
        }
        NoteAction::Delete { note_id } => {
            let chunks = service.delete_note(note_id)?;
            println!("✓ Deleted note {} ({} chunks)", note_id, chunks);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_ingest(
    service: &NoteService,
    config: &Config,
    note_id: i64,
    file: Option<PathBuf>,
    audio: Option<PathBuf>,
    language: &str,
    prompt: Option<&str>,
    background: bool,
) -> Result<()> {
    // Store the new transcript first so both paths ingest from the note
    if let Some(path) = file {
        let transcript = std::fs::read_to_string(&path).map_err(|e| FolioError::Io {
            source: e,
            context: format!("Failed to read transcript: {}", path.display()),
        })?;
        service.notes().require_note(note_id)?;
        service
            .notes()
            .update_transcript(note_id, &transcript, None)?;
    } else if let Some(path) = audio {
        let language: TranscriptLanguage = language.parse()?;
        service.notes().require_note(note_id)?;

        println!("Transcribing {}...", path.display());
        let transcriber = build_transcriber(&config.transcription)?;
        let reply = transcriber
            .transcribe_audio(&path, &transcription_prompt(prompt, language))
            .map_err(|source| FolioError::Completion {
                context: format!("transcription of {}", path.display()),
                source,
            })?;

        let parsed = TranscriptResult::parse(&reply);
        if !parsed.separated {
            tracing::info!("Separator not found in transcription of note {}", note_id);
        }
        service
            .notes()
            .update_transcript(note_id, &parsed.transcript, Some(&parsed.summary))?;
    }

    if background {
        let job = service.prepare_job(note_id)?;
        let runtime = tokio::runtime::Runtime::new().map_err(|e| FolioError::Io {
            source: e,
            context: "Failed to create tokio runtime".to_string(),
        })?;

        let stats = runtime.block_on(async {
            let queue = service.start_queue();
            queue.submit(job).await?;
            println!("✓ Queued note {} for ingestion", note_id);
            Ok::<_, FolioError>(queue.shutdown().await)
        })?;

        let note = service.notes().require_note(note_id)?;
        println!(
            "  Status: {} ({} succeeded, {} failed)",
            note.processing_status, stats.succeeded, stats.failed
        );
        return Ok(());
    }

    let report = service.ingest_note(note_id)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &IngestReport) {
    println!(
        "✓ Ingested note {} into {}",
        report.note_id,
        folder_label(Some(report.folder_id).filter(|id| *id != 0))
    );
    println!("  Chunks stored: {}", report.stored);
    println!("  Chunks replaced: {}", report.deleted);
    if report.skipped_blank > 0 {
        println!("  Blank chunks skipped: {}", report.skipped_blank);
    }
    println!("  Took: {:.2?}", report.elapsed);
}

fn cmd_ask(service: &NoteService, folder_id: i64, question: &str, sources: bool) -> Result<()> {
    let grounded = service.ask_with_sources(folder_id, question)?;
    println!("{}", grounded.answer);

    if sources {
        println!("\nSources ({}):", grounded.sources.len());
        for (i, source) in grounded.sources.iter().enumerate() {
            println!("  [{}] {}", i + 1, preview(source, 160));
        }
    }
    Ok(())
}

fn cmd_search(service: &NoteService, folder_id: i64, query: &str, k: usize, json: bool) -> Result<()> {
    let matches = service.search(folder_id, query, k)?;

    if json {
        let rows: Vec<serde_json::Value> = matches
            .iter()
            .map(|m| {
                serde_json::json!({
                    "id": m.id,
                    "note_id": m.note_id,
                    "distance": m.distance,
                    "text": m.text,
                })
            })
            .collect();
        let out = serde_json::to_string_pretty(&rows).map_err(|e| FolioError::Json {
            source: e,
            context: "Failed to serialize search results".to_string(),
        })?;
        println!("{}", out);
        return Ok(());
    }

    if matches.is_empty() {
        println!("No chunks in {}", folder_label(Some(folder_id).filter(|id| *id != 0)));
    }
    for m in matches {
        println!(
            "{:.4}  note {:>4}  {}",
            m.distance,
            m.note_id,
            preview(&m.text, 100)
        );
    }
    Ok(())
}

fn cmd_chunks(service: &NoteService, note_id: i64) -> Result<()> {
    service.notes().require_note(note_id)?;
    let chunks = service.chunks().list_by_note(note_id)?;

    println!("Note {}: {} chunks", note_id, chunks.len());
    for chunk in chunks {
        println!(
            "  #{} folder {} {} dims ({}): {}",
            chunk.id,
            chunk.folder_id,
            chunk.embedding.len(),
            chunk.model,
            preview(&chunk.text, 80)
        );
    }
    Ok(())
}

fn cmd_stats(service: &NoteService) -> Result<()> {
    let stats = service.storage().stats()?;

    println!("Folio Statistics");
    println!("================");
    println!("Folders: {}", stats.folder_count);
    println!("Notes: {}", stats.note_count);
    println!("Embedded notes: {}", stats.embedded_note_count);
    println!("Chunks: {}", stats.chunk_count);
    println!(
        "Embedding model: {} ({} dims)",
        service.embedder().model_name(),
        service.embedder().dimension()
    );
    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| FolioError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
        ConfigAction::Path => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'folio config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| FolioError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| FolioError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

fn folder_label(folder_id: Option<i64>) -> String {
    match folder_id {
        Some(id) => format!("folder {}", id),
        None => "unfiled".to_string(),
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}
