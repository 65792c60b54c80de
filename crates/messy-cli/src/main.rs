//! messy-notes: command-line front end for the Messy Notes service.
//!
//! Configuration comes from the environment (or a `.env` file):
//! `MESSY_NOTES_API_URL`, `MESSY_NOTES_TOKEN`, `MESSY_NOTES_MEDIA_DIR`,
//! `MESSY_TAG_ALIASES`, plus the logging variables in [`logging`].

mod capture;
mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use messy_client::HttpNotesClient;
use messy_core::defaults::ALL_FILTER;
use messy_core::{
    CaptureSession, MediaLibrary, Note, NoteDraft, NoteId, NoteImage, NoteKey, NotePatch,
    NoteStatus, TagAliases, TempId,
};
use messy_store::{Conversation, NoteService, Resolution};

use crate::capture::FileSource;

type Service = NoteService<HttpNotesClient>;

#[derive(Parser)]
#[command(name = "messy-notes")]
#[command(author, version, about = "Capture and search your messy notes")]
#[command(propagate_version = true)]
struct Cli {
    /// Print notes as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List notes, optionally filtered by tag category
    List {
        /// Tag category ("All" for everything)
        #[arg(short, long, default_value = ALL_FILTER)]
        tag: String,
    },

    /// Create one text note per argument; all are sent concurrently
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Tags applied to every note (can repeat)
        #[arg(short, long)]
        tag: Vec<String>,
    },

    /// Save a finished recording as a voice note
    Voice {
        /// Recording to import
        file: PathBuf,

        /// Title instead of "New Voice Note"
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Save a picture as an image note
    Photo {
        /// Picture to import
        file: PathBuf,

        /// Caption stored as the note content
        #[arg(short, long, default_value = "")]
        caption: String,
    },

    /// Edit a saved note
    Edit {
        /// Server note id
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        content: Option<String>,

        /// Replace the tag list (can repeat)
        #[arg(short, long)]
        tag: Vec<String>,
    },

    /// Delete a saved note
    Delete {
        /// Server note id
        id: String,
    },

    /// Ask the assistant about your notes
    Chat {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let client =
        Arc::new(HttpNotesClient::from_env().context("Failed to configure the notes client")?);
    let service = NoteService::new(client).with_aliases(TagAliases::from_env());
    let json = cli.json;

    match cli.command {
        Commands::List { tag } => cmd_list(&service, &tag, json).await,
        Commands::Add { text, tag } => cmd_add(&service, text, &tag, json).await,
        Commands::Voice { file, title } => cmd_voice(&service, &file, title, json).await,
        Commands::Photo { file, caption } => cmd_photo(&service, &file, caption, json).await,
        Commands::Edit {
            id,
            title,
            content,
            tag,
        } => {
            let patch = NotePatch {
                title,
                content,
                tags: (!tag.is_empty()).then_some(tag),
                ..Default::default()
            };
            cmd_edit(&service, NoteId::new(id), patch, json).await
        }
        Commands::Delete { id } => cmd_delete(&service, NoteId::new(id)).await,
        Commands::Chat { message } => cmd_chat(&service, &message.join(" ")).await,
    }
}

async fn cmd_list(service: &Service, filter: &str, json: bool) -> anyhow::Result<()> {
    service.refresh().await.context("Failed to load notes")?;
    let notes = service.list_filtered(filter);
    if json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
    } else if notes.is_empty() {
        println!("No notes under \"{}\"", filter);
    } else {
        for note in &notes {
            print_note(note);
        }
    }
    Ok(())
}

async fn cmd_add(
    service: &Service,
    texts: Vec<String>,
    tags: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let mut pending = Vec::with_capacity(texts.len());
    for text in texts {
        let draft = NoteDraft::text(text).with_tags(tags.iter().cloned());
        pending.push(service.spawn_create(draft)?);
    }

    let total = pending.len();
    let (temp_ids, handles): (Vec<_>, Vec<_>) = pending.into_iter().unzip();
    let resolutions = futures::future::join_all(handles).await;

    let mut failed = 0;
    for (temp_id, joined) in temp_ids.into_iter().zip(resolutions) {
        let resolution = joined.context("Create task panicked")?;
        if resolution == Resolution::Failed {
            failed += 1;
            continue;
        }
        if let Some(note) = settled_note(service, temp_id) {
            emit(&note, json)?;
        }
    }

    if failed > 0 {
        bail!("{} of {} notes could not be saved", failed, total);
    }
    Ok(())
}

async fn cmd_voice(
    service: &Service,
    file: &Path,
    title: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let library = MediaLibrary::from_env();
    let mut microphone = FileSource::microphone(file);
    let recording = CaptureSession::open(&mut microphone)?.finish()?;
    let saved = library.save_recording(&recording).await?;

    let mut draft = NoteDraft::voice(MediaLibrary::uri_for(&saved));
    if let Some(title) = title {
        draft = draft.with_title(title);
    }
    save_media_note(service, &library, &saved, draft, json).await
}

async fn cmd_photo(
    service: &Service,
    file: &Path,
    caption: String,
    json: bool,
) -> anyhow::Result<()> {
    let library = MediaLibrary::from_env();
    let mut camera = FileSource::camera(file);
    let picture = CaptureSession::open(&mut camera)?.finish()?;
    let saved = library.save_photo(&picture).await?;

    let image = NoteImage::new(MediaLibrary::uri_for(&saved));
    let draft = NoteDraft::image(vec![image], caption);
    save_media_note(service, &library, &saved, draft, json).await
}

/// Create a note for a stored capture; the capture is removed if the note is not saved.
async fn save_media_note(
    service: &Service,
    library: &MediaLibrary,
    saved: &Path,
    draft: NoteDraft,
    json: bool,
) -> anyhow::Result<()> {
    let (temp_id, resolution) = match service.create(draft).await {
        Ok(created) => created,
        Err(e) => {
            library.remove(saved).await?;
            return Err(e.into());
        }
    };

    if resolution == Resolution::Failed {
        let reason = service
            .find(&NoteKey::Temp(temp_id))
            .and_then(|note| match note.status {
                NoteStatus::Failed { error } => Some(error),
                _ => None,
            })
            .unwrap_or_default();
        if let Err(e) = library.remove(saved).await {
            warn!(path = %saved.display(), error = %e, "Failed to remove unsaved capture");
        }
        bail!("Note could not be saved: {}", reason);
    }

    info!(path = %saved.display(), "Capture saved");
    if let Some(note) = settled_note(service, temp_id) {
        emit(&note, json)?;
    }
    Ok(())
}

async fn cmd_edit(
    service: &Service,
    id: NoteId,
    patch: NotePatch,
    json: bool,
) -> anyhow::Result<()> {
    if patch.is_empty() {
        bail!("Nothing to change: pass --title, --content or --tag");
    }
    service.refresh().await.context("Failed to load notes")?;
    let note = service
        .update(&id, &patch)
        .await
        .with_context(|| format!("Failed to update note {}", id))?;
    emit(&note, json)
}

async fn cmd_delete(service: &Service, id: NoteId) -> anyhow::Result<()> {
    service.refresh().await.context("Failed to load notes")?;
    service
        .delete(&id)
        .await
        .with_context(|| format!("Failed to delete note {}", id))?;
    println!("Deleted {}", id);
    Ok(())
}

async fn cmd_chat(service: &Service, message: &str) -> anyhow::Result<()> {
    let mut conversation = Conversation::new();
    let reply = conversation.send(service.api(), message).await;

    println!("{}", reply.text);
    for id in &reply.relevant_notes {
        println!("  see: {}", id);
    }
    Ok(())
}

/// The stored note created under `temp_id`, wherever it settled.
fn settled_note(service: &Service, temp_id: TempId) -> Option<Note> {
    service
        .snapshot()
        .into_iter()
        .find(|note| note.temp_id == Some(temp_id))
}

fn emit(note: &Note, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(note)?);
    } else {
        print_note(note);
    }
    Ok(())
}

fn print_note(note: &Note) {
    let key = note
        .key()
        .map(|k| k.to_string())
        .unwrap_or_else(|| "-".to_string());
    let state = match note.status {
        NoteStatus::Processing => " (processing)",
        NoteStatus::Failed { .. } => " (failed)",
        NoteStatus::Ready => "",
    };
    let tags = if note.tags.is_empty() {
        String::new()
    } else {
        format!("  #{}", note.tags.join(" #"))
    };
    println!(
        "{}  [{}] {}{}{}",
        key,
        note.kind.name(),
        note.title,
        state,
        tags
    );
    if !note.content.is_empty() {
        println!("    {}", note.content);
    }
}
