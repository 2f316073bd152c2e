// beech-cli/src/history.rs

//! Saved chat transcripts, one JSON file per conversation.

use anyhow::{anyhow, Context, Result};
use beech_core::models::transcript::{Role, TranscriptMessage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::warn;
use uuid::Uuid;

const TRANSCRIPT_SUBDIR: &str = "beech/transcripts";
const PREVIEW_CHARS: usize = 70;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub messages: Vec<TranscriptMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        let now = Utc::now();
        Conversation {
            id: Uuid::new_v4(),
            created_at: now,
            last_updated_at: now,
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: TranscriptMessage) {
        self.messages.push(message);
        self.last_updated_at = Utc::now();
    }

    /// First user message, shortened for listings.
    pub fn preview(&self) -> String {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| {
                let preview: String = m.content.chars().take(PREVIEW_CHARS).collect();
                if m.content.chars().count() > PREVIEW_CHARS {
                    format!("{}...", preview)
                } else {
                    preview
                }
            })
            .unwrap_or_else(|| "[No user messages]".to_string())
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Directory of saved conversations.
pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data dir>/beech/transcripts`.
    pub fn default_location() -> Result<Self> {
        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| anyhow!("Could not determine a data directory for transcripts"))?;
        Ok(Self::new(base.join(TRANSCRIPT_SUBDIR)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<&Path> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create transcript directory at {:?}", self.dir))?;
        Ok(&self.dir)
    }

    fn file_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub fn save(&self, conversation: &Conversation) -> Result<()> {
        self.ensure_dir()?;
        let file_path = self.file_path(conversation.id);
        let file = File::create(&file_path)
            .with_context(|| format!("Failed to create transcript file at {:?}", file_path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, conversation)
            .with_context(|| format!("Failed to serialize transcript to {:?}", file_path))?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush writer for {:?}", file_path))?;
        Ok(())
    }

    pub fn load(&self, id: Uuid) -> Result<Conversation> {
        let file_path = self.file_path(id);
        if !file_path.exists() {
            return Err(anyhow!("Conversation {} not found at {:?}", id, file_path));
        }
        let file = File::open(&file_path)
            .with_context(|| format!("Failed to open transcript file at {:?}", file_path))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to deserialize transcript from {:?}", file_path))
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        let file_path = self.file_path(id);
        if !file_path.exists() {
            return Err(anyhow!("Conversation {} not found.", id));
        }
        fs::remove_file(&file_path)
            .with_context(|| format!("Failed to delete transcript file at {:?}", file_path))
    }

    /// All readable conversations, most recently updated first.
    /// Unreadable files are skipped with a warning.
    pub fn list(&self) -> Result<Vec<Conversation>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut conversations = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read transcript directory at {:?}", self.dir))?
        {
            let path = entry?.path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|stem| Uuid::parse_str(stem).ok())
            else {
                continue;
            };
            match self.load(id) {
                Ok(conversation) => conversations.push(conversation),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable transcript."),
            }
        }
        conversations.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));
        Ok(conversations)
    }
}
