// Batch MP3 tag editor as an explicit state machine.
//
// `update` consumes the current state and one action and returns the next
// state. All tool access goes through `MediaTools`, so the transitions run
// unchanged against ffprobe/ffmpeg or a test double.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{edited_output_path, MediaTools, MetadataSet, ProbeReport, METADATA_FIELDS};
use crate::error::ToolError;

/// One selected file and its pending edits.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Field values keyed by tag, one entry per [`METADATA_FIELDS`] key
    pub fields: BTreeMap<String, String>,
    pub audio_filters: String,
}

impl FileEntry {
    fn from_probe(path: PathBuf, report: &ProbeReport) -> Self {
        let fields = METADATA_FIELDS
            .iter()
            .map(|(key, _)| (key.to_string(), report.tag(key).to_string()))
            .collect();
        Self {
            path,
            fields,
            audio_filters: String::new(),
        }
    }

    pub fn name(&self) -> String {
        display_name(&self.path)
    }

    /// Non-blank fields as (label, value) pairs in display order.
    pub fn labeled_fields(&self) -> Vec<(&'static str, &str)> {
        METADATA_FIELDS
            .iter()
            .filter_map(|&(key, label)| {
                let value = self.fields.get(key)?.trim();
                (!value.is_empty()).then_some((label, value))
            })
            .collect()
    }
}

/// Probe result for one selected file, as produced by [`EditorAction::Show`].
#[derive(Debug, Clone, PartialEq)]
pub enum ShownFile {
    Probed { name: String, report: ProbeReport },
    Failed { name: String, error: String },
}

/// Result of rewriting one file.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub source: PathBuf,
    pub output: PathBuf,
    pub message: String,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditorState {
    pub files: Vec<FileEntry>,
    /// Latest status line shown to the user
    pub status: String,
    pub shown: Vec<ShownFile>,
    pub saved: Vec<SaveOutcome>,
}

impl EditorState {
    /// Save and show are only meaningful with at least one selected file.
    pub fn has_selection(&self) -> bool {
        !self.files.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorAction {
    /// Replace the selection with these paths.
    Select(Vec<PathBuf>),
    SetField {
        file: usize,
        key: String,
        value: String,
    },
    SetFilter {
        file: usize,
        filters: String,
    },
    Save,
    Show,
}

pub const SAVE_SUCCESS: &str = "Metadata and content updated successfully.";

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn is_mp3(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("mp3"))
        .unwrap_or(false)
}

/// Expand directories into the `.mp3` files beneath them, sorted by path.
/// Plain file arguments are passed through so selection can report them.
pub fn expand_selection(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            paths.push(input.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(input)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {:?}: {}", input, e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_mp3(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        found.sort();
        tracing::debug!("Found {} MP3 file(s) under {:?}", found.len(), input);
        paths.extend(found);
    }
    paths
}

/// Compute the state following `action`.
pub async fn update<T: MediaTools>(state: EditorState, action: EditorAction, tools: &T) -> EditorState {
    match action {
        EditorAction::Select(paths) => select(state, paths, tools).await,
        EditorAction::SetField { file, key, value } => set_field(state, file, key, value),
        EditorAction::SetFilter { file, filters } => set_filter(state, file, filters),
        EditorAction::Save => save(state, tools).await,
        EditorAction::Show => show(state, tools).await,
    }
}

async fn select<T: MediaTools>(mut state: EditorState, paths: Vec<PathBuf>, tools: &T) -> EditorState {
    if paths.is_empty() {
        state.status = "No file selected.".to_string();
        return state;
    }

    state.files.clear();
    state.shown.clear();
    state.saved.clear();

    for path in paths {
        let name = display_name(&path);
        if !is_mp3(&path) {
            tracing::warn!("Invalid file: {:?}", path);
            state.status = format!("File {} is not a valid MP3.", name);
            continue;
        }

        match tools.probe(&path).await {
            Ok(report) => state.files.push(FileEntry::from_probe(path, &report)),
            Err(e) => {
                tracing::error!("Metadata error for {:?}: {}", path, e);
                state.status = format!("Error extracting metadata from {}: {}", name, e);
            }
        }
    }

    if state.has_selection() {
        state.status = format!("{} file(s) selected for editing.", state.files.len());
        tracing::debug!("Files selected: {:?}", state.files.iter().map(|f| &f.path).collect::<Vec<_>>());
    } else {
        state.status = "No valid file selected.".to_string();
    }
    state
}

fn set_field(mut state: EditorState, file: usize, key: String, value: String) -> EditorState {
    if !METADATA_FIELDS.iter().any(|(k, _)| *k == key) {
        state.status = format!("Unknown metadata field: {}", key);
        return state;
    }
    match state.files.get_mut(file) {
        Some(entry) => {
            entry.fields.insert(key, value);
        }
        None => state.status = format!("No selected file at position {}.", file + 1),
    }
    state
}

fn set_filter(mut state: EditorState, file: usize, filters: String) -> EditorState {
    match state.files.get_mut(file) {
        Some(entry) => entry.audio_filters = filters,
        None => state.status = format!("No selected file at position {}.", file + 1),
    }
    state
}

fn save_message(result: &Result<(), ToolError>) -> String {
    match result {
        Ok(()) => SAVE_SUCCESS.to_string(),
        Err(ToolError::Failed { stderr, .. }) => format!("Error: {}", stderr.trim()),
        Err(e) => format!("Error: {}", e),
    }
}

async fn save<T: MediaTools>(mut state: EditorState, tools: &T) -> EditorState {
    if !state.has_selection() {
        state.status = "No file selected to save.".to_string();
        return state;
    }

    state.saved.clear();
    for entry in &state.files {
        let metadata = MetadataSet::from_fields(&entry.fields, &entry.audio_filters);
        let output = edited_output_path(&entry.path);

        let result = tools.rewrite(&entry.path, &metadata, &output).await;
        let message = save_message(&result);
        tracing::debug!("Update result for {:?}: {}", entry.path, message);

        // Each file's result replaces the previous one.
        state.status = message.clone();
        state.saved.push(SaveOutcome {
            source: entry.path.clone(),
            output,
            message,
            success: result.is_ok(),
        });
    }
    state
}

async fn show<T: MediaTools>(mut state: EditorState, tools: &T) -> EditorState {
    if !state.has_selection() {
        state.status = "No file selected to show metadata.".to_string();
        return state;
    }

    let mut shown = Vec::with_capacity(state.files.len());
    for entry in &state.files {
        let name = entry.name();
        match tools.probe(&entry.path).await {
            Ok(report) => shown.push(ShownFile::Probed { name, report }),
            Err(e) => {
                tracing::error!("Metadata error for {:?}: {}", entry.path, e);
                shown.push(ShownFile::Failed {
                    name,
                    error: e.to_string(),
                });
            }
        }
    }
    state.shown = shown;
    state
}
