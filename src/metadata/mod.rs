// MP3 container metadata: reading via ffprobe, rewriting via ffmpeg.
//
// Read path: ffprobe's JSON is flattened into display maps, one for the
// container and one per stream. Structural fields (duration, bit_rate, codec
// parameters, ...) are left out; everything else, tags included, is shown.
//
// Write path: one ffmpeg re-encode per file that sets each non-blank tag and
// optionally applies an audio filter chain, writing `<stem>_edited<ext>`.

pub mod editor;

use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::ToolError;
use crate::tools::ExternalTool;

/// Editable tag keys in display order, with their field labels.
pub const METADATA_FIELDS: [(&str, &str); 8] = [
    ("title", "Song title"),
    ("artist", "Artist"),
    ("album", "Album"),
    ("genre", "Genre"),
    ("date", "Year"),
    ("track", "Track number"),
    ("comment", "Comment"),
    ("lyrics", "Lyrics"),
];

/// Container fields never shown in the display mapping.
const FORMAT_EXCLUDED: [&str; 10] = [
    "tags",
    "filename",
    "nb_streams",
    "nb_programs",
    "format_long_name",
    "start_time",
    "duration",
    "size",
    "bit_rate",
    "probe_score",
];

/// Stream fields never shown in the display mapping.
const STREAM_EXCLUDED: [&str; 26] = [
    "tags",
    "index",
    "codec_name",
    "codec_type",
    "codec_long_name",
    "profile",
    "codec_time_base",
    "codec_tag_string",
    "codec_tag",
    "sample_fmt",
    "sample_rate",
    "channels",
    "channel_layout",
    "bits_per_sample",
    "bits_per_raw_sample",
    "r_frame_rate",
    "avg_frame_rate",
    "time_base",
    "start_pts",
    "start_time",
    "duration_ts",
    "duration",
    "bit_rate",
    "max_bit_rate",
    "nb_frames",
    "disposition",
];

/// Suffix inserted before the extension of edited copies.
pub const EDITED_SUFFIX: &str = "_edited";

/// Flat key → value mapping shown to the user, sorted by key.
pub type DisplayMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamMetadata {
    /// Position in ffprobe's stream list
    pub position: usize,
    /// "Audio", "Video", ... ("Unknown" when ffprobe gives none)
    pub codec_type: String,
    pub fields: DisplayMap,
}

/// Everything ffprobe reports about one file, reduced to display maps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbeReport {
    pub format: DisplayMap,
    pub streams: Vec<StreamMetadata>,
}

impl ProbeReport {
    /// Current value of a container-level tag, empty when absent.
    pub fn tag(&self, key: &str) -> &str {
        self.format.get(key).map(String::as_str).unwrap_or("")
    }
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `tags` merged with the object's own fields minus `excluded`; own fields win.
fn flatten(object: &serde_json::Map<String, Value>, excluded: &[&str]) -> DisplayMap {
    let mut map: DisplayMap = object
        .get("tags")
        .and_then(Value::as_object)
        .map(|tags| {
            tags.iter()
                .map(|(k, v)| (k.clone(), value_to_display(v)))
                .collect()
        })
        .unwrap_or_default();

    for (key, value) in object {
        if !excluded.contains(&key.as_str()) {
            map.insert(key.clone(), value_to_display(value));
        }
    }
    map
}

/// First character upper-cased, the rest lower-cased.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_json(json: &str) -> Result<ProbeReport, ToolError> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| ToolError::malformed("ffprobe", e.to_string()))?;
    let root = root
        .as_object()
        .ok_or_else(|| ToolError::malformed("ffprobe", "top-level value is not an object"))?;

    let format = root
        .get("format")
        .and_then(Value::as_object)
        .map(|f| flatten(f, &FORMAT_EXCLUDED))
        .unwrap_or_default();

    let streams = root
        .get("streams")
        .and_then(Value::as_array)
        .map(|streams| {
            streams
                .iter()
                .filter_map(Value::as_object)
                .enumerate()
                .map(|(position, stream)| StreamMetadata {
                    position,
                    codec_type: capitalize(
                        stream
                            .get("codec_type")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown"),
                    ),
                    fields: flatten(stream, &STREAM_EXCLUDED),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ProbeReport { format, streams })
}

/// Tags and filter chain to write into one file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataSet {
    /// Non-blank, trimmed values in [`METADATA_FIELDS`] order
    pub tags: Vec<(String, String)>,
    pub audio_filters: Option<String>,
}

impl MetadataSet {
    /// Build from raw field values, dropping unknown keys and blank values.
    pub fn from_fields(fields: &BTreeMap<String, String>, audio_filters: &str) -> Self {
        let tags = METADATA_FIELDS
            .iter()
            .filter_map(|(key, _)| {
                let value = fields.get(*key)?.trim();
                (!value.is_empty()).then(|| (key.to_string(), value.to_string()))
            })
            .collect();
        let filters = audio_filters.trim();
        Self {
            tags,
            audio_filters: (!filters.is_empty()).then(|| filters.to_string()),
        }
    }
}

/// `<stem>_edited<ext>` beside the source file.
pub fn edited_output_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}{}.{}", stem, EDITED_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, EDITED_SUFFIX),
    };
    path.with_file_name(name)
}

pub fn probe_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(path.as_os_str().to_owned());
    args
}

/// ffmpeg arguments: optional filter chain, one `-metadata` per tag, then a
/// fixed libmp3lame 320k / 48kHz / q0 profile.
pub fn transcode_args(input: &Path, metadata: &MetadataSet, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), input.as_os_str().to_owned()];

    if let Some(filters) = &metadata.audio_filters {
        args.push("-af".into());
        args.push(filters.into());
    }
    for (key, value) in &metadata.tags {
        args.push("-metadata".into());
        args.push(format!("{}={}", key, value).into());
    }
    for arg in ["-c:a", "libmp3lame", "-b:a", "320k", "-ar", "48000", "-q:a", "0"] {
        args.push(arg.into());
    }
    args.push(output.as_os_str().to_owned());
    args
}

/// Access to the media probe and transcoder.
#[allow(async_fn_in_trait)]
pub trait MediaTools {
    async fn probe(&self, path: &Path) -> Result<ProbeReport, ToolError>;

    async fn rewrite(&self, input: &Path, metadata: &MetadataSet, output: &Path) -> Result<(), ToolError>;
}

/// [`MediaTools`] backed by the ffprobe and ffmpeg binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    ffprobe: ExternalTool,
    ffmpeg: ExternalTool,
}

impl FfmpegTools {
    pub fn new(ffprobe: ExternalTool, ffmpeg: ExternalTool) -> Self {
        Self { ffprobe, ffmpeg }
    }
}

impl MediaTools for FfmpegTools {
    async fn probe(&self, path: &Path) -> Result<ProbeReport, ToolError> {
        let output = self.ffprobe.run(probe_args(path)).await?;
        parse_probe_json(&output.stdout)
    }

    async fn rewrite(&self, input: &Path, metadata: &MetadataSet, output: &Path) -> Result<(), ToolError> {
        tracing::debug!("Re-encoding {:?} with libmp3lame to {:?}", input, output);
        if let Some(filters) = &metadata.audio_filters {
            tracing::debug!("Applying audio filters: {}", filters);
        }
        self.ffmpeg.run(transcode_args(input, metadata, output)).await?;
        Ok(())
    }
}
