use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

use trackprobe::Config;

#[derive(Parser, Debug)]
#[command(
    name = "trackprobe",
    version,
    about = "Audio feature extraction, YouTube-to-MP3 retrieval and MP3 tag editing"
)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the web server (POST /analyze, POST /download, GET /).
    Serve,
    /// Analyze one local audio file and print key, tempo, energy and genre.
    Analyze(AnalyzeArgs),
    /// Show or edit MP3 tags.
    #[command(subcommand)]
    Tags(TagsCommand),
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum TagsCommand {
    /// Print container and stream metadata.
    Show {
        /// MP3 files or directories to search recursively
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },
    /// Write `<name>_edited.mp3` copies with new tags.
    Edit(EditArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// MP3 files or directories to search recursively
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub artist: Option<String>,
    #[arg(long)]
    pub album: Option<String>,
    #[arg(long)]
    pub genre: Option<String>,
    /// Year
    #[arg(long)]
    pub date: Option<String>,
    /// Track number
    #[arg(long)]
    pub track: Option<String>,
    #[arg(long)]
    pub comment: Option<String>,
    #[arg(long)]
    pub lyrics: Option<String>,
    /// FFmpeg audio filter chain, e.g. "atempo=1.25,volume=0.8"
    #[arg(long = "filter", value_name = "FILTERS")]
    pub audio_filters: Option<String>,
}

impl EditArgs {
    /// Field values given on the command line, keyed by tag.
    pub fn field_overrides(&self) -> BTreeMap<String, String> {
        [
            ("title", &self.title),
            ("artist", &self.artist),
            ("album", &self.album),
            ("genre", &self.genre),
            ("date", &self.date),
            ("track", &self.track),
            ("comment", &self.comment),
            ("lyrics", &self.lyrics),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_analyze_with_json_flag() {
        let cli = Cli::try_parse_from(["trackprobe", "analyze", "song.wav", "--json"]).unwrap();
        match cli.command {
            Command::Analyze(args) => {
                assert_eq!(args.file, PathBuf::from("song.wav"));
                assert!(args.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn edit_collects_only_given_fields() {
        let cli = Cli::try_parse_from([
            "trackprobe",
            "tags",
            "edit",
            "a.mp3",
            "music/",
            "--title",
            "New",
            "--date",
            "2001",
            "--filter",
            "volume=0.8",
        ])
        .unwrap();
        let Command::Tags(TagsCommand::Edit(args)) = cli.command else {
            panic!("expected tags edit");
        };
        assert_eq!(args.paths.len(), 2);
        let fields = args.field_overrides();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["title"], "New");
        assert_eq!(fields["date"], "2001");
        assert_eq!(args.audio_filters.as_deref(), Some("volume=0.8"));
    }

    #[test]
    fn tags_show_requires_a_path() {
        assert!(Cli::try_parse_from(["trackprobe", "tags", "show"]).is_err());
    }

    #[test]
    fn config_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "trackprobe",
            "--scratch-dir",
            "/tmp/scratch",
            "--ytdlp",
            "/opt/yt-dlp",
            "serve",
        ])
        .unwrap();
        assert_eq!(cli.config.scratch_dir, PathBuf::from("/tmp/scratch"));
        assert_eq!(cli.config.ytdlp, PathBuf::from("/opt/yt-dlp"));
        if std::env::var_os("TRACKPROBE_MAX_UPLOAD_BYTES").is_none() {
            assert_eq!(cli.config.max_upload_bytes, 100 * 1024 * 1024);
        }
    }

    #[test]
    fn global_config_flags_work_after_subcommand() {
        let cli = Cli::try_parse_from(["trackprobe", "serve", "--addr", "0.0.0.0:9000"]).unwrap();
        assert_eq!(cli.config.addr.port(), 9000);
    }
}
