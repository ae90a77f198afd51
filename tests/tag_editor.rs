// Drives the editor state machine through FfmpegTools with shell stand-ins
// for ffprobe and ffmpeg.
#![cfg(unix)]

use std::path::{Path, PathBuf};

use trackprobe::metadata::editor::{expand_selection, update, EditorAction, EditorState, ShownFile, SAVE_SUCCESS};
use trackprobe::metadata::FfmpegTools;
use trackprobe::tools::ExternalTool;

const PROBE_JSON: &str = r#"{"streams":[{"index":0,"codec_type":"audio","codec_name":"mp3","tags":{"encoder":"LAME"}}],"format":{"format_name":"mp3","duration":"12.0","bit_rate":"320000","tags":{"title":"Old Title","genre":"Rock"}}}"#;

fn fake_ffprobe() -> ExternalTool {
    let script = format!("cat <<'JSON'\n{}\nJSON", PROBE_JSON);
    ExternalTool::new("ffprobe", "sh").with_base_args(["-c".to_string(), script, "fake-ffprobe".to_string()])
}

/// Records its arguments beside the output and copies the input there.
fn fake_ffmpeg(args_log: &Path) -> ExternalTool {
    let script = format!(
        "printf '%s\\n' \"$@\" > '{}'; for a; do last=$a; done; cp \"$3\" \"$last\"",
        args_log.display()
    );
    ExternalTool::new("ffmpeg", "sh").with_base_args(["-c".to_string(), script, "fake-ffmpeg".to_string()])
}

fn failing_ffmpeg() -> ExternalTool {
    ExternalTool::new("ffmpeg", "sh").with_base_args(["-c", "echo 'Unknown encoder' >&2; exit 1", "fake-ffmpeg"])
}

fn library() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let album = dir.path().join("album");
    std::fs::create_dir(&album).unwrap();
    std::fs::write(album.join("01 intro.mp3"), b"ID3one").unwrap();
    std::fs::write(album.join("cover.png"), b"png").unwrap();
    (dir, album)
}

#[tokio::test]
async fn edit_writes_copy_with_trimmed_tags() {
    let (dir, album) = library();
    let log = dir.path().join("ffmpeg-args.txt");
    let tools = FfmpegTools::new(fake_ffprobe(), fake_ffmpeg(&log));

    let state = update(EditorState::default(), EditorAction::Select(expand_selection(&[album.clone()])), &tools).await;
    assert_eq!(state.status, "1 file(s) selected for editing.");
    assert_eq!(state.files[0].fields["title"], "Old Title");

    let state = update(
        state,
        EditorAction::SetField {
            file: 0,
            key: "artist".into(),
            value: "  The Band ".into(),
        },
        &tools,
    )
    .await;
    let state = update(state, EditorAction::Save, &tools).await;

    assert_eq!(state.status, SAVE_SUCCESS);
    let edited = album.join("01 intro_edited.mp3");
    assert_eq!(std::fs::read(&edited).unwrap(), b"ID3one");

    let args: Vec<String> = std::fs::read_to_string(&log).unwrap().lines().map(String::from).collect();
    assert!(args.contains(&"title=Old Title".to_string()));
    assert!(args.contains(&"artist=The Band".to_string()));
    assert!(args.contains(&"genre=Rock".to_string()));
    assert!(!args.iter().any(|a| a.starts_with("album=")));
    assert_eq!(args.last().unwrap(), &edited.display().to_string());
}

#[tokio::test]
async fn ffmpeg_failure_becomes_status_message() {
    let (_dir, album) = library();
    let tools = FfmpegTools::new(fake_ffprobe(), failing_ffmpeg());

    let state = update(EditorState::default(), EditorAction::Select(expand_selection(&[album.clone()])), &tools).await;
    let state = update(state, EditorAction::Save, &tools).await;

    assert_eq!(state.status, "Error: Unknown encoder");
    assert!(!album.join("01 intro_edited.mp3").exists());
}

#[tokio::test]
async fn show_lists_format_and_stream_metadata() {
    let (dir, album) = library();
    let tools = FfmpegTools::new(fake_ffprobe(), fake_ffmpeg(&dir.path().join("unused.txt")));

    let state = update(EditorState::default(), EditorAction::Select(expand_selection(&[album])), &tools).await;
    let state = update(state, EditorAction::Show, &tools).await;

    let [ShownFile::Probed { name, report }] = &state.shown[..] else {
        panic!("unexpected: {:?}", state.shown);
    };
    assert_eq!(name, "01 intro.mp3");
    assert_eq!(report.tag("genre"), "Rock");
    assert!(!report.format.contains_key("duration"));
    assert_eq!(report.streams[0].codec_type, "Audio");
    assert_eq!(report.streams[0].fields.get("encoder").map(String::as_str), Some("LAME"));
}

#[tokio::test]
async fn missing_probe_binary_rejects_selection() {
    let (dir, album) = library();
    let tools = FfmpegTools::new(
        ExternalTool::new("ffprobe", "/definitely/not/ffprobe"),
        fake_ffmpeg(&dir.path().join("unused.txt")),
    );

    let state = update(EditorState::default(), EditorAction::Select(expand_selection(&[album])), &tools).await;
    assert!(!state.has_selection());
    assert_eq!(state.status, "No valid file selected.");
}
