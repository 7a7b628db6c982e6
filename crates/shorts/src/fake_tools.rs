//! Shell-script stand-ins for yt-dlp, ffprobe and ffmpeg used by tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// ffprobe JSON for a 90 s 1920x1080 source with audio
pub const LANDSCAPE_JSON: &str = r#"{
    "streams": [
        {"index": 0, "codec_type": "video", "width": 1920, "height": 1080, "duration": "90.000000"},
        {"index": 1, "codec_type": "audio"}
    ],
    "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "90.000000"}
}"#;

/// Write an executable `/bin/sh` script into `dir`
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// yt-dlp that records its arguments, sleeps `delay_secs`, then writes
/// `<template with ext=mp4>` and prints the output marker
pub fn ytdlp(dir: &Path, delay_secs: u32) -> PathBuf {
    let body = format!(
        r#"printf '%s\n' "$@" > "$0.args"
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
  esac
  shift
done
sleep {delay_secs}
path=$(printf '%s' "$out" | sed 's/%(ext)s/mp4/')
printf 'source video' > "$path"
echo "[download] Destination: $path"
echo "SHORTS_OUTPUT|$path""#
    );
    write_script(dir, "yt-dlp", &body)
}

/// Arguments the fake yt-dlp was last called with
pub fn recorded_args(script: &Path) -> Vec<String> {
    let mut record = script.as_os_str().to_owned();
    record.push(".args");
    std::fs::read_to_string(PathBuf::from(record))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// ffprobe that prints `json` regardless of its input
pub fn ffprobe(dir: &Path, json: &str) -> PathBuf {
    write_script(dir, "ffprobe", &format!("cat <<'JSON'\n{}\nJSON", json))
}

/// ffmpeg that writes its last argument as the encoded output
pub fn ffmpeg(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "ffmpeg",
        r#"for last; do :; done
printf 'encoded short' > "$last""#,
    )
}

/// ffmpeg that leaves a partial output behind and exits non-zero
pub fn failing_ffmpeg(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "ffmpeg",
        r#"for last; do :; done
printf 'half a short' > "$last"
echo "Error while encoding stream #0:0" >&2
exit 1"#,
    )
}
