//! Media collaborator: source downloads and the two ffmpeg edits.
//!
//! The engine treats this module as an opaque "transform source into a
//! full edit and a short edit" step; nothing here participates in selection
//! or dedup decisions.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Extensions recognized as directly usable video sources.
pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".m4v", ".mkv", ".webm"];

/// Errors from downloading or transforming media.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("media download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("media download failed ({status}) for {url}")]
    Status { status: u16, url: String },

    #[error("media I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ffmpeg {variant} transcode failed with status {status}")]
    Transcode { variant: &'static str, status: i32 },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("yt-dlp failed with status {status} for {url}")]
    YtDlp { status: i32, url: String },

    #[error("yt-dlp produced no output for {url}")]
    NoOutput { url: String },
}

/// Does the URL path end in a directly downloadable video extension?
pub fn has_video_extension(url: &str) -> bool {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());
    VIDEO_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn extension_of(url: &str) -> Option<String> {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Transcode the source into the horizontal full edit (1280x720, padded).
pub async fn transcode_full(source: &Path, output: &Path) -> Result<(), MediaError> {
    run_ffmpeg(
        "full",
        &[
            "-y",
            "-i",
            &source.to_string_lossy(),
            "-vf",
            "scale=1280:720:force_original_aspect_ratio=decrease,pad=1280:720:(ow-iw)/2:(oh-ih)/2",
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-crf",
            "23",
            "-c:a",
            "aac",
            "-b:a",
            "128k",
            "-movflags",
            "+faststart",
            &output.to_string_lossy(),
        ],
    )
    .await
}

/// Transcode the source into the vertical short edit (1080x1920, 59s cap).
pub async fn transcode_short(source: &Path, output: &Path) -> Result<(), MediaError> {
    run_ffmpeg(
        "short",
        &[
            "-y",
            "-i",
            &source.to_string_lossy(),
            "-t",
            "59",
            "-vf",
            "scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920",
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-crf",
            "24",
            "-c:a",
            "aac",
            "-b:a",
            "96k",
            "-movflags",
            "+faststart",
            &output.to_string_lossy(),
        ],
    )
    .await
}

async fn run_ffmpeg(variant: &'static str, args: &[&str]) -> Result<(), MediaError> {
    let status = Command::new("ffmpeg")
        .args(args)
        .stdout(Stdio::null())
        .status()
        .await
        .map_err(|source| MediaError::Spawn {
            program: "ffmpeg",
            source,
        })?;

    if !status.success() {
        return Err(MediaError::Transcode {
            variant,
            status: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}

/// Stream a direct URL to disk.
pub async fn download_direct(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
    timeout: Duration,
) -> Result<(), MediaError> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| MediaError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let response = client.get(url).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(MediaError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let mut file = tokio::fs::File::create(destination)
        .await
        .map_err(|source| MediaError::Io {
            path: destination.to_path_buf(),
            source,
        })?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|source| MediaError::Io {
                path: destination.to_path_buf(),
                source,
            })?;
    }
    file.flush().await.map_err(|source| MediaError::Io {
        path: destination.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Fetch an external source video.
///
/// URLs with a recognized video extension are downloaded directly; anything
/// else goes through yt-dlp merged to mp4. Returns the path the source
/// landed at (yt-dlp chooses its own extension).
pub async fn download_external(
    client: &reqwest::Client,
    url: &str,
    destination_prefix: &Path,
    timeout: Duration,
) -> Result<PathBuf, MediaError> {
    if let Some(parent) = destination_prefix.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| MediaError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    if has_video_extension(url) {
        let ext = extension_of(url).unwrap_or_else(|| "mp4".to_string());
        let output = destination_prefix.with_extension(ext);
        tracing::info!(url = %url, "Downloading external direct source");
        download_direct(client, url, &output, timeout).await?;
        return Ok(output);
    }

    tracing::info!(url = %url, "Downloading external source via yt-dlp");
    let template = format!("{}.%(ext)s", destination_prefix.to_string_lossy());
    let status = Command::new("yt-dlp")
        .args([
            "--no-progress",
            "--no-warnings",
            "-f",
            "bv*+ba/b",
            "--merge-output-format",
            "mp4",
            "-o",
            &template,
            url,
        ])
        .stdout(Stdio::null())
        .status()
        .await
        .map_err(|source| MediaError::Spawn {
            program: "yt-dlp",
            source,
        })?;

    if !status.success() {
        return Err(MediaError::YtDlp {
            status: status.code().unwrap_or(-1),
            url: url.to_string(),
        });
    }

    newest_output(destination_prefix)?.ok_or_else(|| MediaError::NoOutput {
        url: url.to_string(),
    })
}

/// Newest file matching `<prefix>.*`, preferring recognized video
/// extensions.
fn newest_output(prefix: &Path) -> Result<Option<PathBuf>, MediaError> {
    let parent = prefix.parent().unwrap_or_else(|| Path::new("."));
    let stem = prefix
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let entries = std::fs::read_dir(parent).map_err(|source| MediaError::Io {
        path: parent.to_path_buf(),
        source,
    })?;

    let mut matches: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if !name.starts_with(&format!("{stem}.")) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        matches.push((path, modified));
    }

    matches.sort_by(|a, b| b.1.cmp(&a.1));

    let preferred = matches.iter().find(|(path, _)| {
        let lower = path.to_string_lossy().to_lowercase();
        VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
    });

    Ok(preferred
        .map(|(path, _)| path.clone())
        .or_else(|| matches.first().map(|(path, _)| path.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_video_extension() {
        assert!(has_video_extension("https://x.test/v.mp4"));
        assert!(has_video_extension("https://x.test/v.WEBM?sig=abc"));
        assert!(!has_video_extension("https://youtube.test/watch?v=abc"));
        assert!(!has_video_extension("https://x.test/page.html"));
    }

    #[test]
    fn test_extension_of_strips_query() {
        assert_eq!(
            extension_of("https://x.test/dir/v.MOV?x=1"),
            Some("mov".to_string())
        );
        assert_eq!(extension_of("https://x.test/none"), None);
    }

    #[test]
    fn test_newest_output_prefers_video_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let prefix = dir.path().join("source");
        std::fs::write(prefix.with_extension("description"), "x").unwrap();
        std::fs::write(prefix.with_extension("mp4"), "video").unwrap();

        let found = newest_output(&prefix).unwrap().unwrap();
        assert!(found.to_string_lossy().ends_with("source.mp4"));
    }

    #[test]
    fn test_newest_output_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let prefix = dir.path().join("source");
        assert!(newest_output(&prefix).unwrap().is_none());
    }
}
