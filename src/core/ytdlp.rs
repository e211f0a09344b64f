use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::anyhow;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::core::process;
use crate::core::selector::BEST_EXPR;
use crate::models::media::{DownloadOutcome, FormatRecord, VideoInfo};

fn ytdlp_bin_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

pub async fn find_ytdlp() -> Option<PathBuf> {
    let bin_name = ytdlp_bin_name();

    if let Ok(status) = process::command(bin_name)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        if status.success() {
            return Some(PathBuf::from(bin_name));
        }
    }

    let managed = process::managed_bin_dir()?.join(bin_name);
    managed.exists().then_some(managed)
}

/// Locates yt-dlp, fetching the release binary into the managed data
/// directory when it is missing from PATH.
pub async fn ensure_ytdlp() -> anyhow::Result<PathBuf> {
    if let Some(path) = find_ytdlp().await {
        return Ok(path);
    }

    fetch_ytdlp_binary().await
}

async fn fetch_ytdlp_binary() -> anyhow::Result<PathBuf> {
    let target = process::managed_bin_dir()
        .ok_or_else(|| anyhow!("Não foi possível determinar o diretório de dados"))?
        .join(ytdlp_bin_name());

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let download_url = if cfg!(target_os = "windows") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe"
    } else if cfg!(target_os = "macos") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_macos"
    } else {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp"
    };

    tracing::info!("yt-dlp não encontrado; baixando de {}", download_url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()?;

    let response = client.get(download_url).send().await?;

    if !response.status().is_success() {
        return Err(anyhow!("Falha ao baixar yt-dlp: HTTP {}", response.status()));
    }

    let bytes = response.bytes().await?;
    tokio::fs::write(&target, &bytes).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o755);
        tokio::fs::set_permissions(&target, perms).await?;
    }

    Ok(target)
}

pub fn is_youtube_url(url: &str) -> bool {
    if let Ok(parsed) = url::Url::parse(url) {
        if let Some(host) = parsed.host_str() {
            let host = host.to_lowercase();
            return host == "youtube.com"
                || host.ends_with(".youtube.com")
                || host == "youtu.be"
                || host == "youtube-nocookie.com"
                || host.ends_with(".youtube-nocookie.com");
        }
    }
    false
}

/// Runs `yt-dlp -j` and extracts the title plus the format list. Any
/// failure of the metadata query aborts the operation; it is never
/// retried.
pub async fn fetch_video_info(ytdlp: &Path, url: &str) -> anyhow::Result<VideoInfo> {
    let output = process::command(ytdlp)
        .args(["-j", "--no-warnings", "--no-playlist", url])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| anyhow!("Falha ao executar yt-dlp: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "Erro ao obter informações do vídeo: {}",
            stderr.trim()
        ));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| anyhow!("yt-dlp retornou JSON inválido: {}", e))?;

    let title = json
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or("Video")
        .to_string();

    Ok(VideoInfo {
        title,
        formats: parse_formats(&json),
    })
}

fn height_from_resolution(resolution: &str) -> Option<u32> {
    let (_, h) = resolution.split_once('x')?;
    h.trim().parse().ok()
}

pub fn parse_formats(json: &serde_json::Value) -> Vec<FormatRecord> {
    let formats = match json.get("formats").and_then(|v| v.as_array()) {
        Some(f) => f,
        None => return Vec::new(),
    };

    let mut result = Vec::new();
    for f in formats {
        let format_id = match f.get("format_id").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => continue,
        };

        let ext = f.get("ext").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let vcodec = f.get("vcodec").and_then(|v| v.as_str()).map(|s| s.to_string());
        let acodec = f.get("acodec").and_then(|v| v.as_str()).map(|s| s.to_string());
        let width = f.get("width").and_then(|v| v.as_u64()).map(|v| v as u32);
        let raw_resolution = f
            .get("resolution")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        // Some extractors only report a "WxH" resolution string; recover
        // the height from it in that case.
        let height = f
            .get("height")
            .and_then(|v| v.as_u64())
            .map(|h| h as u32)
            .or_else(|| raw_resolution.as_deref().and_then(height_from_resolution));

        let resolution = match (width, height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(format!("{}x{}", w, h)),
            _ => raw_resolution,
        };

        let abr = f.get("abr").and_then(|v| v.as_f64());
        let language = f.get("language").and_then(|v| v.as_str()).map(|s| s.to_string());
        let format_note = f
            .get("format_note")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        result.push(FormatRecord {
            format_id,
            ext,
            vcodec,
            acodec,
            height,
            resolution,
            abr,
            language,
            format_note,
        });
    }

    result
}

/// Downloads `url` with the given format expression, merging into mp4 at
/// `output_path`. Progress percentages parsed from stdout are forwarded
/// over `progress`.
pub async fn download(
    ytdlp: &Path,
    url: &str,
    format_expr: &str,
    output_path: &Path,
    progress: mpsc::Sender<f64>,
) -> anyhow::Result<DownloadOutcome> {
    run_download(ytdlp, url, format_expr, output_path, progress.clone()).await?;
    let _ = progress.send(100.0).await;
    finish(output_path).await
}

/// Like [`download`], but after a failed attempt retries exactly once with
/// the maximally permissive `"best"` expression. Only the download step is
/// retried, never the metadata query.
pub async fn download_with_fallback(
    ytdlp: &Path,
    url: &str,
    format_expr: &str,
    output_path: &Path,
    progress: mpsc::Sender<f64>,
) -> anyhow::Result<DownloadOutcome> {
    if let Err(e) = run_download(ytdlp, url, format_expr, output_path, progress.clone()).await {
        tracing::warn!(
            "Download com o formato '{}' falhou: {}. Tentando com '{}'",
            format_expr,
            e,
            BEST_EXPR
        );
        run_download(ytdlp, url, BEST_EXPR, output_path, progress.clone()).await?;
    }

    let _ = progress.send(100.0).await;
    finish(output_path).await
}

async fn run_download(
    ytdlp: &Path,
    url: &str,
    format_expr: &str,
    output_path: &Path,
    progress: mpsc::Sender<f64>,
) -> anyhow::Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let output_arg = output_path.to_string_lossy().to_string();
    let args = [
        "-f",
        format_expr,
        "--merge-output-format",
        "mp4",
        "--no-playlist",
        "--newline",
        "--progress-template",
        "download:%(progress._percent_str)s",
        "-o",
        &output_arg,
        url,
    ];

    tracing::debug!("Executando yt-dlp {:?}", args);

    let mut child = process::command(ytdlp)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow!("Falha ao iniciar yt-dlp: {}", e))?;

    let stdout = child.stdout.take().ok_or_else(|| anyhow!("Sem stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| anyhow!("Sem stderr"))?;

    let progress_tx = progress.clone();
    let line_reader = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(pct) = parse_progress_line(&line) {
                let _ = progress_tx.send(pct).await;
            }
        }
    });

    let err_reader = tokio::spawn(async move {
        let mut diagnostics = String::new();
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            diagnostics.push_str(&line);
            diagnostics.push('\n');
        }
        diagnostics
    });

    let status = child
        .wait()
        .await
        .map_err(|e| anyhow!("Processo yt-dlp falhou: {}", e))?;

    let _ = line_reader.await;
    let diagnostics = err_reader.await.unwrap_or_default();

    if !status.success() {
        return Err(anyhow!(
            "yt-dlp saiu com código {}: {}",
            status,
            diagnostics.trim()
        ));
    }

    Ok(())
}

async fn finish(output_path: &Path) -> anyhow::Result<DownloadOutcome> {
    let meta = tokio::fs::metadata(output_path).await.map_err(|_| {
        anyhow!(
            "yt-dlp informou sucesso, mas o arquivo {} não foi encontrado",
            output_path.display()
        )
    })?;

    Ok(DownloadOutcome {
        file_path: output_path.to_path_buf(),
        file_size_bytes: meta.len(),
    })
}

fn parse_progress_line(line: &str) -> Option<f64> {
    let line = line.trim();
    let pct_str = if let Some(rest) = line.strip_prefix("download:") {
        rest.trim().trim_end_matches('%')
    } else if line.ends_with('%') {
        line.trim_end_matches('%').split_whitespace().last()?
    } else {
        return None;
    };

    pct_str.trim().parse::<f64>().ok()
}
