use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::core::filename::sanitize_title;
use crate::core::selector::{self, SelectionPolicy};
use crate::core::ytdlp;
use crate::models::media::FormatRecord;

/// Baixa vídeos do YouTube com áudio em português via yt-dlp.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// URL do vídeo do YouTube
    pub url: String,

    /// Diretório de destino dos downloads
    #[arg(long, default_value = "downloads")]
    pub output_dir: PathBuf,

    /// Seleciona a melhor qualidade sem perguntar
    #[arg(long)]
    pub auto: bool,

    /// Idioma preferido da faixa de áudio (ex.: pt-BR)
    #[arg(long)]
    pub language: Option<String>,

    /// Resolução máxima do vídeo
    #[arg(long, default_value_t = 1080)]
    pub max_height: u32,

    /// Resolução mínima do vídeo (sem limite inferior por padrão)
    #[arg(long)]
    pub min_height: Option<u32>,
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    if !ytdlp::is_youtube_url(&args.url) {
        bail!("Por favor, insira uma URL válida do YouTube.");
    }

    let ytdlp_path = ytdlp::ensure_ytdlp().await?;

    println!("Analisando formatos disponíveis...");
    let info = ytdlp::fetch_video_info(&ytdlp_path, &args.url).await?;
    println!("Título do vídeo: {}", info.title);

    let audios: Vec<&FormatRecord> = info
        .formats
        .iter()
        .filter(|f| selector::is_audio_only(f))
        .collect();
    let videos: Vec<&FormatRecord> = info
        .formats
        .iter()
        .filter(|f| selector::is_video_only(f))
        .collect();

    print_audio_table(&audios);
    print_video_table(&videos);

    let mut policy = SelectionPolicy {
        max_height: args.max_height,
        min_height: args.min_height,
        ..SelectionPolicy::default()
    };
    if let Some(ref language) = args.language {
        policy = policy.with_language(language);
    }

    let automatic = if args.auto {
        true
    } else {
        let escolha = prompt("\nDeseja escolher automaticamente a melhor qualidade? (S/n): ")?;
        escolha.is_empty() || escolha.eq_ignore_ascii_case("s")
    };

    let format_expr = if automatic {
        if !args.auto {
            let idioma =
                prompt("Digite o idioma preferido (deixe em branco para português do Brasil): ")?;
            if !idioma.is_empty() {
                policy = policy.with_language(&idioma);
            }

            let resolucao = prompt(&format!(
                "Digite a resolução máxima desejada (deixe em branco para {}p): ",
                policy.max_height
            ))?;
            if !resolucao.is_empty() {
                match parse_resolution(&resolucao) {
                    Some(h) => policy.max_height = h,
                    None => println!(
                        "Resolução inválida, usando {}p como padrão.",
                        policy.max_height
                    ),
                }
            }
        }

        match selector::select(&info.formats, &policy) {
            Some(sel) => {
                println!("\nSelecionado automaticamente:");
                println!("- Áudio: {}", sel.audio.format_id);
                println!("- Vídeo: {}", sel.video.format_id);
                sel.format_expr()
            }
            None => {
                println!(
                    "\nNenhuma combinação de vídeo e áudio encontrada. \
                     Baixando com a configuração padrão."
                );
                selector::fallback_expr(policy.max_height)
            }
        }
    } else {
        let id_audio = prompt("\nDigite o ID da faixa de áudio desejada: ")?;
        let id_video = prompt("Digite o ID do formato de vídeo desejado: ")?;

        if !audios.iter().any(|f| f.format_id == id_audio) {
            bail!("ID de áudio '{}' não encontrado.", id_audio);
        }
        if !videos.iter().any(|f| f.format_id == id_video) {
            bail!("ID de vídeo '{}' não encontrado.", id_video);
        }

        format!("{}+{}", id_video, id_audio)
    };

    let output_path = args
        .output_dir
        .join(format!("{}.mp4", sanitize_title(&info.title)));

    println!("\nBaixando '{}'...", info.title);

    let (tx, mut rx) = mpsc::channel::<f64>(16);
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.green/blue}] {pos}%")?
            .progress_chars("=>-"),
    );

    let painter = tokio::spawn(async move {
        while let Some(pct) = rx.recv().await {
            bar.set_position(pct.clamp(0.0, 100.0) as u64);
        }
        bar.finish_and_clear();
    });

    let outcome =
        ytdlp::download_with_fallback(&ytdlp_path, &args.url, &format_expr, &output_path, tx)
            .await;
    let _ = painter.await;
    let outcome = outcome?;

    let tamanho_mb = outcome.file_size_bytes as f64 / (1024.0 * 1024.0);
    println!("Download concluído!");
    println!(
        "Arquivo salvo em '{}' ({:.1} MB)",
        outcome.file_path.display(),
        tamanho_mb
    );

    Ok(())
}

fn prompt(message: &str) -> anyhow::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

fn parse_resolution(input: &str) -> Option<u32> {
    input.trim().trim_end_matches(['p', 'P']).parse().ok()
}

fn print_audio_table(audios: &[&FormatRecord]) {
    println!("\nFaixas de áudio disponíveis:");
    println!("ID\tExtensão\tCodec\t\tBitrate\tIdioma/Descrição");
    println!("{}", "-".repeat(80));

    for f in audios {
        let bitrate = f
            .abr
            .map(|a| format!("{:.0}k", a))
            .unwrap_or_else(|| "N/A".to_string());
        println!(
            "{}\t{}\t\t{}\t{}\t{} {}",
            f.format_id,
            f.ext,
            f.acodec.as_deref().unwrap_or("N/A"),
            bitrate,
            f.language.as_deref().unwrap_or("desconhecido"),
            f.format_note.as_deref().unwrap_or("")
        );
    }
}

fn print_video_table(videos: &[&FormatRecord]) {
    println!("\nFormatos de vídeo disponíveis (sem áudio):");
    println!("ID\tExtensão\tResolução\tCodec");
    println!("{}", "-".repeat(80));

    for f in videos {
        println!(
            "{}\t{}\t\t{}\t{}",
            f.format_id,
            f.ext,
            f.resolution.as_deref().unwrap_or("N/A"),
            f.vcodec.as_deref().unwrap_or("N/A")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_input_accepts_plain_and_p_suffixed() {
        assert_eq!(parse_resolution("1080"), Some(1080));
        assert_eq!(parse_resolution("720p"), Some(720));
        assert_eq!(parse_resolution(" 480P "), Some(480));
    }

    #[test]
    fn resolution_input_rejects_garbage() {
        assert_eq!(parse_resolution("abc"), None);
        assert_eq!(parse_resolution("10.5"), None);
        assert_eq!(parse_resolution(""), None);
    }
}
