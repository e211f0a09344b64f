use std::path::PathBuf;

pub fn managed_bin_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("baixatube").join("bin"))
}

fn enhanced_path() -> Option<String> {
    let bin_dir = managed_bin_dir()?;
    let sep = if cfg!(windows) { ";" } else { ":" };
    let current = std::env::var("PATH").unwrap_or_default();
    Some(format!("{}{}{}", bin_dir.display(), sep, current))
}

/// Builds a command with the managed bin directory prepended to PATH, so a
/// yt-dlp fetched by `ensure_ytdlp` is found on later runs. yt-dlp is a
/// Python program; the UTF-8 variables keep its output decodable on
/// Windows consoles.
pub fn command<S: AsRef<std::ffi::OsStr>>(program: S) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    if let Some(path) = enhanced_path() {
        cmd.env("PATH", path);
    }
    cmd.env("PYTHONIOENCODING", "utf-8");
    cmd.env("PYTHONUTF8", "1");
    cmd
}
