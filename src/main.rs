use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = baixatube::cli::Args::parse();
    baixatube::cli::run(args).await
}
