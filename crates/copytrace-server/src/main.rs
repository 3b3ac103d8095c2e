use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "copytrace")]
#[command(about = "Plagiarism-analysis service (trigger endpoint + pipeline worker)", long_about = None)]
struct Cli {
    /// Port to listen on. Hosting platforms inject PORT.
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,
    /// Bind address; 0.0.0.0 listens on all interfaces (needed in containers).
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "copytrace_server=info,copytrace_local=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let ctx = Arc::new(copytrace_server::AppContext::from_env()?);
    copytrace_server::http::serve(ctx, &cli.host, cli.port).await?;
    Ok(())
}
