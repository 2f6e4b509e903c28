use clap::{Parser, Subcommand};
use fx_app::credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
use fx_app::generator::backend::HttpRelay;
use fx_app::{AppConfig, ControllerState, Generator, ValidationError, relay};
use fx_core::GenerationRequest;
use fx_core::image::read_data_url;
use fx_core::params::{DEFAULT_STRENGTH, clamp_strength};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "fluxjutsu",
    version,
    about = "FLUX.1 image generation through a Replicate relay"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the relay server
    Serve,
    /// Submit a job and follow it to completion (Ctrl-C cancels)
    Generate(GenerateArgs),
    /// Store the Replicate API key
    SetKey { api_key: String },
    /// List the models offered by the relay
    Models,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long, default_value = "")]
    prompt: String,
    /// Source image (png, jpg, webp or gif)
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_STRENGTH)]
    strength: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    let code = match cli.command {
        Command::Serve => {
            relay::serve(&config).await?;
            0
        }
        Command::Generate(args) => generate(&config, args).await?,
        Command::SetKey { api_key } => {
            FileCredentialStore::new(&config.credentials_path).set(api_key)?;
            println!("Your Replicate API key has been saved.");
            0
        }
        Command::Models => list_models(&config).await?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// `REPLICATE_API_TOKEN` wins over the stored key for this run.
fn credential_store(config: &AppConfig) -> Arc<dyn CredentialStore> {
    match std::env::var("REPLICATE_API_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty())
    {
        Some(token) => Arc::new(MemoryCredentialStore::new(Some(token))),
        None => Arc::new(FileCredentialStore::new(&config.credentials_path)),
    }
}

async fn generate(config: &AppConfig, args: GenerateArgs) -> anyhow::Result<i32> {
    let relay = Arc::new(HttpRelay::new(&config.relay_url, config.http_timeout)?);
    let generator = Generator::new(relay, credential_store(config), config.generator());

    let mut request =
        GenerationRequest::new(args.prompt).with_strength(clamp_strength(args.strength));
    if let Some(path) = &args.image {
        request = request.with_source_image(read_data_url(path)?);
    }

    let mut rx = generator.subscribe();
    let printer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            println!("{state}");
        }
    });

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let settled = match generator.run(request, interrupt).await {
        Ok(state) => state,
        Err(e) if e.is_rejection() => {
            printer.abort();
            eprintln!("{e}");
            if matches!(
                e,
                fx_app::AppError::Validation(ValidationError::MissingCredential)
            ) {
                eprintln!("Run `fluxjutsu set-key <key>` or set REPLICATE_API_TOKEN.");
            }
            return Ok(2);
        }
        Err(e) => {
            eprintln!("Failed to cancel image generation. Please try again. ({e})");
            generator.state()
        }
    };
    printer.abort();

    Ok(match settled {
        ControllerState::Succeeded { output } => {
            println!("{output}");
            0
        }
        ControllerState::Failed(failure) => {
            eprintln!("{}", failure.user_message());
            1
        }
        ControllerState::Canceled => {
            eprintln!("Image generation was cancelled.");
            130
        }
        _ => 1,
    })
}

async fn list_models(config: &AppConfig) -> anyhow::Result<i32> {
    let Some(api_key) = credential_store(config).get() else {
        eprintln!("{}", ValidationError::MissingCredential);
        return Ok(2);
    };

    let relay = HttpRelay::new(&config.relay_url, config.http_timeout)?;
    for model in relay.models(&api_key).await? {
        let version: String = model.latest_version.chars().take(12).collect();
        println!("{:<40} {version}  {}", model.slug(), model.description);
    }
    Ok(0)
}
