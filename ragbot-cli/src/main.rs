use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use ragbot_core::config::{Config, StorageMode, DEFAULT_CONFIG_PATH};
use ragbot_core::provider::{OllamaProvider, Provider};
use ragbot_core::{ChatSession, Server};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ragbot")]
#[command(about = "Answer questions about llamas with retrieval augmented generation", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Serve the /ragbot HTTP endpoint")]
    Serve {
        #[arg(short, long, help = "Port to listen on (overrides config and PORT)")]
        port: Option<u16>,
    },

    #[command(about = "Chat with the model from the terminal")]
    Chat,

    #[command(about = "Configuration commands")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    #[command(about = "List available models from Ollama")]
    Models,
}

#[derive(Subcommand)]
enum ConfigCommands {
    #[command(about = "Show the effective configuration")]
    Show {
        #[arg(long, help = "Print as YAML")]
        yaml: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("ragbot=info,ragbot_core=info,tower_http=info"))
        .context("Invalid log filter")?;
    // Keep stdout for streamed replies
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    debug!(path = %cli.config.display(), model = %config.llm.model, "Loaded configuration");

    match cli.command {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Chat => chat(config).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show { yaml } => show_config(&config, yaml),
        },
        Commands::Models => list_models(&config).await,
    }
}

async fn serve(mut config: Config, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        info!(port, "Overriding configured port");
        config.server.port = port;
    }

    let server = Server::new(&config).context("Failed to set up retrieval")?;

    println!(
        "{} Serving on {}",
        "→".blue(),
        format!("http://0.0.0.0:{}/ragbot", config.server.port).bold()
    );

    server.start().await.context("Server error")
}

async fn chat(config: Config) -> Result<()> {
    let provider: Arc<dyn Provider> = Arc::new(OllamaProvider::from_config(&config));
    let mut session = ChatSession::from_config(&config, provider);

    println!(
        "{} Chatting with {} (type {} to quit)",
        "→".blue(),
        config.llm.model.cyan(),
        ragbot_core::session::EXIT_COMMAND.bold()
    );

    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut output = std::io::stdout();
    let turns = session
        .run(input, &mut output)
        .await
        .context("Chat session I/O failed")?;

    println!("{} {} turn(s)", "✓".green().bold(), turns);
    Ok(())
}

fn show_config(config: &Config, yaml: bool) -> Result<()> {
    if yaml {
        let rendered = serde_yaml::to_string(config).context("Failed to serialize config")?;
        print!("{}", rendered);
        return Ok(());
    }

    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Model:           {}", config.llm.model.cyan());
    println!("  Base URL:        {}", config.llm.base_url);
    println!("  Temperature:     {}", config.llm.temperature);
    println!();
    println!("{}", "RAG:".bold());
    println!("  Embedding Model: {}", config.rag.embedding_model.cyan());
    println!("  Embedding Dim:   {}", config.rag.embedding_dim);
    println!();
    println!("{}", "Storage:".bold());
    match &config.storage.backend {
        StorageMode::Chroma { url } => println!("  Backend:         chroma ({})", url),
        StorageMode::Qdrant { url } => println!("  Backend:         qdrant ({})", url),
        StorageMode::Memory => println!("  Backend:         memory"),
    }
    match &config.storage.collection_name {
        Some(name) => println!("  Collection:      {}", name.cyan()),
        None => println!(
            "  Collection:      {}-<generated per run>",
            config.storage.collection_prefix
        ),
    }
    println!();
    println!("{}", "Server:".bold());
    println!("  Port:            {}", config.server.port);
    println!("  Default Prompt:  {}", config.server.default_prompt);

    Ok(())
}

async fn list_models(config: &Config) -> Result<()> {
    let provider = OllamaProvider::from_config(config);

    println!("{} Fetching models from {}...", "→".blue(), provider.base_url());
    println!();

    let models = provider
        .list_models()
        .await
        .context("Failed to connect to Ollama. Is it running?")?;

    if models.is_empty() {
        println!("{}", "No models found. Pull a model with 'ollama pull <model>'".yellow());
        return Ok(());
    }

    println!("{}", "Available models:".bold().green());
    println!();

    for model in models {
        let size_gb = model.size as f64 / (1024.0 * 1024.0 * 1024.0);
        let marker = if model.name == config.llm.model {
            " (chat)"
        } else if model.name == config.rag.embedding_model {
            " (embeddings)"
        } else {
            ""
        };
        println!(
            "  {} {} ({:.2} GB){}",
            "•".cyan(),
            model.name.bold(),
            size_gb,
            marker.green()
        );
    }

    Ok(())
}
