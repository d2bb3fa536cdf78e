use docqa::chunking::Chunker;
use docqa::cli::{ChatInput, Cli, Commands, ConfigAction};
use docqa::config::Config;
use docqa::conversation::Role;
use docqa::embedding;
use docqa::error::{DocQaError, Result};
use docqa::extraction::{CommandExtractor, DocumentExtractor};
use docqa::llm::{ChatCompletionsClient, LanguageModel};
use docqa::retrieval::{Route, Router};
use docqa::session::{ModelFactory, Session, SessionManager};
use docqa::websearch::build_web_search;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Ask {
            question,
            documents,
            json,
        } => {
            let config = load_config(cli.config)?;
            runtime()?.block_on(cmd_ask(&config, cli.api_key, &question, &documents, json))?;
        }
        Commands::Chat { documents } => {
            let config = load_config(cli.config)?;
            runtime()?.block_on(cmd_chat(&config, cli.api_key, &documents))?;
        }
        Commands::Chunk {
            file,
            chunk_size,
            overlap,
        } => {
            let config = load_config(cli.config)?;
            runtime()?.block_on(cmd_chunk(&config, &file, chunk_size, overlap))?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "docqa=debug" } else { "docqa=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| DocQaError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

/// Router plus the session for the resolved credential
fn open_session(config: &Config, api_key: Option<String>) -> Result<(Router, Arc<Session>)> {
    let credential = api_key
        .or_else(|| std::env::var(&config.llm.api_key_env).ok())
        .ok_or_else(|| {
            DocQaError::Config(format!(
                "No API key: pass --api-key or set {}",
                config.llm.api_key_env
            ))
        })?;

    tracing::info!("Loading embedding provider '{}'", config.embedding.provider);
    let embedder = embedding::build_provider(&config.embedding)?;
    let dimension = embedder.dimension();

    let web = build_web_search(&config.web_search)
        .map_err(|e| DocQaError::Config(format!("Web search: {}", e)))?;
    let extractor: Arc<dyn DocumentExtractor> =
        Arc::new(CommandExtractor::new(config.extraction.clone()));

    let router = Router::from_config(config, embedder, web, extractor)?;

    let llm_config = config.llm.clone();
    let factory: ModelFactory = Arc::new(move |key: &str| {
        Arc::new(ChatCompletionsClient::new(&llm_config, key)) as Arc<dyn LanguageModel>
    });
    let mut sessions = SessionManager::new(factory, dimension);
    let session = sessions.get_or_create(&credential);

    Ok((router, session))
}

async fn upload(router: &Router, session: &Session, path: &Path) -> bool {
    let path = match expand_path(path) {
        Ok(path) => path,
        Err(e) => {
            println!("✗ {}", e);
            return false;
        }
    };

    let outcome = router.ingest_file(session, &path).await;
    if outcome.success {
        println!("✓ {} ({} chunks)", outcome.message, outcome.chunks);
    } else {
        println!("✗ {}: {}", path.display(), outcome.message);
    }
    outcome.success
}

async fn cmd_ask(
    config: &Config,
    api_key: Option<String>,
    question: &str,
    documents: &[PathBuf],
    json: bool,
) -> Result<()> {
    let (router, session) = open_session(config, api_key)?;

    for document in documents {
        upload(&router, &session, document).await;
    }

    let answer = router.answer(&session, question).await;

    if json {
        let output = serde_json::to_string_pretty(&answer).map_err(|e| DocQaError::Json {
            source: e,
            context: "Failed to serialize answer".to_string(),
        })?;
        println!("{}", output);
    } else {
        println!("{}", answer.text);
        if answer.route != Route::Blocked && answer.route != Route::EmptyKnowledgeBase {
            println!("\nTokens used in this response: {}", answer.tokens);
        }
    }

    Ok(())
}

async fn cmd_chat(config: &Config, api_key: Option<String>, documents: &[PathBuf]) -> Result<()> {
    let (router, session) = open_session(config, api_key)?;

    for document in documents {
        upload(&router, &session, document).await;
    }

    println!("{}", config.assistant.brand_message());
    println!("Type a question, or /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                return Err(DocQaError::Io {
                    source: e,
                    context: "Failed to read from stdin".to_string(),
                })
            }
        };

        match ChatInput::parse(&line) {
            ChatInput::Question(question) => {
                let answer = router.answer(&session, &question).await;
                println!("{}", answer.text);
                if answer.tokens > 0 {
                    println!("  (tokens: {})", answer.tokens);
                }
            }
            ChatInput::Upload(path) => {
                upload(&router, &session, &path).await;
            }
            ChatInput::Reset => {
                session.reset().await;
                println!("✓ Knowledge base has been reset.");
            }
            ChatInput::History(last_n) => {
                let turns = match last_n {
                    Some(n) => session.history_tail(n).await,
                    None => session.history().await,
                };
                for turn in turns {
                    let who = match turn.role {
                        Role::User => "You",
                        Role::Assistant => config.assistant.name.as_str(),
                    };
                    println!("{}: {}", who, turn.text);
                }
            }
            ChatInput::Tokens => {
                println!("Total tokens used: {}", session.tokens_used().await);
            }
            ChatInput::Quit => break,
            ChatInput::Help => {
                println!("  /upload <file>   add a document");
                println!("  /reset           clear documents and history");
                println!("  /history [n]     show the conversation (last n turns)");
                println!("  /tokens          total tokens used in this session");
                println!("  /quit            leave");
            }
            ChatInput::Empty => {}
            ChatInput::Unknown(input) => {
                println!("Unknown command: {} (try /help)", input);
            }
        }
    }

    Ok(())
}

async fn cmd_chunk(
    config: &Config,
    file: &Path,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    let chunker = Chunker::new(
        chunk_size.unwrap_or(config.chunking.chunk_size),
        overlap.unwrap_or(config.chunking.overlap),
    )?;

    let extraction = CommandExtractor::new(config.extraction.clone())
        .extract(file)
        .await;
    if extraction.text.trim().is_empty() {
        return Err(DocQaError::Ingestion(
            "Could not read document content".to_string(),
        ));
    }

    let chunks = chunker.chunk(&extraction.text);
    println!(
        "{} chunks (size {}, overlap {}){}",
        chunks.len(),
        chunker.chunk_size(),
        chunker.overlap(),
        if extraction.ocr_used { ", OCR used" } else { "" }
    );
    for chunk in chunks {
        println!("\n[{}] {}..{}", chunk.index, chunk.start, chunk.end);
        println!("{}", chunk.text);
    }

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| DocQaError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| DocQaError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
        ConfigAction::Path => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'docqa config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        return Ok(config);
    }

    Config::load(&path)
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| DocQaError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| DocQaError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
