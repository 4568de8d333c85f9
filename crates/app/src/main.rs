use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_chat_core::{
    load_documents, ChatSession, ChunkingConfig, GeminiBackend, GeminiConfig, Granularity,
    IndexCache, Presenter, SessionOptions, VectorIndex,
};
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Folder with the source documents (pdf, txt, md), read recursively.
    #[arg(long, default_value = "./documents")]
    data_dir: String,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", default_value = "")]
    api_key: String,

    /// Gemini API base URL.
    #[arg(long, default_value = "https://generativelanguage.googleapis.com")]
    endpoint: String,

    /// Generation model name.
    #[arg(long, default_value = "gemini-1.5-flash-latest")]
    model: String,

    /// Embedding model name.
    #[arg(long, default_value = "embedding-001")]
    embed_model: String,

    /// Passages retrieved per question.
    #[arg(long, default_value = "4")]
    top_k: usize,

    /// Maximum prompt context size, in characters.
    #[arg(long, default_value = "6000")]
    max_context_chars: usize,

    /// Most-recent exchanges carried into the prompt.
    #[arg(long, default_value = "6")]
    history_turns: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat over the indexed documents.
    Chat {
        /// Pause between displayed chunks, in milliseconds.
        #[arg(long, default_value = "150")]
        delay_ms: u64,

        /// Display granularity: sentence or character.
        #[arg(long, default_value = "sentence")]
        granularity: String,

        /// Greeting shown before the first question.
        #[arg(long, default_value = "Ask me a question about your documents!")]
        greeting: String,
    },
    /// Ask a single question and print the answer.
    Ask {
        /// The question.
        #[arg(long)]
        question: String,

        /// Print the retrieved sources under the answer.
        #[arg(long, default_value_t = false)]
        show_sources: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = GeminiConfig::new(cli.api_key.clone());
    config.endpoint = cli.endpoint.clone();
    config.generation_model = cli.model.clone();
    config.embedding_model = cli.embed_model.clone();

    // configuration problems are fatal here, before any session exists
    let backend =
        GeminiBackend::new(config).map_err(|error| anyhow::anyhow!(error.to_string()))?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-chat boot"
    );

    let options = SessionOptions {
        top_k: cli.top_k,
        max_context_chars: cli.max_context_chars,
        history_turns: cli.history_turns,
        greeting: None,
    };

    match cli.command {
        Command::Chat {
            delay_ms,
            granularity,
            greeting,
        } => {
            let granularity = parse_granularity(&granularity)?;
            let presenter = Presenter::new(granularity, Duration::from_millis(delay_ms));
            let options = SessionOptions {
                greeting: Some(greeting),
                ..options
            };
            run_chat(&cli.data_dir, backend, options, presenter, granularity).await?;
        }
        Command::Ask {
            question,
            show_sources,
        } => {
            run_ask(&cli.data_dir, backend, options, &question, show_sources).await?;
        }
    }

    Ok(())
}

fn parse_granularity(value: &str) -> anyhow::Result<Granularity> {
    match value {
        "sentence" => Ok(Granularity::Sentence),
        "character" | "char" => Ok(Granularity::Character),
        other => anyhow::bail!("unknown granularity {other:?}, expected sentence or character"),
    }
}

async fn run_chat(
    data_dir: &str,
    backend: GeminiBackend,
    options: SessionOptions,
    presenter: Presenter,
    granularity: Granularity,
) -> anyhow::Result<()> {
    let cache = IndexCache::new();
    let index = build_index(&cache, data_dir, backend.clone()).await?;
    let mut session = ChatSession::new(index, backend.clone(), options.clone());

    if let Some(greeting) = &options.greeting {
        println!("assistant> {greeting}");
    }
    println!("(commands: exit, quit, reload)");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }
        if input == "reload" {
            cache.invalidate().await;
            let index = build_index(&cache, data_dir, backend.clone()).await?;
            session = ChatSession::new(index, backend.clone(), options.clone());
            println!("index rebuilt, conversation reset");
            if let Some(greeting) = &options.greeting {
                println!("assistant> {greeting}");
            }
            continue;
        }

        match session.ask(input).await {
            Ok(turn) => {
                if let Some(failure) = &turn.failure {
                    warn!(session_id = %session.id(), error = %failure, "turn failed");
                }
                print!("assistant> ");
                stream_reply(&presenter, granularity, &turn.reply).await?;
            }
            Err(error) => warn!(error = %error, "question rejected"),
        }
    }

    Ok(())
}

async fn run_ask(
    data_dir: &str,
    backend: GeminiBackend,
    options: SessionOptions,
    question: &str,
    show_sources: bool,
) -> anyhow::Result<()> {
    let cache = IndexCache::new();
    let index = build_index(&cache, data_dir, backend.clone()).await?;
    let mut session = ChatSession::new(index, backend, options);

    let turn = session
        .ask(question)
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    if let Some(failure) = &turn.failure {
        warn!(session_id = %session.id(), error = %failure, "turn failed");
    }

    println!("{}", turn.reply);

    if show_sources {
        for passage in &turn.passages {
            println!(
                "[{}#{} score={:.4}]",
                passage.source_name, passage.chunk_index, passage.score
            );
        }
    }

    Ok(())
}

async fn build_index(
    cache: &IndexCache<GeminiBackend>,
    data_dir: &str,
    embedder: GeminiBackend,
) -> anyhow::Result<Arc<VectorIndex<GeminiBackend>>> {
    let folder = Path::new(data_dir);
    let report = load_documents(folder).map_err(|error| anyhow::anyhow!(error.to_string()))?;

    if !report.skipped.is_empty() {
        warn!(
            skipped = report.skipped.len(),
            folder = %folder.display(),
            "some files were not loaded"
        );
        for skipped in &report.skipped {
            warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
        }
    }

    info!(
        folder = %folder.display(),
        document_count = report.documents.len(),
        "building index"
    );

    let documents = report.documents;
    let index = cache
        .get_or_build(|| async move {
            VectorIndex::build(&documents, embedder, &ChunkingConfig::default()).await
        })
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    info!(passage_count = index.len(), "index ready");
    Ok(index)
}

async fn stream_reply(
    presenter: &Presenter,
    granularity: Granularity,
    reply: &str,
) -> anyhow::Result<()> {
    let mut stream = presenter.stream(reply);
    let mut first = true;

    while let Some(chunk) = stream.next().await {
        if granularity == Granularity::Sentence && !first {
            print!(" ");
        }
        print!("{}", chunk.text);
        std::io::stdout().flush()?;
        first = false;
    }

    println!();
    Ok(())
}
