//! Teller - interactive banking chat in the terminal

use std::io::Write;
use std::sync::Arc;
use teller::config::Config;
use teller::console::{describe_functions, ConsoleSink};
use teller::conversation::Conversation;
use teller::db::Database;
use teller::functions::{Dispatcher, FunctionContext, FunctionRegistry};
use teller::ledger::Ledger;
use teller::llm::{GrokService, LlmService, LoggingService};
use teller::runtime::{DatabaseStorage, OutputSink, ServiceModelClient, TurnRunner};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with the chat on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teller=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Set GROK_API_KEY to your xAI API key and try again.");
            return Err(e.into());
        }
    };

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?.with_max_history(config.max_history);

    let context = FunctionContext::new(Ledger::seeded());
    let registry = FunctionRegistry::builtin(&context, &config.discovery)?;
    let dispatcher = Dispatcher::new(Arc::new(registry));

    let grok = GrokService::new(config.grok.clone())?;
    let service: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(grok)));
    let sink = Arc::new(ConsoleSink::new());
    let runner = TurnRunner::new(
        ServiceModelClient::new(service),
        dispatcher,
        DatabaseStorage::new(db),
        sink.clone(),
    )
    .with_auto_save(config.auto_save);

    let descriptors = runner.functions().descriptors();
    let names: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
    println!("Teller banking assistant ({})", config.grok.model);
    println!("Type 'exit' to quit, 'functions' to see available functions, 'new' to start over.");
    if config.auto_save {
        println!("Chat history is saved to {}", config.db_path.display());
    }
    println!("{} functions available: {}\n", names.len(), names.join(", "));

    let mut conversation = Conversation::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match line.trim() {
            "" => {}
            "exit" => break,
            "functions" => println!("\n{}", describe_functions(&descriptors)),
            "new" => {
                conversation = Conversation::new();
                println!("Started a new conversation.\n");
            }
            input => {
                let cancel = CancellationToken::new();
                sink.text("Teller: ");

                let turn = runner.run_turn(&mut conversation, input, &cancel);
                tokio::pin!(turn);
                let result = loop {
                    tokio::select! {
                        result = &mut turn => break result,
                        _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                            tracing::info!("Cancelling turn");
                            cancel.cancel();
                        }
                    }
                };

                sink.finish_line();
                println!();
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Turn rejected");
                    println!("{e}\n");
                }
            }
        }
    }

    println!("Chat session ended.");
    Ok(())
}
