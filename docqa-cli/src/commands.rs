use std::path::Path;

use anyhow::{Context, Result};
use docqa_extract::Upload;
use docqa_session::{
    DocumentSession, LoadOutcome, SessionPhase, namespace_collections, purge_namespace,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use docqa_rag::VectorStore;
use tracing::info;

use crate::cli::{Cli, Commands, GlobalOpts};
use crate::setup;

const EXAMPLE_QUESTIONS: [&str; 3] = [
    "What are the total expenses for Q2 2023?",
    "Show the operating margin for the past 6 months",
    "Compare revenue growth between different quarters",
];

/// Execute a parsed command line.
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Chat { file } => chat(&cli.opts, &file).await,
        Commands::Ask { file, question } => ask(&cli.opts, &file, &question).await,
        Commands::Collections => collections(&cli.opts).await,
        Commands::Purge { all } => purge(&cli.opts, all).await,
    }
}

async fn open_document(opts: &GlobalOpts, file: &Path) -> Result<DocumentSession> {
    let upload = Upload::from_path(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))?;
    let mut session = setup::build_session(opts, &upload).await?;

    let mut phases = session.subscribe();
    let status = tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            if let SessionPhase::Ingesting { file_name } = &*phases.borrow_and_update() {
                eprintln!("⏳ Processing {file_name}...");
            }
        }
    });
    let loaded = session.load_document(upload).await;
    status.abort();

    match loaded {
        Ok(LoadOutcome::Ingested { chunks }) => {
            eprintln!("✅ Document processed successfully! ({chunks} chunks)");
        }
        Ok(LoadOutcome::Reattached { .. } | LoadOutcome::Unchanged) => {
            eprintln!("ℹ️  Document already processed. Ready for questions!");
        }
        Err(e) => {
            anyhow::bail!("{}", e.user_message());
        }
    }
    Ok(session)
}

async fn chat(opts: &GlobalOpts, file: &Path) -> Result<()> {
    let mut session = open_document(opts, file).await?;

    println!("💼 Financial Document Assistant");
    println!("Ask detailed questions about the document, for example:");
    for question in EXAMPLE_QUESTIONS {
        println!("  - \"{question}\"");
    }
    println!("Type 'exit' or press Ctrl-D to quit.\n");

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("❓ ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if matches!(line, "exit" | "quit") {
                    break;
                }
                editor.add_history_entry(line)?;
                match session.ask(line).await {
                    Ok(answer) => println!("\n{}\n", answer.text),
                    Err(e) => eprintln!("❌ {}", e.user_message()),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    info!(turns = session.history().len(), "chat ended");
    session.close().await?;
    Ok(())
}

async fn ask(opts: &GlobalOpts, file: &Path, question: &str) -> Result<()> {
    let mut session = open_document(opts, file).await?;
    let result = session.ask(question).await;
    session.close().await?;
    match result {
        Ok(answer) => {
            println!("{}", answer.text);
            Ok(())
        }
        Err(e) => anyhow::bail!("{}", e.user_message()),
    }
}

async fn collections(opts: &GlobalOpts) -> Result<()> {
    let store = setup::open_store(opts).await?;
    let owned = namespace_collections(store.as_ref(), &setup::session_config(opts)).await?;
    if owned.is_empty() {
        println!("No collections in namespace '{}'.", opts.namespace);
        return Ok(());
    }
    for (name, count) in owned {
        println!("{name}\t{count} chunks");
    }
    Ok(())
}

async fn purge(opts: &GlobalOpts, all: bool) -> Result<()> {
    let store = setup::open_file_store(opts).await?;
    let config = setup::session_config(opts);
    let mut removed = if all {
        let names = store.list_collections().await?;
        for name in &names {
            store.delete_collection(name).await?;
        }
        names.len()
    } else {
        purge_namespace(&store, &config).await?
    };

    for name in store.unreadable_collections().await {
        if all || config.owns(&name) {
            store.delete_collection(&name).await?;
            removed += 1;
        }
    }
    println!("Removed {removed} collection(s).");
    Ok(())
}
