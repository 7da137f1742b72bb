//! recruitrag - retrieval diagnostics CLI

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use recruitrag::{
    cli::{Args, Commands, SingleMethod, Verbosity},
    config::RetrievalConfig,
    doctor::Doctor,
    embedding,
    retriever::{ArticleRetriever, RetrieveOptions, StyleProfileRetriever},
    search::HybridSearcher,
    store::QdrantStore,
    telemetry::TelemetryCollector,
    types::{ArticleCategory, ScoredDocument},
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbosity());

    let config = RetrievalConfig::load(args.config.clone()).context("Failed to load configuration")?;
    let telemetry = TelemetryCollector::new();

    match &args.command {
        Commands::Search {
            query,
            category,
            no_rerank,
            search_k,
            top_k,
            only,
        } => {
            let results = match only {
                Some(method) => {
                    let searcher = HybridSearcher::from_config(&config, Some(telemetry.clone()))?;
                    match method {
                        SingleMethod::Vector => searcher.vector_search_only(query, *category, *top_k).await?,
                        SingleMethod::Lexical => {
                            searcher.fulltext_search_only(query, *category, *top_k, None).await?
                        }
                    }
                }
                None => {
                    let retriever = load_retriever(&args, &config, &telemetry)?;
                    let options = RetrieveOptions {
                        use_reranker: !no_rerank,
                        search_k: *search_k,
                        rerank_top_k: *top_k,
                    };
                    retriever.retrieve(query, *category, options).await?
                }
            };
            print_results(&args, &results)?;
        }
        Commands::Multi {
            queries,
            category,
            top_k,
        } => {
            let retriever = load_retriever(&args, &config, &telemetry)?;
            let results = retriever.retrieve_multi_query(queries, *category, *top_k).await?;
            print_results(&args, &results)?;
        }
        Commands::Types { query, per_type } => {
            let retriever = load_retriever(&args, &config, &telemetry)?;
            let by_type = retriever.retrieve_all_types(query, *per_type).await?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&by_type)?);
            } else {
                for (category, results) in &by_type {
                    println!("{}", format!("== {} ==", category).bold());
                    print_results(&args, results)?;
                }
            }
        }
        Commands::Style { category, theme, top_k } => {
            run_style(&args, &config, *category, theme, *top_k).await?;
        }
        Commands::Config { init } => {
            show_config(&config, *init)?;
        }
        Commands::Doctor => {
            let checks = Doctor::new(config).run_diagnostics().await;
            Doctor::display_results(&checks);
            std::process::exit(if Doctor::overall_status(&checks) { 0 } else { 1 });
        }
    }

    if matches!(args.verbosity(), Verbosity::Verbose | Verbosity::VeryVerbose) {
        let stats = telemetry.stats();
        eprintln!(
            "{} searches={} reranks={} skipped={} timeouts={} embedding_failures={} reconnects={}",
            "stats".dimmed(),
            stats.searches,
            stats.reranks_applied,
            stats.reranks_skipped,
            stats.rerank_timeouts,
            stats.embedding_failures,
            stats.reconnects,
        );
    }

    Ok(())
}

fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn spinner(args: &Args, message: &str) -> Option<ProgressBar> {
    if !args.verbosity().show_progress() || args.json {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Build the facade; the reranker load can take a while on first run
fn load_retriever(args: &Args, config: &RetrievalConfig, telemetry: &TelemetryCollector) -> Result<ArticleRetriever> {
    let pb = spinner(args, "Loading retrieval models...");
    let retriever = ArticleRetriever::from_config(config, Some(telemetry.clone()));
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let retriever = retriever?;
    if !retriever.has_reranker() && config.reranker.enabled && !args.json {
        eprintln!("{}: reranker unavailable, results keep fused order", "Warning".yellow());
    }
    Ok(retriever)
}

async fn run_style(
    args: &Args,
    config: &RetrievalConfig,
    category: ArticleCategory,
    theme: &str,
    top_k: Option<usize>,
) -> Result<()> {
    let pb = spinner(args, "Loading style retriever...");
    let store = QdrantStore::connect(&config.store).await;
    let embedder = embedding::from_config(&config.embedding);
    let reranker = recruitrag::rerank::Reranker::load_or_noop(&config.reranker, None);
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let retriever = StyleProfileRetriever::new(Arc::new(store?), embedder?, Arc::new(reranker));
    let (profile, excerpts) = retriever.retrieve_all(theme, category, top_k).await;

    if args.json {
        let value = serde_json::json!({
            "category": category,
            "profile": profile,
            "excerpts": excerpts,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", format!("Style profile ({})", category).bold());
    match profile {
        Some(profile) => println!("{}\n", profile),
        None => println!("{}\n", "(none)".dimmed()),
    }

    println!("{}", "Excerpts".bold());
    if excerpts.is_empty() {
        println!("{}", "(none)".dimmed());
    }
    for (i, excerpt) in excerpts.iter().enumerate() {
        println!("{:>2}. {}", i + 1, excerpt);
    }
    Ok(())
}

fn print_results(args: &Args, results: &[ScoredDocument]) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("{}", "No documents found".dimmed());
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let doc = &result.document;
        let id = doc.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
        let sources: Vec<String> = result
            .matched_sources
            .iter()
            .map(|s| format!("{:?}", s).to_lowercase())
            .collect();

        let mut header = format!(
            "{:>2}. [{}] id={} score={:.4}",
            i + 1,
            doc.category.to_string().cyan(),
            id,
            result.score
        );
        if let Some(rerank) = result.rerank {
            header.push_str(&format!(" rerank={:.3} (raw {:.3})", rerank.normalized, rerank.raw));
        }
        if !sources.is_empty() {
            header.push_str(&format!(" via {}", sources.join("+")));
        }
        println!("{}", header);

        if !doc.source_file.is_empty() {
            println!(
                "    {}",
                format!("{} [{}/{}]", doc.source_file, doc.chunk_index + 1, doc.total_chunks).dimmed()
            );
        }
        println!("    {}", preview(&doc.content, 160));
    }
    println!();
    Ok(())
}

fn preview(content: &str, max_chars: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

fn show_config(config: &RetrievalConfig, init: bool) -> Result<()> {
    if init {
        let path = RetrievalConfig::default_path().context("Cannot determine home directory")?;
        config.save(&path)?;
        println!("{} {}", "Wrote".green(), path.display());
        return Ok(());
    }

    println!("{}", "recruitrag configuration".bold());
    match RetrievalConfig::default_path() {
        Some(path) if path.exists() => println!("  source: {}\n", path.display()),
        _ => println!("  source: built-in defaults\n"),
    }
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
