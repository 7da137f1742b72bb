//! Command-line argument parsing for recruitrag
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::ArticleCategory;

/// recruitrag - hybrid retrieval over recruiting articles
#[derive(Parser, Debug)]
#[command(name = "recruitrag")]
#[command(version)]
#[command(about = "Hybrid vector + trigram retrieval with cross-encoder reranking", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -v (debug), -vv (trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Hybrid search, reranked when a reranker is available
    Search {
        query: String,

        /// Category filter (ANNOUNCEMENT, EVENT_REPORT, INTERVIEW, CULTURE)
        #[arg(short = 't', long = "type", value_parser = parse_category)]
        category: Option<ArticleCategory>,

        /// Skip reranking
        #[arg(long)]
        no_rerank: bool,

        /// Results kept after fusion
        #[arg(long)]
        search_k: Option<usize>,

        /// Results kept after reranking
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Only the vector or only the trigram search
        #[arg(long, value_enum)]
        only: Option<SingleMethod>,
    },

    /// Merge several query reformulations, reranked against the first
    Multi {
        #[arg(required = true)]
        queries: Vec<String>,

        #[arg(short = 't', long = "type", value_parser = parse_category)]
        category: Option<ArticleCategory>,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Retrieve the best matches from every category
    Types {
        query: String,

        /// Results per category
        #[arg(short = 'k', long)]
        per_type: Option<usize>,
    },

    /// Style profile and excerpts for a category
    Style {
        #[arg(value_parser = parse_category)]
        category: ArticleCategory,

        /// Theme for excerpt similarity
        theme: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Display current configuration
    Config {
        /// Write the effective configuration to the default path
        #[arg(long)]
        init: bool,
    },

    /// Run diagnostics against the configured services
    Doctor,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleMethod {
    Vector,
    Lexical,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Default tracing filter when RUST_LOG is unset
    pub fn filter_directive(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "recruitrag=debug,info",
            Verbosity::VeryVerbose => "recruitrag=trace,debug",
        }
    }

    /// Check if should show progress spinners
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}

fn parse_category(value: &str) -> Result<ArticleCategory, String> {
    value.parse().map_err(|e: crate::errors::RetrievalError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_with_category() {
        let args = Args::try_parse_from(["recruitrag", "search", "new grads", "--type", "event-report", "-k", "3"]).unwrap();
        match args.command {
            Commands::Search {
                query, category, top_k, ..
            } => {
                assert_eq!(query, "new grads");
                assert_eq!(category, Some(ArticleCategory::EventReport));
                assert_eq!(top_k, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_category_rejected() {
        assert!(Args::try_parse_from(["recruitrag", "search", "q", "--type", "PRESS"]).is_err());
    }

    #[test]
    fn test_multi_requires_queries() {
        assert!(Args::try_parse_from(["recruitrag", "multi"]).is_err());
        let args = Args::try_parse_from(["recruitrag", "multi", "a", "b"]).unwrap();
        assert!(matches!(args.command, Commands::Multi { ref queries, .. } if queries.len() == 2));
    }

    #[test]
    fn test_verbosity_levels() {
        let quiet = Args::try_parse_from(["recruitrag", "-q", "doctor"]).unwrap();
        assert_eq!(quiet.verbosity(), Verbosity::Quiet);

        let normal = Args::try_parse_from(["recruitrag", "doctor"]).unwrap();
        assert_eq!(normal.verbosity(), Verbosity::Normal);

        let very = Args::try_parse_from(["recruitrag", "doctor", "-vv"]).unwrap();
        assert_eq!(very.verbosity(), Verbosity::VeryVerbose);
        assert_eq!(very.verbosity().filter_directive(), "recruitrag=trace,debug");
    }
}
