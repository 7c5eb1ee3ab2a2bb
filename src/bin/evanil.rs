//! EvaNIL CLI: build, inspect and evaluate the NIL-ancestor dataset.
//!
//! Usage:
//!   evanil build <kb> [--split N]
//!   evanil stats <kb>
//!   evanil baseline <kb|all>

use clap::{Parser, Subcommand};
use evanil::baseline::ALL_TARGETS;
use evanil::dataset::retrieve_annotations;
use evanil::{BaselineReport, CorpusStatistics, KnowledgeBase, Pipeline, PipelineConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "evanil",
    version,
    about = "Dataset builder for NIL entity linking against biomedical ontologies"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// YAML config file (default: <config dir>/evanil/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding kb_files/ and corpora/
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,
    /// Directory the dataset is written to
    #[arg(long, global = true)]
    output_root: Option<PathBuf>,
    /// Concurrent extraction workers
    #[arg(long, global = true)]
    workers: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and persist the train/dev/test partitions of a knowledge base
    Build {
        /// hp, medic, chebi, go_bp, ctd_chemicals or ctd_anatomy
        kb: KnowledgeBase,
        /// Build a single PBDMS split instead of all of them
        #[arg(long)]
        split: Option<u32>,
    },
    /// Print statistics over the persisted partitions of a knowledge base
    Stats {
        kb: KnowledgeBase,
    },
    /// Run the string-matching baseline over persisted test subsets
    Baseline {
        /// A knowledge base, or "all" for medic, ctd_anatomy and ctd_chemicals
        target: String,
    },
}

fn resolve_config(cli: &Cli) -> Result<PipelineConfig, String> {
    let mut config = PipelineConfig::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(ref root) = cli.data_root {
        config = config.with_data_root(root);
    }
    if let Some(ref root) = cli.output_root {
        config = config.with_output_root(root);
    }
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }
    Ok(config)
}

async fn cmd_build(pipeline: &Pipeline, kb: KnowledgeBase, split: Option<u32>) -> i32 {
    match pipeline.build(kb, split).await {
        Ok(reports) => {
            for report in reports {
                println!("-----------OUTPUT-----------");
                println!("{}", report);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_stats(pipeline: &Pipeline, kb: KnowledgeBase) -> i32 {
    let config = pipeline.config();
    match retrieve_annotations(&config.output_root, kb, None, config.pbdms_splits) {
        Ok(annotations) => {
            println!("{}", CorpusStatistics::compute(&annotations));
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_baseline(pipeline: &Pipeline, target: &str) -> i32 {
    let targets: Vec<KnowledgeBase> = if target == "all" {
        ALL_TARGETS.to_vec()
    } else {
        match target.parse() {
            Ok(kb) => vec![kb],
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    };

    let mut reports = Vec::with_capacity(targets.len());
    for kb in targets {
        match pipeline.run_baseline(kb).await {
            Ok(report) => {
                println!("------------");
                println!("{}", report);
                reports.push(report);
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    }

    if target == "all" {
        let global = BaselineReport::combine("global", &reports);
        println!("------------");
        println!("Total docs EvaNIL: {}", global.documents);
        println!("Accuracy (global): {:.2}", global.accuracy());
    }
    0
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };
    let pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let code = rt.block_on(async {
        match cli.command {
            Commands::Build { kb, split } => cmd_build(&pipeline, kb, split).await,
            Commands::Stats { kb } => cmd_stats(&pipeline, kb),
            Commands::Baseline { ref target } => cmd_baseline(&pipeline, target).await,
        }
    });
    std::process::exit(code);
}
