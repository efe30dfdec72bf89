//! sieve-dedup CLI - near-duplicate grouping for text records.

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use sieve_dedup::{
    read_jsonl, write_groups_jsonl, write_jsonl, DedupStats, DeduplicationIndex, Document,
    LshConfig, MinHashLSH, Shingling,
};
use std::io;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// JSON output for dedup results.
#[derive(Serialize)]
struct JsonOutput<'a> {
    input: String,
    output: Option<String>,
    config: &'a LshConfig,
    seed: u64,
    threshold: f64,
    #[serde(flatten)]
    stats: DedupStats,
    empty_records: usize,
    elapsed_secs: f64,
    throughput_docs_s: f64,
}

/// Shingling scheme selectable on the command line.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum ShingleKind {
    /// Character n-grams
    Char,
    /// Word n-grams
    Word,
    /// Single whitespace-separated words
    Whitespace,
}

/// Near-duplicate detection for text records.
///
/// Groups records whose estimated Jaccard similarity reaches the threshold,
/// using MinHash signatures and banded LSH. Reads JSON Lines.
#[derive(Parser, Debug)]
#[command(name = "sieve-dedup")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input JSONL file.
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output JSONL file.
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Field containing the text to deduplicate.
    #[arg(short = 'f', long, default_value = "text")]
    field: String,

    /// Similarity threshold (0.0-1.0). Records with similarity >= threshold are duplicates.
    #[arg(short, long, default_value = "0.49")]
    threshold: f64,

    /// Number of MinHash permutations.
    #[arg(short = 'p', long, default_value = "64")]
    permutations: usize,

    /// Number of LSH bands. Must divide the permutation count.
    #[arg(short = 'b', long, default_value = "16")]
    bands: usize,

    /// Shingling scheme.
    #[arg(long, value_enum, default_value = "char")]
    shingle: ShingleKind,

    /// N-gram size for char/word shingling.
    #[arg(short = 'n', long, default_value = "3")]
    ngram: usize,

    /// Permutation seed, for reproducible groupings.
    #[arg(long)]
    seed: Option<u64>,

    /// Write only the first record of each group instead of annotating all records.
    #[arg(long)]
    keep_first: bool,

    /// Print statistics only, don't write output.
    #[arg(long)]
    stats_only: bool,

    /// Output results as JSON.
    #[arg(long)]
    json: bool,

    /// Show progress spinner.
    #[arg(long)]
    progress: bool,

    /// Verbose output.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    fn shingling(&self) -> Shingling {
        match self.shingle {
            ShingleKind::Char => Shingling::CharNgram(self.ngram),
            ShingleKind::Word => Shingling::WordNgram(self.ngram),
            ShingleKind::Whitespace => Shingling::Whitespace,
        }
    }

    fn lsh_config(&self) -> LshConfig {
        let config = LshConfig::new(self.permutations, self.bands).with_shingling(self.shingling());
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}

/// Create a spinner for indeterminate progress.
fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        fail(e);
    }
}

fn run(args: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(Commands::Completions { shell }) = args.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "sieve-dedup", &mut io::stdout());
        return Ok(());
    }

    init_tracing(args.verbose);

    let input = args.input.clone().ok_or("Input file is required")?;

    if !(0.0..=1.0).contains(&args.threshold) {
        return Err("threshold must be between 0.0 and 1.0".into());
    }

    let config = args.lsh_config();
    config.validate()?;

    if !args.stats_only && args.output.is_none() {
        return Err("output file required (use -o/--output or --stats-only)".into());
    }

    if args.verbose && !args.json {
        eprintln!("Configuration:");
        eprintln!("  Input: {}", input.display());
        if let Some(ref output) = args.output {
            eprintln!("  Output: {}", output.display());
        }
        eprintln!("  Text field: {}", args.field);
        eprintln!("  Threshold: {}", args.threshold);
        eprintln!("  Permutations: {}", config.num_perm);
        eprintln!(
            "  Bands: {} x {} rows",
            config.num_bands,
            config.rows_per_band()
        );
        eprintln!("  Shingling: {:?}", config.shingling);
        eprintln!();
    }

    let start = Instant::now();
    let pb = (args.progress && !args.json).then(|| create_spinner("Reading input file..."));

    let docs: Vec<Document> = read_jsonl(&input, &args.field)?;

    if docs.is_empty() {
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        if !args.json {
            eprintln!("Warning: No documents found in input file");
        }
        return Ok(());
    }

    if let Some(ref pb) = pb {
        pb.set_message(format!("Indexing {} documents...", docs.len()));
    }

    let dedup_start = Instant::now();
    let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
    let lsh = MinHashLSH::with_config(&texts, &config)?;

    if let Some(ref pb) = pb {
        pb.set_message("Clustering duplicates...");
    }
    let dedup = DeduplicationIndex::new(&lsh, Some(args.threshold))?;
    let dedup_time = dedup_start.elapsed();

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let stats = dedup.stats();
    let throughput = stats.total as f64 / dedup_time.as_secs_f64().max(f64::EPSILON);

    if args.json {
        let output = JsonOutput {
            input: input.display().to_string(),
            output: args.output.as_ref().map(|p| p.display().to_string()),
            config: &config,
            seed: lsh.seed(),
            threshold: dedup.threshold(),
            stats: stats.clone(),
            empty_records: lsh.empty_records(),
            elapsed_secs: dedup_time.as_secs_f64(),
            throughput_docs_s: throughput,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        eprintln!("Total:\t{}", stats.total);
        eprintln!("Unique:\t{}", stats.unique);
        eprintln!("Diff:\t{}", stats.duplicates);
        eprintln!();
        eprintln!("  Duplicate ratio:   {:.2}%", stats.duplicate_ratio * 100.0);
        eprintln!("  Duplicate groups:  {}", dedup.duplicate_groups().count());
        eprintln!("  Largest group:     {}", stats.largest_group);
        if lsh.empty_records() > 0 {
            eprintln!("  Empty records:     {}", lsh.empty_records());
        }
        eprintln!("  Seed:              {}", lsh.seed());
        eprintln!(
            "Dedupe completed in {:.4} secs",
            dedup_time.as_secs_f64()
        );
    }

    if !args.stats_only {
        if let Some(output_path) = &args.output {
            if args.keep_first {
                let kept: Vec<Document> = dedup
                    .keep_indices()
                    .into_iter()
                    .map(|i| docs[i].clone())
                    .collect();
                write_jsonl(output_path, &kept)?;
            } else {
                write_groups_jsonl(output_path, &docs, &dedup)?;
            }

            if args.verbose && !args.json {
                eprintln!("Wrote output to {}", output_path.display());
            }
        }
    }

    if args.verbose && !args.json {
        eprintln!("Total time: {:.3}s", start.elapsed().as_secs_f64());
    }

    Ok(())
}
