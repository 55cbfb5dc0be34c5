use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use regen::{
    Bound, Flags, GroupKind, HostRandom, Node, NodeKind, ParallelConfig, Pattern, generate_batch,
};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "regen")]
#[command(about = "Generate and shrink strings matching java.util.regex patterns", long_about = None)]
#[command(version)]
struct Cli {
    /// Pattern flags as letters: i d m s u x l
    #[arg(short, long, default_value = "", global = true)]
    flags: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate strings matching a pattern
    Generate {
        /// The regular expression
        pattern: String,

        /// Seed of the first value (omit for entropy)
        #[arg(short, long, allow_hyphen_values = true)]
        seed: Option<i64>,

        /// Target length for unbounded repetitions
        #[arg(short, long, default_value_t = 32)]
        length: usize,

        /// Number of values, seeded consecutively
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Worker threads for seeded batches
        #[arg(short, long)]
        threads: Option<usize>,

        /// Print JSON instead of one value per line
        #[arg(long)]
        json: bool,
    },
    /// List shrink candidates for the value generated from a seed
    Shrink {
        /// The regular expression
        pattern: String,

        /// Seed that produced the failing value
        #[arg(short, long, allow_hyphen_values = true)]
        seed: i64,

        /// Target length the failing value was generated with
        #[arg(short, long, default_value_t = 32)]
        length: usize,

        /// Maximum number of candidates to print
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Print JSON instead of one candidate per line
        #[arg(long)]
        json: bool,
    },
    /// Show the minimum and maximum match length
    Bounds {
        /// The regular expression
        pattern: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the compiled tree of a pattern
    Ast {
        /// The regular expression
        pattern: String,
    },
}

#[derive(Serialize)]
struct GenerateOutput<'a> {
    pattern: &'a str,
    seed: Option<i64>,
    length: usize,
    values: Vec<String>,
}

#[derive(Serialize)]
struct ShrinkOutput<'a> {
    pattern: &'a str,
    seed: i64,
    failing: String,
    candidates: Vec<String>,
}

#[derive(Serialize)]
struct BoundsOutput<'a> {
    pattern: &'a str,
    min_length: usize,
    max_length: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let flags = Flags::from_letters(&cli.flags).context("Invalid --flags value")?;
    debug!(%flags, "parsed flags");

    match cli.command {
        Commands::Generate {
            pattern,
            seed,
            length,
            count,
            threads,
            json,
        } => generate_values(&compile(&pattern, flags)?, seed, length, count, threads, json),
        Commands::Shrink {
            pattern,
            seed,
            length,
            limit,
            json,
        } => shrink_value(&compile(&pattern, flags)?, seed, length, limit, json),
        Commands::Bounds { pattern, json } => show_bounds(&compile(&pattern, flags)?, json),
        Commands::Ast { pattern } => show_ast(&compile(&pattern, flags)?),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();
}

fn compile(pattern: &str, flags: Flags) -> Result<Pattern> {
    Pattern::compile(pattern, flags).context(format!("Failed to compile pattern '{}'", pattern))
}

fn generate_values(
    pattern: &Pattern,
    seed: Option<i64>,
    length: usize,
    count: usize,
    threads: Option<usize>,
    json: bool,
) -> Result<()> {
    let values = match seed {
        Some(seed) => {
            let seeds: Vec<i64> = (0..count as i64).map(|n| seed.wrapping_add(n)).collect();
            let config = match threads {
                Some(threads) => ParallelConfig::with_threads(threads),
                None => ParallelConfig::default(),
            };
            config.validate().context("Invalid --threads value")?;
            generate_batch(pattern, &seeds, Some(length), &config)
                .context("Failed to generate values")?
        }
        None => {
            let mut source = HostRandom::from_entropy();
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                let (value, next) = pattern
                    .generate_with(source, Some(length))
                    .context("Failed to generate value")?;
                values.push(value);
                source = next;
            }
            values
        }
    };

    if json {
        let output = GenerateOutput {
            pattern: pattern.source(),
            seed,
            length,
            values,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for value in &values {
            println!("{}", value);
        }
    }

    Ok(())
}

fn shrink_value(pattern: &Pattern, seed: i64, length: usize, limit: usize, json: bool) -> Result<()> {
    let failing = pattern
        .generate_sized(seed, length)
        .context("Failed to generate value")?;
    let candidates: Vec<String> = pattern.shrink(seed, &failing).take(limit).collect();

    if json {
        let output = ShrinkOutput {
            pattern: pattern.source(),
            seed,
            failing,
            candidates,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}: {}", "Failing".bold(), failing);
    if candidates.is_empty() {
        println!("{}", "No smaller candidates.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("{} candidate(s):", candidates.len()).bold()
    );
    for candidate in &candidates {
        println!(
            "  {} {} {}",
            "→".bright_black(),
            candidate,
            format!("(len {})", candidate.chars().count()).bright_black()
        );
    }

    Ok(())
}

fn show_bounds(pattern: &Pattern, json: bool) -> Result<()> {
    if json {
        let output = BoundsOutput {
            pattern: pattern.source(),
            min_length: pattern.min_length(),
            max_length: pattern.max_length().finite(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}: {}", "Min length".bold(), pattern.min_length());
    match pattern.max_length() {
        Bound::Finite(max) => println!("{}: {}", "Max length".bold(), max),
        Bound::Unbounded => println!("{}: {}", "Max length".bold(), "unbounded".cyan()),
    }

    Ok(())
}

fn show_ast(pattern: &Pattern) -> Result<()> {
    println!("{}: {}", "Rendered".bold(), pattern.root());
    println!();
    print_tree(pattern.root(), 0);
    Ok(())
}

fn print_tree(node: &Node, depth: usize) {
    let indent = "  ".repeat(depth);
    let lengths = format!("[{}, {}]", node.min_length(), node.max_length()).bright_black();
    match node.kind() {
        NodeKind::Empty => println!("{}{} {}", indent, "Empty".cyan(), lengths),
        NodeKind::Literal {
            text,
            case_insensitive,
        } => println!(
            "{}{} {:?}{} {}",
            indent,
            "Literal".cyan(),
            text,
            if *case_insensitive { " (?i)" } else { "" },
            lengths
        ),
        NodeKind::Class(set) => println!("{}{} {} {}", indent, "Class".cyan(), set, lengths),
        NodeKind::Concat(children) => {
            println!("{}{} {}", indent, "Concat".cyan(), lengths);
            for child in children {
                print_tree(child, depth + 1);
            }
        }
        NodeKind::Union(children) => {
            println!("{}{} {}", indent, "Union".cyan(), lengths);
            for child in children {
                print_tree(child, depth + 1);
            }
        }
        NodeKind::Quantified {
            inner,
            min,
            max,
            kind,
        } => {
            println!(
                "{}{} {{{}, {}}} {:?} {}",
                indent,
                "Quantified".cyan(),
                min,
                max,
                kind,
                lengths
            );
            print_tree(inner, depth + 1);
        }
        NodeKind::Group { kind, inner } => {
            let label = match kind {
                GroupKind::Capturing {
                    index,
                    name: Some(name),
                } => format!("Capturing #{} <{}>", index, name),
                GroupKind::Capturing { index, name: None } => format!("Capturing #{}", index),
                other => format!("{:?}", other),
            };
            println!("{}{} {} {}", indent, "Group".cyan(), label, lengths);
            print_tree(inner, depth + 1);
        }
        NodeKind::BackRef(id) => println!("{}{} {} {}", indent, "BackRef".cyan(), id, lengths),
    }
}
