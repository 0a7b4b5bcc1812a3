//! solmut - mutant generation for contract sources
//!
//! Subcommands:
//! - `iter-gen-mutations`: answer generation requests read line by line from stdin
//! - `apply`: replay a saved mutation sequence on a source file

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use solmut_cli::driver::{apply_sequence, open_session};
use solmut_cli::protocol::QUIT;
use solmut_cli::SolmutConfig;
use solmut_core::CancellationToken;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// solmut CLI
#[derive(Parser)]
#[command(name = "solmut")]
#[command(about = "solmut - mutant generation for smart-contract sources", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SOLMUT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "SOLMUT_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "SOLMUT_LOG_JSON", global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate mutants on request, one JSON request per stdin line
    IterGenMutations(GenerateArgs),

    /// Apply a saved mutation sequence and print the result
    Apply {
        /// Source file
        source: PathBuf,

        /// File holding the JSON mutation sequence
        mutation: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Source file to mutate
    source: PathBuf,

    /// Directory receiving the mutant files
    #[arg(long)]
    patched_src_dir: Option<PathBuf>,

    /// Longest mutation sequence to produce
    #[arg(long)]
    max_distance: Option<usize>,

    /// Enabled mutation kinds
    #[arg(long, value_delimiter = ',')]
    kinds: Option<Vec<String>>,

    /// Kinds every produced sequence must use
    #[arg(long, value_delimiter = ',')]
    must_include_mutation_types: Option<Vec<String>>,

    /// Node types offered for insertion and replacement
    #[arg(long, value_delimiter = ',')]
    new_node_types: Option<Vec<String>>,

    /// Node types that may be replaced
    #[arg(long, value_delimiter = ',')]
    replaceable_node_types: Option<Vec<String>>,

    /// Region specifier limiting where mutations happen
    #[arg(long)]
    mutation_space: Option<String>,

    /// Textual RNG seed
    #[arg(long)]
    seed: Option<String>,

    /// Keep mutants the compiler rejects
    #[arg(long)]
    allow_uncompilable: bool,

    /// Keep mutants whose bytecode matches an earlier one
    #[arg(long)]
    keep_same_bin: bool,

    /// Simplify empty if statements before writing
    #[arg(long)]
    simplify: bool,

    /// Also write `<n>.sol.mutation` files
    #[arg(long)]
    output_mutation: bool,

    /// Parser command
    #[arg(long)]
    parser: Option<String>,

    /// Printer command
    #[arg(long)]
    printer: Option<String>,

    /// Compiler command
    #[arg(long)]
    compiler: Option<String>,
}

impl GenerateArgs {
    /// Override configuration values with the flags that were given.
    fn apply_to(self, config: &mut SolmutConfig) {
        let engine = &mut config.engine;
        if let Some(max) = self.max_distance {
            engine.max_distance = Some(max);
        }
        if let Some(kinds) = self.kinds {
            engine.kinds = kinds;
        }
        if let Some(kinds) = self.must_include_mutation_types {
            engine.must_include = kinds;
        }
        if let Some(types) = self.new_node_types {
            engine.new_node_types = types;
        }
        if let Some(types) = self.replaceable_node_types {
            engine.replaceable_node_types = types;
        }
        if self.mutation_space.is_some() {
            engine.mutation_space = self.mutation_space;
        }
        if let Some(seed) = self.seed {
            engine.seed = seed;
        }
        if self.allow_uncompilable {
            engine.only_compilable = false;
        }
        if self.keep_same_bin {
            engine.skip_same_bin = false;
        }
        engine.simplify |= self.simplify;

        if self.patched_src_dir.is_some() {
            config.output.patched_src_dir = self.patched_src_dir;
        }
        config.output.output_mutation |= self.output_mutation;

        if self.parser.is_some() {
            config.tools.parser_cmd = self.parser;
        }
        if self.printer.is_some() {
            config.tools.printer_cmd = self.printer;
        }
        if let Some(compiler) = self.compiler {
            config.tools.compiler_cmd = compiler;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = SolmutConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    // Initialize tracing; stdout carries the protocol
    let level = cli.log_level.clone().unwrap_or_else(|| config.runtime.log_level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());

    if cli.json || config.runtime.log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Commands::IterGenMutations(args) => {
            let mut config = config;
            let source_path = args.source.clone();
            args.apply_to(&mut config);
            iter_gen_mutations(config, source_path).await
        }
        Commands::Apply {
            source,
            mutation,
            output,
        } => {
            let source = read(&source)?;
            let sequence = read(&mutation)?;
            let printed = apply_sequence(&config, &source, &sequence)?;
            match output {
                Some(path) => std::fs::write(&path, printed)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => print!("{}", printed),
            }
            Ok(())
        }
    }
}

fn read(path: &std::path::Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

async fn iter_gen_mutations(config: SolmutConfig, source_path: PathBuf) -> anyhow::Result<()> {
    let source = read(&source_path)?;
    let token = CancellationToken::new();
    watch_stop_signal(token.clone())?;

    let mut session =
        tokio::task::block_in_place(|| open_session(&config, &source, token)).context("failed to start session")?;
    info!(source = %source_path.display(), "waiting for requests");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == QUIT {
            break;
        }
        let response = tokio::task::block_in_place(|| session.handle_line(line))?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", response.to_line()).context("failed to write response")?;
        stdout.flush().context("failed to write response")?;
    }

    info!(written = session.written(), "session finished");
    Ok(())
}

/// Stop the running request, not the process, on SIGUSR2.
#[cfg(unix)]
fn watch_stop_signal(token: CancellationToken) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut stop = signal(SignalKind::user_defined2()).context("failed to install SIGUSR2 handler")?;
    tokio::spawn(async move {
        while stop.recv().await.is_some() {
            warn!("SIGUSR2 received, stopping the current request");
            token.cancel();
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn watch_stop_signal(_token: CancellationToken) -> anyhow::Result<()> {
    Ok(())
}
