//! Morphline CLI - run record-transformation pipelines from the shell
//!
//! # Commands
//!
//! ```bash
//! morphline run pipeline.json --input app.log           # One record per line
//! morphline run pipeline.toml --mode attachment -i a.csv # One record per file
//! morphline check pipeline.json --id syslog              # Compile only
//! morphline commands --import 'morphline.stdlib.*'       # List commands
//! ```
//!
//! Emitted records are written as JSON lines. Logging goes to stderr and
//! is controlled with `RUST_LOG` (default `info`).

use std::fs;
use std::io::{self, BufRead, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use morphline::{
    compile_file, fields, registry, CliResult, Discard, Downstream, FaultPolicy, Morphline, MorphlineContext,
    Notification, Record, Registry, RuntimeError, RuntimeResult, Sink, Variables,
};

#[derive(Parser)]
#[command(name = "morphline")]
#[command(about = "Compile morphline configurations and stream records through them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a morphline and process input through it
    Run {
        /// Configuration file (.json, .conf or .toml)
        config: PathBuf,

        /// Morphline id (default: first in the file)
        #[arg(long)]
        id: Option<String>,

        /// Input files (default: stdin)
        #[arg(short, long, num_args = 1..)]
        input: Vec<PathBuf>,

        /// How input becomes records
        #[arg(short, long, value_enum, default_value_t = InputMode::Lines)]
        mode: InputMode,

        /// Output file for emitted records (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Log and skip records that raise a runtime fault instead of aborting
        #[arg(long)]
        keep_going: bool,

        /// Print the metrics snapshot to stderr when done
        #[arg(long)]
        metrics: bool,
    },

    /// Compile a morphline without running it
    Check {
        /// Configuration file (.json, .conf or .toml)
        config: PathBuf,

        /// Morphline id (default: first in the file)
        #[arg(long)]
        id: Option<String>,
    },

    /// List the commands visible under the given import patterns
    Commands {
        /// Import patterns, e.g. `morphline.stdlib.*` (default: everything)
        #[arg(long = "import")]
        imports: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputMode {
    /// One record per input line, in the `message` field
    Lines,
    /// One record per input, raw bytes in `_attachment_body`
    Attachment,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            id,
            input,
            mode,
            output,
            keep_going,
            metrics,
        } => cmd_run(&config, id.as_deref(), &input, mode, output.as_deref(), keep_going, metrics),

        Commands::Check { config, id } => cmd_check(&config, id.as_deref()),

        Commands::Commands { imports } => cmd_commands(imports),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "morphline failed");
        std::process::exit(1);
    }
}

// =============================================================================
// Output sink
// =============================================================================

/// Writes every emitted record as one JSON line.
struct JsonLinesSink {
    out: BufWriter<Box<dyn Write + Send>>,
    written: usize,
}

impl JsonLinesSink {
    fn open(path: Option<&Path>) -> io::Result<Self> {
        let out: Box<dyn Write + Send> = match path {
            Some(p) => Box::new(fs::File::create(p)?),
            None => Box::new(io::stdout()),
        };
        Ok(Self {
            out: BufWriter::new(out),
            written: 0,
        })
    }

    fn io_fault(e: impl std::fmt::Display) -> RuntimeError {
        RuntimeError::new("output", format!("Failed to write record: {}", e))
    }
}

impl Downstream for JsonLinesSink {
    fn forward(&mut self, record: Record) -> RuntimeResult<bool> {
        let line = serde_json::to_string(&record.to_json()).map_err(Self::io_fault)?;
        writeln!(self.out, "{}", line).map_err(Self::io_fault)?;
        self.written += 1;
        Ok(true)
    }
}

impl Sink for JsonLinesSink {
    fn notify(&mut self, notification: Notification) -> RuntimeResult<()> {
        match notification {
            Notification::CommitTransaction | Notification::Shutdown => {
                self.out.flush().map_err(Self::io_fault)?;
                if notification == Notification::Shutdown {
                    tracing::debug!(records = self.written, "output closed");
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

fn load(
    config: &Path,
    id: Option<&str>,
    sink: Box<dyn Sink>,
    context: MorphlineContext,
) -> CliResult<Morphline> {
    let variables = Variables::from_env();
    let morphline = compile_file(config, id, &variables, sink, Arc::new(context))?;
    tracing::info!(morphline = %morphline.id(), config = %config.display(), "compiled");
    Ok(morphline)
}

fn cmd_run(
    config: &Path,
    id: Option<&str>,
    inputs: &[PathBuf],
    mode: InputMode,
    output: Option<&Path>,
    keep_going: bool,
    print_metrics: bool,
) -> CliResult<()> {
    let policy = if keep_going {
        FaultPolicy::LogAndReject
    } else {
        FaultPolicy::Propagate
    };
    let sink = JsonLinesSink::open(output)?;
    let mut morphline = load(config, id, Box::new(sink), MorphlineContext::new().with_fault_policy(policy))?;

    morphline.start_session()?;
    let mut stats = RunStats::default();

    let outcome = if inputs.is_empty() {
        feed(&mut morphline, mode, "stdin", io::stdin().lock(), &mut stats)
    } else {
        inputs.iter().try_for_each(|path| {
            let file = io::BufReader::new(fs::File::open(path)?);
            feed(&mut morphline, mode, &path.display().to_string(), file, &mut stats)
        })
    };

    if let Err(e) = outcome {
        morphline.rollback()?;
        morphline.shutdown()?;
        return Err(e);
    }

    morphline.commit()?;
    morphline.shutdown()?;

    tracing::info!(
        processed = stats.processed,
        rejected = stats.rejected,
        "run complete"
    );

    if print_metrics {
        let snapshot = morphline.context().metrics().snapshot();
        eprintln!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    Ok(())
}

#[derive(Debug, Default)]
struct RunStats {
    processed: usize,
    rejected: usize,
}

fn feed(
    morphline: &mut Morphline,
    mode: InputMode,
    name: &str,
    mut reader: impl BufRead,
    stats: &mut RunStats,
) -> CliResult<()> {
    match mode {
        InputMode::Lines => {
            for line in reader.lines() {
                let mut record = Record::new();
                record.put(fields::MESSAGE, line?);
                submit(morphline, record, stats)?;
            }
        }
        InputMode::Attachment => {
            let mut body = Vec::new();
            reader.read_to_end(&mut body)?;
            let mut record = Record::new();
            record.put(fields::ATTACHMENT_BODY, body);
            record.put(fields::ATTACHMENT_NAME, name);
            submit(morphline, record, stats)?;
        }
    }
    Ok(())
}

fn submit(morphline: &mut Morphline, record: Record, stats: &mut RunStats) -> CliResult<()> {
    stats.processed += 1;
    if !morphline.process(record)? {
        stats.rejected += 1;
    }
    Ok(())
}

fn cmd_check(config: &Path, id: Option<&str>) -> CliResult<()> {
    let morphline = load(config, id, Box::new(Discard), MorphlineContext::new())?;
    println!("ok: morphline '{}'", morphline.id());
    Ok(())
}

fn cmd_commands(imports: Vec<String>) -> CliResult<()> {
    let specs = if imports.is_empty() {
        registry::default_imports()
    } else {
        imports
    };
    for (name, module) in Registry::global().list(&specs) {
        println!("{:<28} {}", name, module);
    }
    Ok(())
}
