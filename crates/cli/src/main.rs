// splitbill CLI - receipt extraction and proportional bill splitting

mod backends;
mod exit_codes;
mod extract;
mod split;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use splitbill_config::Settings;
use splitbill_engine::LedgerError;
use splitbill_extract::ExtractError;
use splitbill_io::IoError;

use exit_codes::{
    extract_exit_code, ledger_exit_code, EXIT_CONFIGURATION, EXIT_ERROR, EXIT_IO, EXIT_SUCCESS,
    EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "splitbill")]
#[command(about = "Read receipts and split the bill in proportion to what each person had")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Settings file (default: <config dir>/splitbill/settings.json)
    #[arg(long, global = true, env = "SPLITBILL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug logging on stderr (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a receipt from a photo with an inference backend
    #[command(after_help = "\
Prints the receipt as an items table (id,name,count,total_price) or, with
--json, as a receipt document. A summary goes to stderr.

Examples:
  splitbill extract receipt.jpg
  splitbill extract receipt.jpg --backend tesseract --out items.csv
  splitbill extract receipt.jpg --json --out receipt.json
  splitbill extract receipt.jpg --backend donut --save-raw raw.txt")]
    Extract {
        /// Receipt image
        image: PathBuf,

        /// Backend (gemini, donut, moondream, tesseract); defaults to settings
        #[arg(long, short = 'b')]
        backend: Option<String>,

        /// Output file (omit for stdout)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Receipt JSON document instead of the items table
        #[arg(long)]
        json: bool,

        /// Keep the backend output here when it cannot be decoded
        #[arg(long, value_name = "FILE")]
        save_raw: Option<PathBuf>,
    },

    /// Decode saved backend output into a receipt
    #[command(after_help = "\
Formats:
  cord   Donut token markup (<s_menu><s_nm>...)
  json   language-model reply, optionally fenced or wrapped in prose
  tsv    tesseract TSV (tesseract <image> stdout tsv)

Examples:
  splitbill decode donut.txt --format cord
  splitbill decode reply.txt --format json --json
  splitbill decode words.tsv --format tsv --line-threshold 20 -o items.csv")]
    Decode {
        /// File holding the raw backend output
        input: PathBuf,

        /// Dialect of the raw output
        #[arg(long, short = 'f')]
        format: RawFormat,

        /// Vertical distance (0-1000 scale) that still joins OCR words into one line
        #[arg(long)]
        line_threshold: Option<i32>,

        /// Output file (omit for stdout)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Receipt JSON document instead of the items table
        #[arg(long)]
        json: bool,
    },

    /// Split a receipt between participants
    #[command(after_help = "\
The assignments table has columns participant,item,count. An item is named
as on the receipt, or by position as #1, #2, ... A blank count claims one
unit. Participants appear in order of first mention; --participant adds
people who claimed nothing.

--out writes the participant summary table, or the report JSON document
when the file name ends in .json.

Examples:
  splitbill split --items items.csv --total 35.000 --assign claims.csv
  splitbill split --receipt receipt.json --assign claims.csv --json
  splitbill split --receipt receipt.json --assign claims.csv --participant Carol -o split.csv")]
    Split {
        /// Items table (id,name,count,total_price)
        #[arg(long, required_unless_present = "receipt", requires = "total")]
        items: Option<PathBuf>,

        /// Receipt total, for --items
        #[arg(long, requires = "items")]
        total: Option<String>,

        /// Receipt JSON document
        #[arg(long, conflicts_with_all = ["items", "total"])]
        receipt: Option<PathBuf>,

        /// Assignments table (participant,item,count)
        #[arg(long, short = 'a')]
        assign: PathBuf,

        /// Participant without claims (repeatable)
        #[arg(long, value_name = "NAME")]
        participant: Vec<String>,

        /// Report JSON document on stdout
        #[arg(long)]
        json: bool,

        /// Also write the report to a file
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Show which backends are configured and ready
    #[command(after_help = "\
Exits 10 when the backend selected in settings is not ready.

Examples:
  splitbill backends
  splitbill backends --json")]
    Backends {
        /// Machine-readable output
        #[arg(long)]
        json: bool,
    },

    /// Store a backend API key in the system keychain (key read from stdin)
    #[command(after_help = "\
Needs a build with the `keychain` feature. Without it, set the environment
variable shown by `splitbill backends` instead.

Examples:
  echo \"$GEMINI_KEY\" | splitbill set-key gemini")]
    SetKey {
        /// Backend the key belongs to
        backend: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RawFormat {
    Cord,
    Json,
    Tsv,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        "\nengine:  splitbill-engine ",
        env!("CARGO_PKG_VERSION"),
        "\nreport_format_version: 1",
    )
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // try_init also installs the log bridge for the library crates
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_settings(path: Option<&Path>) -> Settings {
    match path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Extract { image, backend, out, json, save_raw } => {
            extract::cmd_extract(&load_settings(config), image, backend, out, json, save_raw)
        }
        Commands::Decode { input, format, line_threshold, out, json } => {
            extract::cmd_decode(&load_settings(config), input, format, line_threshold, out, json)
        }
        Commands::Split { items, total, receipt, assign, participant, json, out } => {
            split::cmd_split(items, total, receipt, assign, participant, json, out)
        }
        Commands::Backends { json } => backends::cmd_backends(&load_settings(config), config, json),
        Commands::SetKey { backend } => backends::cmd_set_key(&backend),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::new(EXIT_CONFIGURATION, msg)
    }

    /// File errors are I/O, everything else is malformed input.
    pub fn from_io_error(err: IoError, context: &Path) -> Self {
        let code = match err {
            IoError::Io(_) => EXIT_IO,
            _ => EXIT_USAGE,
        };
        Self::new(code, format!("{}: {err}", context.display()))
    }

    pub fn extract(err: ExtractError) -> Self {
        let hint = err
            .is_configuration()
            .then(|| "run `splitbill backends` to see what is missing".to_string());
        Self { code: extract_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn ledger(err: LedgerError) -> Self {
        Self::new(ledger_exit_code(&err), err.to_string())
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Write `content` to `out`, or stdout when there is no file.
pub(crate) fn emit(content: &str, out: Option<&Path>) -> Result<(), CliError> {
    match out {
        Some(path) => {
            std::fs::write(path, content)
                .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
            eprintln!("wrote {}", path.display());
        }
        None => {
            print!("{content}");
            if !content.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}
