//! CLI command definitions

use bitrelay_domain::ChecksumAlgorithm;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Checksum algorithm accepted on the command line
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum AlgorithmArg {
    #[default]
    Sha256,
    Sha512,
}

impl From<AlgorithmArg> for ChecksumAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Sha256 => ChecksumAlgorithm::Sha256,
            AlgorithmArg::Sha512 => ChecksumAlgorithm::Sha512,
        }
    }
}

/// CLI arguments for bitrelay
#[derive(Parser, Debug)]
#[command(name = "bitrelay")]
#[command(author, version, about = "Run file operations against a collection of contributors")]
#[command(long_about = r#"
bitrelay runs one operation against a collection of storage contributors.

Every operation has two rounds:
1. Identification: the request is broadcast and contributors say whether
   they can take part
2. Execution: the operation is sent to the selected contributors and their
   replies are collected

The collection is simulated in-process from the configured contributor list.
Use --seed to place local files at every contributor before the operation.

Configuration files are loaded from (in priority order):
1. BITRELAY_* environment variables (BITRELAY_TIMEOUTS__OPERATION_MS=...)
2. --config <path>     Explicit config file
3. ./bitrelay.toml     Project-level config
4. ~/.config/bitrelay/config.toml   Global config

Example:
  bitrelay put ./report.pdf
  bitrelay --seed ./report.pdf get --file-id report.pdf -o ./copy.pdf
  bitrelay --seed ./a.txt --seed ./b.txt checksums --algorithm sha512
  bitrelay --seed ./a.txt delete --file-id a.txt --contributor pillar-2
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Store a local file at every contributor before running (repeatable)
    #[arg(long, global = true, value_name = "PATH")]
    pub seed: Vec<PathBuf>,

    /// Print events as JSON lines instead of colored text
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Also write diagnostic logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store a local file at every contributor
    Put {
        /// File to store
        path: PathBuf,

        /// Id to store the file under (defaults to the file name)
        #[arg(long, value_name = "ID")]
        file_id: Option<String>,

        /// Algorithm for validation and returned checksums
        #[arg(long, value_enum, default_value_t)]
        algorithm: AlgorithmArg,
    },

    /// Fetch a file from the fastest (or a named) contributor
    Get {
        #[arg(long, value_name = "ID")]
        file_id: String,

        /// Fetch from this contributor only
        #[arg(long, value_name = "ID")]
        contributor: Option<String>,

        /// Write the fetched content here instead of reporting its size
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Delete a file at every (or a named) contributor
    Delete {
        #[arg(long, value_name = "ID")]
        file_id: String,

        #[arg(long, value_name = "ID")]
        contributor: Option<String>,
    },

    /// Replace a stored file with a local file
    Replace {
        /// File holding the new content
        path: PathBuf,

        #[arg(long, value_name = "ID")]
        file_id: String,

        /// Checksum of the file being replaced, hex encoded
        #[arg(long, value_name = "HEX")]
        existing_checksum: String,

        /// Algorithm of the existing checksum; also used for the new file
        #[arg(long, value_enum, default_value_t)]
        algorithm: AlgorithmArg,

        #[arg(long, value_name = "ID")]
        contributor: Option<String>,
    },

    /// List file ids
    List {
        /// Only report this file id
        #[arg(long, value_name = "ID")]
        file_id: Option<String>,

        /// Ask these contributors only (repeatable)
        #[arg(long, value_name = "ID")]
        contributor: Vec<String>,
    },

    /// Compute checksums of stored files
    Checksums {
        #[arg(long, value_name = "ID")]
        file_id: Option<String>,

        #[arg(long, value_enum, default_value_t)]
        algorithm: AlgorithmArg,

        #[arg(long, value_name = "ID")]
        contributor: Vec<String>,
    },

    /// Retrieve audit trails
    Audit {
        /// Skip events below this sequence number
        #[arg(long, value_name = "N")]
        min_sequence: Option<u64>,

        #[arg(long, value_name = "ID")]
        file_id: Option<String>,

        #[arg(long, value_name = "ID")]
        contributor: Vec<String>,
    },
}
