//! jcfg cli interface

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; jcfg ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    /// Configuration file to load
    #[clap(short = 'f', long = "file", global(true), default_value = "config.json")]
    pub file: PathBuf,

    #[clap(flatten)]
    pub load: LoadArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the fully resolved configuration
    Resolve(ResolveCommand),

    /// Print a single value by dotted key
    Get(GetCommand),

    /// Set a value in the configuration file
    ///
    /// The file is rewritten with the new value, variables and includes are kept as written.
    Set(SetCommand),

    /// List every resolved leaf by dotted key
    Vars,
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Rounds of recursive substitution
    #[clap(long = "max-depth", global(true), default_value_t = jcfg::substitute::DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// Do not derive full_* paths from the top level root
    #[clap(long = "no-root-join", global(true))]
    pub no_root_join: bool,

    /// Keep "#..." comment values in the output
    #[clap(long = "keep-comments", global(true))]
    pub keep_comments: bool,

    /// Fail when variables reference each other in a loop
    #[clap(long = "deny-cycles", global(true))]
    pub deny_cycles: bool,
}

impl From<&LoadArgs> for jcfg::LoadOptions {
    fn from(args: &LoadArgs) -> Self {
        let mut options = jcfg::LoadOptions::new();
        options.max_depth = args.max_depth;
        options.root_join = !args.no_root_join;
        options.drop_comments = !args.keep_comments;
        options.deny_cycles = args.deny_cycles;
        options
    }
}

#[derive(Parser, Debug)]
pub struct ResolveCommand {
    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct GetCommand {
    #[clap(flatten)]
    pub output: OutputArgs,

    /// Dotted key, e.g. model.layers[0].name
    pub key: String,
}

#[derive(Parser, Debug)]
pub struct SetCommand {
    /// Dotted key, e.g. model.name
    pub key: String,

    /// New value as json, plain text is stored as a string
    pub value: String,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}
