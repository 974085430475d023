use clap::{ArgAction, Parser};

const CMD_NAME: &str = "sgraph";
const DEFAULT_CONFIG: &str = "pipeline.yml";
const DEFAULT_DATA_CONFIG: &str = "data.yml";
const DEFAULT_OUTPUT: &str = "graphs";

/// Stores our command-line args format.
#[derive(Parser)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    /// Pipeline configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    #[arg(env = "STRATAGRAPH_CONFIG")]
    pub config: String,

    /// Data configuration file listing every session
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_DATA_CONFIG)]
    #[arg(env = "STRATAGRAPH_DATA_CONFIG")]
    pub data_config: String,

    /// Directory graph manifests are written to
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_OUTPUT)]
    #[arg(env = "STRATAGRAPH_OUTPUT")]
    pub output: String,

    /// Only build graphs for these subjects
    #[arg(short, long = "subject", value_name = "SUBJECT")]
    pub subjects: Vec<String>,

    /// Print additional debugging info (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Dry run; build graphs but don't write anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}
