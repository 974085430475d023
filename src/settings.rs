use std::path::PathBuf;

use crate::args::Args;
use anyhow::Result;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0} file doesn't exist: {1:?}")]
    FileNotFound(&'static str, PathBuf),
}

/// Settings are like Args, except all the logic has
/// been applied so e.g. paths are checked and canonicalized.
#[derive(Debug)]
pub struct Settings {
    pub config: PathBuf,
    pub data_config: PathBuf,
    pub output: PathBuf,
    pub subjects: Vec<String>,
    pub verbose: u8,
    pub dry_run: bool,
}

fn existing(kind: &'static str, path: &str) -> Result<PathBuf> {
    let path = PathBuf::from(path);
    if path.exists() {
        Ok(path.canonicalize()?)
    } else {
        Err(Error::FileNotFound(kind, path).into())
    }
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        Ok(Self {
            config: existing("Pipeline config", &args.config)?,
            data_config: existing("Data config", &args.data_config)?,
            output: PathBuf::from(&args.output),
            subjects: args.subjects,
            verbose: args.verbose,
            dry_run: args.dry_run,
        })
    }
}
