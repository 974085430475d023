use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

use util::PathEncodingError;

/// Defines fns for creating common paths in the output directory
mod paths;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Specified output directory \"{0}\" is not a directory")]
    NotDirectory(String),
    #[error("Can't perform IO operation: \"{0}\" is not whitelisted")]
    NotWhitelisted(String),
}

/// All file writes in the crate should go through this struct.
///
/// Every write checks that the path in question is a child of the
/// single whitelisted prefix (the output dir), otherwise it is not performed.
#[derive(Debug)]
pub struct Fs {
    /// The directory we are allowed to modify
    output_prefix: PathBuf,
    /// if true, prevents all writes
    dry_run: bool,
}

impl Fs {
    /// Create a new `Fs` with the given output directory.
    pub fn new(output_prefix: &Path, dry_run: bool) -> Self {
        Self {
            output_prefix: output_prefix.to_path_buf(),
            dry_run,
        }
    }

    /// Check whether output dir exists, and create it if not.
    pub fn ensure_output_dir_exists(&mut self, verbose: bool) -> Result<()> {
        if !self.output_prefix.exists() {
            if self.dry_run {
                eprintln!("Dry run. Not creating output directory {:?}", self.output_prefix);
                return Ok(());
            }
            eprintln!("Output directory {:?} doesn't exist. Creating.", self.output_prefix);
            fs::create_dir_all(&self.output_prefix).context("creating output directory")?;
        } else if !self.output_prefix.is_dir() {
            return Err(Error::NotDirectory(
                self.output_prefix
                    .to_str()
                    .ok_or(PathEncodingError)?
                    .to_string(),
            )
            .into());
        } else if verbose {
            eprintln!("Output directory {:?} already exists. Not creating.", self.output_prefix);
        }

        self.output_prefix = self.output_prefix.canonicalize()?;
        Ok(())
    }

    /// Create a directory (uses `std::fs::create_dir_all`, so an entire tree of dirs can be created).
    pub fn create_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::create_dir_all(path).context("creating dir")?;
        Ok(())
    }

    /// Write entire str to a file.
    pub fn write_file<T: AsRef<Path>>(&self, path: T, text: &str) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::write(path, text).context("writing file")?;
        Ok(())
    }

    fn is_whitelisted<T: AsRef<Path>>(&self, path: T) -> bool {
        let path = path.as_ref();
        path.starts_with(&self.output_prefix)
            && !path.components().any(|c| c == Component::ParentDir)
    }

    fn check_whitelist(&self, path: &Path) -> Result<()> {
        if self.dry_run || !self.is_whitelisted(path) {
            Err(Error::NotWhitelisted(path.to_str().ok_or(PathEncodingError)?.to_owned()).into())
        } else {
            Ok(())
        }
    }
}
