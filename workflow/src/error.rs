use anyhow::Result;
use colored::Colorize;

/// For re-throwing after the per-subject errors have been printed.
#[derive(Debug, thiserror::Error)]
#[error("{0} failed due to {1} errors")]
pub struct AggregatedErrors(pub String, pub usize);

/// Collects errors from independent units of work (e.g. one per subject)
/// so one failure doesn't hide the others.
pub struct Errors {
    errors: Vec<anyhow::Error>,
}

impl Default for Errors {
    fn default() -> Self {
        Self {
            // usually empty:
            errors: Vec::with_capacity(0),
        }
    }
}

impl Errors {
    pub fn add_context(&mut self, e: anyhow::Error, msg: String) {
        log::trace!("{msg}: {e:?}");
        self.errors.push(e.context(msg));
    }

    pub fn add(&mut self, e: anyhow::Error) {
        log::trace!("error: {e:?}");
        self.errors.push(e);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Print full list of errors to stderr, fail w/ an aggregated error
    /// if there were one or more errors.
    pub fn print_recap(&self, label: &str) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            eprintln!("\n{} {}:\n", "Encountered errors while".red(), label.red());
            for e in &self.errors {
                recap(e);
            }
            Err(AggregatedErrors(label.to_owned(), self.errors.len()).into())
        }
    }
}

fn recap(e: &anyhow::Error) {
    eprint!("{}: {}", "ERROR".red(), e);
    for cause in e.chain().skip(1) {
        eprint!("\nCaused by:\n\t{cause}");
    }
    eprintln!();
}
