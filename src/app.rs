use std::path::PathBuf;

use anyhow::{Context, Result};
use indexmap::IndexMap;

use workflow::error::Errors;

use crate::build::SubjectBuilder;
use crate::config::{self, PipelineConfig, Session};
use crate::fs::Fs;
use crate::settings::Settings;
use crate::steps::Catalog;
use crate::ui::Ui;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Subject \"{0}\" not found in data config")]
    SubjectNotFound(String),
    #[error("Data config lists no sessions")]
    NoSessions,
}

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// Filesystem interface
    fs: Fs,
    /// User interface
    ui: Ui,
}

impl App {
    /// Create a new `App`.
    pub fn new(settings: Settings) -> Self {
        let fs = Fs::new(&settings.output, settings.dry_run);
        let ui = Ui::new(&settings);
        Self { settings, fs, ui }
    }

    /// Build one graph per subject and write its manifest.
    /// A failing subject doesn't stop the others; all failures are reported at the end.
    pub fn run(mut self) -> Result<()> {
        if self.settings.verbose > 0 {
            eprintln!("Using output directory {:?}", self.settings.output);
        }
        self.fs.ensure_output_dir_exists(self.settings.verbose > 0)?;

        let config = self.load_config()?;
        let subjects = self.load_subjects()?;

        let mut errors = Errors::default();
        for (subject, sessions) in &subjects {
            self.ui.start_timer();
            if let Err(e) = self.build_subject(&config, subject, sessions) {
                errors.add_context(e, format!("while building graph for subject {subject}"));
            }
            self.ui.print_elapsed(&format!("Building graph for {subject}"));
        }
        errors.print_recap("building subject graphs")
    }

    fn load_config(&self) -> Result<PipelineConfig> {
        self.ui.verbose_progress("Reading pipeline config");
        let config = PipelineConfig::load(&self.settings.config)?;
        self.ui.done();
        log::debug!("pipeline config: {config:?}");
        Ok(config)
    }

    /// Sessions grouped by subject, filtered by `--subject` if given.
    fn load_subjects(&self) -> Result<IndexMap<String, Vec<Session>>> {
        self.ui.verbose_progress("Reading data config");
        let sessions = config::load_sessions(&self.settings.data_config)?;
        if sessions.is_empty() {
            return Err(Error::NoSessions.into());
        }
        let mut subjects = config::group_by_subject(sessions)?;
        self.ui.done();

        if !self.settings.subjects.is_empty() {
            for wanted in &self.settings.subjects {
                if !subjects.contains_key(wanted) {
                    return Err(Error::SubjectNotFound(wanted.clone()).into());
                }
            }
            subjects.retain(|subject, _| self.settings.subjects.contains(subject));
        }
        Ok(subjects)
    }

    fn build_subject(&self, config: &PipelineConfig, subject: &str, sessions: &[Session]) -> Result<()> {
        let built = SubjectBuilder::new(config, subject, sessions, Catalog).build()?;
        self.ui.summary(
            subject,
            built.graph.len(),
            built.connections.len(),
            &built.terminal_labels(),
        );

        if self.settings.dry_run {
            log::info!("dry run; not writing manifest for {subject}");
            return Ok(());
        }
        let text = serde_json::to_string_pretty(&built.manifest())?;
        let mut buf = PathBuf::with_capacity(256);
        self.fs.create_dir(self.fs.subject_dir(subject, &mut buf))?;
        self.fs
            .write_file(self.fs.manifest(subject, &mut buf), &text)
            .with_context(|| format!("while writing graph manifest for {subject}"))?;
        Ok(())
    }
}
