use colored::Colorize;

use util::Timer;

use crate::settings::Settings;

/// All interactions with the text UI should go through this struct.
pub struct Ui {
    /// -v setting, displays extra text info to user
    pub verbose: bool,
    /// keeps track of time for each subject
    timer: Timer,
}

impl Ui {
    pub fn new(settings: &Settings) -> Self {
        Self {
            verbose: settings.verbose > 0,
            timer: Timer::now(),
        }
    }

    pub fn start_timer(&mut self) {
        if self.verbose {
            self.timer.reset();
        }
    }

    pub fn print_elapsed(&self, what: &str) {
        if self.verbose {
            eprintln!("{what} took {:.3}s", self.timer.elapsed().as_secs_f64());
        }
    }

    pub fn verbose_msg(&self, msg: &str) {
        if self.verbose {
            eprintln!("{}", msg);
        }
    }

    pub fn verbose_progress(&self, msg: &str) {
        if self.verbose {
            eprint!("{}... ", msg.magenta());
        }
    }

    pub fn done(&self) {
        if self.verbose {
            eprintln!("{}.", "done".green());
        }
    }

    /// Always shown.
    pub fn summary(&self, subject: &str, nodes: usize, sinks: usize, strategies: &[String]) {
        eprintln!(
            "{} {subject}: {nodes} nodes, {sinks} outputs, {} terminal strategies",
            "Built graph for".green(),
            strategies.len()
        );
        for label in strategies {
            self.verbose_msg(&format!("  {label}"));
        }
    }
}
