use anyhow::{Context, Result};

use workflow::{PersistenceSink, StepBackend, StrategySet};

use super::SubjectBuilder;

impl<B: StepBackend> SubjectBuilder<'_, B> {
    /// Connect every publishable resource of every strategy in `set` to the sink.
    /// Returns the number of connections made.
    pub fn route_outputs(&mut self, set: &StrategySet) -> Result<usize> {
        let publishable = self.config.publishable();
        let mut count = 0;
        for strategy in set {
            let label = strategy.label();
            let session = strategy.session().unwrap_or_default();
            for (resource, artifact) in strategy.pool().iter() {
                if !publishable.contains(&resource) {
                    continue;
                }
                let target = self.target(&label, session, resource);
                self.sink
                    .connect(target, artifact)
                    .with_context(|| format!("while persisting {resource} of strategy {label}"))?;
                count += 1;
            }
        }
        log::debug!("subject {}: routed {count} outputs from {}", self.subject, set.scope());
        Ok(count)
    }
}
