use anyhow::Result;
use serde::Serialize;

use workflow::{Graph, GraphDescription, Registrar, StepBackend, StrategySet};

use crate::config::{PipelineConfig, Session};

/// Session seeding and skull stripping
mod anat;
/// Family aggregation into a subject-specific template
mod longitudinal;
/// Persisting publishable resources
mod outputs;
/// Standard-space registration of a template
mod registration;
/// Data sink connection records
mod sink;
/// Resampled reference templates
mod templates;

pub use longitudinal::Aggregate;
pub use sink::{Connection, DataSink};
use templates::Templates;

/// Explicit state for building one subject's graph.
///
/// Holds everything the stages write to: the registrar (and through it the
/// graph) and the data sink. Nothing is shared between subjects.
pub struct SubjectBuilder<'a, B> {
    config: &'a PipelineConfig,
    subject: &'a str,
    sessions: &'a [Session],
    registrar: Registrar<B>,
    sink: DataSink,
    /// Created on first use, once per subject.
    templates: Option<Templates>,
}

impl<'a, B: StepBackend> SubjectBuilder<'a, B> {
    pub fn new(config: &'a PipelineConfig, subject: &'a str, sessions: &'a [Session], backend: B) -> Self {
        Self {
            config,
            subject,
            sessions,
            registrar: Registrar::new(backend),
            sink: DataSink::new(config),
            templates: None,
        }
    }

    #[inline]
    pub fn graph(&self) -> &Graph {
        self.registrar.graph()
    }

    #[inline]
    pub fn sink(&self) -> &DataSink {
        &self.sink
    }

    /// Build every stage for this subject.
    pub fn build(mut self) -> Result<SubjectGraph> {
        log::info!("building graph for subject {}", self.subject);
        let preprocessing = self.preprocess()?;
        self.route_outputs(&preprocessing)?;

        let mut registration = Vec::with_capacity(preprocessing.len());
        for family in preprocessing.families() {
            let aggregate = self.aggregate(&family)?;
            let terminal = self.register_to_standard(aggregate.seed)?;
            self.route_outputs(&terminal)?;
            registration.push(terminal);
        }

        Ok(SubjectGraph {
            subject: self.subject.to_owned(),
            graph: self.registrar.into_graph(),
            connections: self.sink.into_connections(),
            preprocessing,
            registration,
        })
    }
}

/// A finished subject graph, plus the strategy sets it was built from.
#[derive(Debug)]
pub struct SubjectGraph {
    pub subject: String,
    pub graph: Graph,
    pub connections: Vec<Connection>,
    /// Per-session strategies after skull stripping.
    pub preprocessing: StrategySet,
    /// One set of standard-space strategies per family.
    pub registration: Vec<StrategySet>,
}

impl SubjectGraph {
    /// Serializable manifest for an external executor.
    pub fn manifest(&self) -> Manifest<'_> {
        Manifest {
            subject: &self.subject,
            graph: self.graph.description(),
            sinks: &self.connections,
        }
    }

    /// Every terminal strategy label, in build order.
    pub fn terminal_labels(&self) -> Vec<String> {
        self.registration.iter().flat_map(StrategySet::labels).collect()
    }
}

#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    pub subject: &'a str,
    #[serde(flatten)]
    pub graph: GraphDescription<'a>,
    pub sinks: &'a [Connection],
}
