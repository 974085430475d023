use anyhow::{Context, Result};

use workflow::{
    ArtifactRef, Error, Family, PersistenceSink, SinkTarget, StepBackend, StepCall, StepKind,
    Strategy, StrategySet,
};

use super::SubjectBuilder;
use crate::steps::{MERGE_INPUT, WARP_LIST};

/// Result of aggregating one family.
#[derive(Debug)]
pub struct Aggregate {
    pub template: ArtifactRef,
    /// One warp per input session, in session order.
    pub warps: Vec<ArtifactRef>,
    /// Registration set seeded with the template.
    pub seed: StrategySet,
}

impl<B: StepBackend> SubjectBuilder<'_, B> {
    /// Merge a family's skull-stripped brains into one subject-specific template.
    pub fn aggregate(&mut self, family: &Family<'_>) -> Result<Aggregate> {
        self.try_aggregate(family)
            .with_context(|| format!("while aggregating family {} of subject {}", family.label, self.subject))
    }

    fn try_aggregate(&mut self, family: &Family<'_>) -> Result<Aggregate> {
        let Some(first) = family.strategies.first() else {
            return Err(Error::EmptyFamily(family.label.clone()).into());
        };
        let scope = format!("{}_{}", family.label, self.subject);

        // input order is session order; the template depends on it:
        let mut merge = StepCall::new(StepKind::LongitudinalMerge, format!("anat_longitudinal_merge_{scope}"));
        for (i, strategy) in family.strategies.iter().enumerate() {
            let brain = strategy.get("anatomical_brain")?;
            merge = merge.artifact(&format!("{MERGE_INPUT}{}", i + 1), brain);
        }
        let merged = self.registrar.register_shared(merge)?.output("out")?;

        let c = self.config;
        let call = StepCall::new(StepKind::LongitudinalTemplate, format!("subject_specific_template_{scope}"))
            .artifact("img_list", merged)
            .param("avg_method", c.long_reg_avg_method.as_str())
            .param("dof", i64::from(c.dof))
            .param("interp", c.interp.as_str())
            .param("cost", c.cost.as_str())
            .param("convergence_threshold", c.convergence_threshold)
            .param("thread_pool", i64::from(c.thread_pool))
            .param("num_images", family.len() as i64);
        let node = self.registrar.register_shared(call)?;
        let template = node.output("template")?;
        let warps: Vec<ArtifactRef> = node.outputs_with_prefix(WARP_LIST).collect();
        if warps.len() != family.len() {
            return Err(Error::AggregationLengthMismatch {
                expected: family.len(),
                actual: warps.len(),
            }
            .into());
        }
        log::info!(
            "subject {}: aggregated {} sessions of family {}",
            self.subject,
            family.len(),
            family.label
        );

        let target = self.target(&family.label, "", "anat_longitudinal_template");
        self.sink.connect(target, template)?;
        for (strategy, warp) in family.strategies.iter().zip(&warps) {
            let session = strategy.session().unwrap_or_default();
            let target = self.target(&family.label, session, "subject_to_longitudinal_template_warp");
            self.sink.connect(target, *warp)?;
        }

        let templates = self.templates()?;
        let mut seed = Strategy::seeded(first.history().to_vec(), template);
        seed.put("anatomical_brain", template, false)?;
        templates.pool_into(&mut seed)?;

        Ok(Aggregate {
            template,
            warps,
            seed: StrategySet::seed(scope, vec![seed]),
        })
    }

    pub(super) fn target(&self, strategy: &str, session: &str, resource: &str) -> SinkTarget {
        SinkTarget {
            subject: self.subject.to_owned(),
            session: session.to_owned(),
            strategy: strategy.to_owned(),
            resource: resource.to_owned(),
        }
    }
}
