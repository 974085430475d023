use anyhow::Result;

use workflow::{ArtifactRef, StepBackend, StepCall, StepKind, Strategy};

use super::SubjectBuilder;

/// Resampled reference templates shared by every strategy of one subject.
#[derive(Debug, Clone)]
pub struct Templates {
    /// (resource name, resampled template), in creation order.
    resampled: Vec<(&'static str, ArtifactRef)>,
    /// Center of mass of the skull-on anatomical template.
    pub center_of_mass: ArtifactRef,
}

impl Templates {
    /// Pool every resampled template into `strategy`.
    pub fn pool_into(&self, strategy: &mut Strategy) -> Result<(), workflow::Error> {
        for (name, artifact) in &self.resampled {
            strategy.put(name, *artifact, false)?;
        }
        Ok(())
    }
}

const SKULL_FOR_ANAT: &str = "template_skull_for_anat";

impl<B: StepBackend> SubjectBuilder<'_, B> {
    /// Resampled templates for this subject, created on first call.
    pub(super) fn templates(&mut self) -> Result<Templates> {
        if let Some(templates) = &self.templates {
            return Ok(templates.clone());
        }

        let c = self.config;
        #[rustfmt::skip]
        let wanted = [
            (&c.resolution_for_anat, &c.template_brain_only_for_anat, "template_brain_for_anat", "resolution_for_anat"),
            (&c.resolution_for_anat, &c.template_skull_for_anat, SKULL_FOR_ANAT, "resolution_for_anat"),
            (&c.resolution_for_anat, &c.template_symmetric_brain_only, "template_symmetric_brain", "resolution_for_anat"),
            (&c.resolution_for_anat, &c.template_symmetric_skull, "template_symmetric_skull", "resolution_for_anat"),
            (&c.resolution_for_anat, &c.dilated_symmetric_brain_mask, "template_dilated_symmetric_brain_mask", "resolution_for_anat"),
            (&c.resolution_for_anat, &c.ref_mask, "template_ref_mask", "resolution_for_anat"),
            (&c.resolution_for_func_preproc, &c.template_brain_only_for_func, "template_brain_for_func_preproc", "resolution_for_func_preproc"),
            (&c.resolution_for_func_preproc, &c.template_skull_for_func, "template_skull_for_func_preproc", "resolution_for_func_preproc"),
            (&c.resolution_for_func_derivative, &c.template_brain_only_for_func, "template_brain_for_func_derivative", "resolution_for_func_preproc"),
            (&c.resolution_for_func_derivative, &c.template_skull_for_func, "template_skull_for_func_derivative", "resolution_for_func_preproc"),
        ];

        let mut resampled = Vec::with_capacity(wanted.len());
        for (resolution, template, name, tag) in wanted {
            let call = StepCall::new(StepKind::ResampleTemplate, format!("resampled_{name}_{}", self.subject))
                .param("resolution", resolution.as_str())
                .param("template", template.as_str())
                .param("template_name", name)
                .param("tag", tag);
            let node = self.registrar.register_shared(call)?;
            resampled.push((name, node.output("resampled_template")?));
        }

        let skull = resampled
            .iter()
            .find(|(n, _)| *n == SKULL_FOR_ANAT)
            .map(|(_, a)| *a)
            .ok_or_else(|| workflow::Error::ResourceNotFound(SKULL_FOR_ANAT.to_owned()))?;
        let call = StepCall::new(
            StepKind::TemplateCenterOfMass,
            format!("{SKULL_FOR_ANAT}_center_of_mass_{}", self.subject),
        )
        .artifact("in_file", skull)
        .param("cm_file", "template_center_of_mass.txt");
        let center_of_mass = self.registrar.register_shared(call)?.output("cm")?;

        let templates = Templates {
            resampled,
            center_of_mass,
        };
        self.templates = Some(templates.clone());
        Ok(templates)
    }
}
