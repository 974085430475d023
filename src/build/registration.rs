use anyhow::Result;

use workflow::{Error, Registrar, StepBackend, StepCall, StepKind, Strategy, StrategySet};

use super::SubjectBuilder;
use crate::config::{PipelineConfig, RegistrationOption};

/// Resource names and step kinds for one target space.
struct Space {
    flirt: StepKind,
    fnirt: StepKind,
    ants: StepKind,
    ants_skull: StepKind,
    reference_brain: &'static str,
    reference_skull: &'static str,
    fnirt_mask: &'static str,
    linear_xfm: &'static str,
    inverse_linear_xfm: &'static str,
    nonlinear_xfm: &'static str,
    inverse_nonlinear_xfm: &'static str,
    initial_xfm: &'static str,
    rigid_xfm: &'static str,
    affine_xfm: &'static str,
    composite_xfm: &'static str,
    to_standard: &'static str,
}

const MNI: Space = Space {
    flirt: StepKind::FlirtRegister,
    fnirt: StepKind::FnirtRegister,
    ants: StepKind::AntsRegister,
    ants_skull: StepKind::AntsSkullRegister,
    reference_brain: "template_brain_for_anat",
    reference_skull: "template_skull_for_anat",
    fnirt_mask: "template_ref_mask",
    linear_xfm: "anatomical_to_mni_linear_xfm",
    inverse_linear_xfm: "mni_to_anatomical_linear_xfm",
    nonlinear_xfm: "anatomical_to_mni_nonlinear_xfm",
    inverse_nonlinear_xfm: "mni_to_anatomical_nonlinear_xfm",
    initial_xfm: "ants_initial_xfm",
    rigid_xfm: "ants_rigid_xfm",
    affine_xfm: "ants_affine_xfm",
    composite_xfm: "anat_to_mni_ants_composite_xfm",
    to_standard: "anatomical_to_standard",
};

const SYMMETRIC: Space = Space {
    flirt: StepKind::SymmetricFlirtRegister,
    fnirt: StepKind::SymmetricFnirtRegister,
    ants: StepKind::SymmetricAntsRegister,
    ants_skull: StepKind::SymmetricAntsSkullRegister,
    reference_brain: "template_symmetric_brain",
    reference_skull: "template_symmetric_skull",
    fnirt_mask: "template_dilated_symmetric_brain_mask",
    linear_xfm: "anatomical_to_symmetric_mni_linear_xfm",
    inverse_linear_xfm: "symmetric_mni_to_anatomical_linear_xfm",
    nonlinear_xfm: "anatomical_to_symmetric_mni_nonlinear_xfm",
    inverse_nonlinear_xfm: "symmetric_mni_to_anatomical_nonlinear_xfm",
    initial_xfm: "ants_symmetric_initial_xfm",
    rigid_xfm: "ants_symmetric_rigid_xfm",
    affine_xfm: "ants_symmetric_affine_xfm",
    composite_xfm: "anat_to_symmetric_mni_ants_composite_xfm",
    to_standard: "symmetric_anatomical_to_standard",
};

/// First registration decision point, in declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Registration {
    Flirt,
    Ants { skull: bool },
}

const REGISTRATIONS: [Registration; 3] = [
    Registration::Flirt,
    Registration::Ants { skull: false },
    Registration::Ants { skull: true },
];

/// Second decision point, for strategies that ran FLIRT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fnirt {
    LinearOnly,
    Nonlinear,
}

const FNIRT_OPTIONS: [Fnirt; 2] = [Fnirt::LinearOnly, Fnirt::Nonlinear];

fn ran_ants(s: &Strategy) -> bool {
    s.has_step(StepKind::AntsRegister) || s.has_step(StepKind::AntsSkullRegister)
}

/// Fails on combinations that would build a graph that can't work.
fn registration_applies(config: &PipelineConfig, subject: &str, s: &Strategy, r: Registration) -> Result<bool> {
    let applies = match r {
        Registration::Flirt => {
            if !config.has_registration(RegistrationOption::Fsl) {
                return Ok(false);
            }
            if config.already_skullstripped && config.fsl_linear_reg_only.contains(&false) {
                return Err(Error::InvalidConfiguration(format!(
                    "subject {subject}: FNIRT anatomical registration needs skull-on input, \
                     but inputs are already skull-stripped; use ANTS or linear-only FSL registration"
                ))
                .into());
            }
            true
        }
        Registration::Ants { skull } => {
            if !config.has_registration(RegistrationOption::Ants) || !config.reg_with_skull.contains(&skull) {
                return Ok(false);
            }
            if skull && config.already_skullstripped {
                return Err(Error::InvalidConfiguration(format!(
                    "subject {subject}: ANTS registration with the skull was selected, \
                     but inputs are already skull-stripped"
                ))
                .into());
            }
            !s.has_step(StepKind::FlirtRegister) && !s.has_step(StepKind::FnirtRegister)
        }
    };
    Ok(applies)
}

fn node_name(kind: StepKind, scope: &str, idx: usize) -> String {
    format!("{kind}_{scope}_{idx}")
}

impl<B: StepBackend> SubjectBuilder<'_, B> {
    /// Fan a template-seeded set out over the standard-space registration options.
    pub fn register_to_standard(&mut self, mut set: StrategySet) -> Result<StrategySet> {
        let config = self.config;
        let subject = self.subject;
        let scope = set.scope().to_owned();
        let registrar = &mut self.registrar;

        set.for_each_fork_if(
            &REGISTRATIONS,
            |s, r| registration_applies(config, subject, s, *r),
            |s, r, idx| match *r {
                Registration::Flirt => {
                    flirt(&mut *registrar, config, &MNI, s, node_name(MNI.flirt, &scope, idx))
                }
                Registration::Ants { skull } => {
                    let kind = if skull { MNI.ants_skull } else { MNI.ants };
                    ants(&mut *registrar, config, &MNI, s, skull, node_name(kind, &scope, idx))
                }
            },
        )?;

        set.for_each_fork_if(
            &FNIRT_OPTIONS,
            |s, f| {
                let enabled = match f {
                    Fnirt::LinearOnly => config.fsl_linear_reg_only.contains(&true),
                    Fnirt::Nonlinear => config.fsl_linear_reg_only.contains(&false),
                };
                Ok(enabled && s.has_step(StepKind::FlirtRegister))
            },
            |s, f, idx| match f {
                Fnirt::LinearOnly => Ok(()),
                Fnirt::Nonlinear => {
                    fnirt(&mut *registrar, config, &MNI, s, node_name(MNI.fnirt, &scope, idx))
                }
            },
        )?;

        if config.symmetric_registration() {
            set.for_each_fork_if(
                &[SYMMETRIC.flirt],
                |s, _| Ok(config.has_registration(RegistrationOption::Fsl) && !ran_ants(s)),
                |s, kind, idx| flirt(&mut *registrar, config, &SYMMETRIC, s, node_name(*kind, &scope, idx)),
            )?;
            set.for_each_fork_if(
                &[SYMMETRIC.fnirt],
                |s, _| Ok(s.has_step(StepKind::FnirtRegister)),
                |s, kind, idx| fnirt(&mut *registrar, config, &SYMMETRIC, s, node_name(*kind, &scope, idx)),
            )?;
            set.for_each_fork_if(
                &[SYMMETRIC.ants],
                |s, _| Ok(ran_ants(s)),
                |s, _, idx| {
                    // same skull variant as the strategy's own ANTS registration:
                    let skull = s.has_step(StepKind::AntsSkullRegister);
                    let kind = if skull { SYMMETRIC.ants_skull } else { SYMMETRIC.ants };
                    ants(&mut *registrar, config, &SYMMETRIC, s, skull, node_name(kind, &scope, idx))
                },
            )?;
        }

        log::info!(
            "subject {subject}: {} registration strategies for {scope} ({})",
            set.len(),
            set.labels().join(", ")
        );
        Ok(set)
    }
}

fn flirt<B: StepBackend>(
    registrar: &mut Registrar<B>,
    config: &PipelineConfig,
    space: &Space,
    s: &mut Strategy,
    name: String,
) -> Result<()> {
    let call = StepCall::new(space.flirt, name)
        .resource("input_brain", "anatomical_brain")
        .resource("reference_brain", space.reference_brain)
        .param("interp", config.fsl_interpolation.as_str())
        .output("linear_xfm", space.linear_xfm)
        .output("invlinear_xfm", space.inverse_linear_xfm)
        .output("output_brain", space.to_standard)
        .primary("output_brain");
    registrar.register(s, call)?;
    Ok(())
}

/// Nonlinear refinement of a FLIRT result; supersedes its `to_standard` output.
fn fnirt<B: StepBackend>(
    registrar: &mut Registrar<B>,
    config: &PipelineConfig,
    space: &Space,
    s: &mut Strategy,
    name: String,
) -> Result<()> {
    let call = StepCall::new(space.fnirt, name)
        .resource("input_brain", "anatomical_brain")
        .resource("reference_brain", space.reference_brain)
        .resource("linear_aff", space.linear_xfm)
        .resource("reference_skull", space.reference_skull)
        .resource("ref_mask", space.fnirt_mask)
        .param("fnirt_config", config.fnirt_config.as_str())
        .output("nonlinear_xfm", space.nonlinear_xfm)
        .output("output_brain", space.to_standard)
        .primary("output_brain")
        .override_existing();
    registrar.register(s, call)?;
    Ok(())
}

fn ants<B: StepBackend>(
    registrar: &mut Registrar<B>,
    config: &PipelineConfig,
    space: &Space,
    s: &mut Strategy,
    skull: bool,
    name: String,
) -> Result<()> {
    let kind = if skull { space.ants_skull } else { space.ants };
    let mut call = StepCall::new(kind, name)
        .resource("moving_brain", "anatomical_brain")
        .resource("reference_brain", space.reference_brain);
    if skull {
        call = call.resource("reference_skull", space.reference_skull);
    }
    let call = call
        .param("interp", config.ants_interpolation.as_str())
        .param("ants_para", config.ants_parameters.clone())
        .param("num_threads", i64::from(config.num_ants_threads))
        .output("ants_initial_xfm", space.initial_xfm)
        .output("ants_rigid_xfm", space.rigid_xfm)
        .output("ants_affine_xfm", space.affine_xfm)
        .output("warp_field", space.nonlinear_xfm)
        .output("inverse_warp_field", space.inverse_nonlinear_xfm)
        .output("composite_transform", space.composite_xfm)
        .output("normalized_output_brain", space.to_standard)
        .primary("normalized_output_brain");
    registrar.register(s, call)?;
    Ok(())
}
