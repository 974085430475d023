use workflow::{Literal, NodeInput, StepBackend, StepConfigurationError, StepKind, StepRequest};

/// Inputs a step accepts and the output slots it produces.
struct Interface {
    required: &'static [&'static str],
    optional: &'static [&'static str],
    outputs: &'static [&'static str],
}

const GATHER: Interface = Interface {
    required: &["subject", "anat", "dl_dir"],
    optional: &["creds_path"],
    outputs: &["anat"],
};
const RESAMPLE: Interface = Interface {
    required: &["resolution", "template", "template_name", "tag"],
    optional: &[],
    outputs: &["resampled_template"],
};
const CENTER_OF_MASS: Interface = Interface {
    required: &["in_file", "cm_file"],
    optional: &[],
    outputs: &["cm"],
};
const SKULLSTRIP_OUTPUTS: &[&str] = &["brain", "reorient"];
const FLIRT: Interface = Interface {
    required: &["input_brain", "reference_brain", "interp"],
    optional: &[],
    outputs: &["output_brain", "linear_xfm", "invlinear_xfm"],
};
const FNIRT: Interface = Interface {
    required: &["input_brain", "reference_brain", "linear_aff", "reference_skull", "ref_mask", "fnirt_config"],
    optional: &[],
    outputs: &["output_brain", "nonlinear_xfm"],
};
const ANTS_REQUIRED: &[&str] = &["moving_brain", "reference_brain", "interp", "ants_para", "num_threads"];
const ANTS_SKULL_REQUIRED: &[&str] =
    &["moving_brain", "reference_brain", "reference_skull", "interp", "ants_para", "num_threads"];
const ANTS_OUTPUTS: &[&str] = &[
    "normalized_output_brain",
    "ants_initial_xfm",
    "ants_rigid_xfm",
    "ants_affine_xfm",
    "warp_field",
    "inverse_warp_field",
    "composite_transform",
];
const TEMPLATE: Interface = Interface {
    required: &["img_list", "avg_method", "dof", "interp", "cost", "convergence_threshold", "thread_pool", "num_images"],
    optional: &[],
    outputs: &["template"],
};

/// Prefix of the per-input warp slots produced by the groupwise template step.
pub const WARP_LIST: &str = "warp_list.";
/// Prefix of the numbered inputs of the merge step (numbered from 1).
pub const MERGE_INPUT: &str = "in";

#[rustfmt::skip]
fn interface(kind: StepKind) -> Option<Interface> {
    use StepKind::*;
    let iface = match kind {
        AnatGather | BrainMaskGather      => GATHER,
        ResampleTemplate                  => RESAMPLE,
        TemplateCenterOfMass              => CENTER_OF_MASS,
        MaskSkullstrip                    => skullstrip(&["anat", "template_cmass", "brain_mask"], &[]),
        AlreadySkullstripped              => skullstrip(&["anat", "template_cmass"], &[]),
        AfniSkullstrip                    => skullstrip(&["anat", "template_cmass"], &["shrink_factor"]),
        FslSkullstrip                     => skullstrip(&["anat", "template_cmass"], &["frac"]),
        FlirtRegister | SymmetricFlirtRegister => FLIRT,
        FnirtRegister | SymmetricFnirtRegister => FNIRT,
        AntsRegister | SymmetricAntsRegister   => ants(ANTS_REQUIRED),
        AntsSkullRegister | SymmetricAntsSkullRegister => ants(ANTS_SKULL_REQUIRED),
        LongitudinalTemplate              => TEMPLATE,
        // variable arity:
        LongitudinalMerge                 => return None,
    };
    Some(iface)
}

const fn skullstrip(required: &'static [&'static str], optional: &'static [&'static str]) -> Interface {
    Interface { required, optional, outputs: SKULLSTRIP_OUTPUTS }
}

const fn ants(required: &'static [&'static str]) -> Interface {
    Interface { required, optional: &[], outputs: ANTS_OUTPUTS }
}

/// Default step backend: a table of the external tools' interfaces.
///
/// Rejects unknown and missing inputs, and computes the outputs of the
/// variable-arity aggregation steps from their inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct Catalog;

impl StepBackend for Catalog {
    fn output_slots(&self, request: &StepRequest<'_>) -> Result<Vec<String>, StepConfigurationError> {
        let Some(iface) = interface(request.kind) else {
            return merge_outputs(request);
        };
        check_inputs(request, &iface)?;

        let mut outputs: Vec<String> = iface.outputs.iter().map(|s| s.to_string()).collect();
        if request.kind == StepKind::LongitudinalTemplate {
            let n = num_images(request)?;
            outputs.extend((1..=n).map(|i| format!("{WARP_LIST}{i}")));
        }
        Ok(outputs)
    }
}

fn check_inputs(request: &StepRequest<'_>, iface: &Interface) -> Result<(), StepConfigurationError> {
    for (param, _) in request.inputs {
        let param = param.as_str();
        if !iface.required.contains(&param) && !iface.optional.contains(&param) {
            return Err(StepConfigurationError::UnknownInput {
                step: request.name.to_owned(),
                input: param.to_owned(),
            });
        }
    }
    for param in iface.required {
        if request.input(param).is_none() {
            return Err(StepConfigurationError::MissingInput {
                step: request.name.to_owned(),
                input: param.to_string(),
            });
        }
    }
    Ok(())
}

fn num_images(request: &StepRequest<'_>) -> Result<usize, StepConfigurationError> {
    match request.input("num_images").and_then(NodeInput::literal) {
        Some(Literal::Int(n)) if *n > 0 => Ok(*n as usize),
        _ => Err(StepConfigurationError::InvalidValue {
            step: request.name.to_owned(),
            input: String::from("num_images"),
            reason: String::from("expected a positive integer"),
        }),
    }
}

/// The merge step takes artifacts `in1..inN` and produces a single list.
fn merge_outputs(request: &StepRequest<'_>) -> Result<Vec<String>, StepConfigurationError> {
    for (i, (param, value)) in request.inputs.iter().enumerate() {
        if *param != format!("{MERGE_INPUT}{}", i + 1) {
            return Err(StepConfigurationError::UnknownInput {
                step: request.name.to_owned(),
                input: param.clone(),
            });
        }
        if value.artifact().is_none() {
            return Err(StepConfigurationError::InvalidValue {
                step: request.name.to_owned(),
                input: param.clone(),
                reason: String::from("expected an artifact"),
            });
        }
    }
    if request.inputs.is_empty() {
        return Err(StepConfigurationError::MissingInput {
            step: request.name.to_owned(),
            input: format!("{MERGE_INPUT}1"),
        });
    }
    Ok(vec![String::from("out")])
}
