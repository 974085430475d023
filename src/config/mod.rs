use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Session list for one or more subjects
mod sessions;
pub use sessions::{group_by_subject, load_sessions, Error as SessionError, Session};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Option list \"{0}\" is empty; enable at least one option")]
    EmptyOptions(&'static str),
    #[error("Invalid value for \"{0}\": {1}")]
    InvalidValue(&'static str, String),
}

macro_rules! option_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

option_enum!(
    /// Skull-stripping method.
    SkullstripOption { Afni => "AFNI", Bet => "BET" }
);
option_enum!(
    /// Standard-space registration backend.
    RegistrationOption { Fsl => "FSL", Ants => "ANTS" }
);
option_enum!(FslInterpolation { Trilinear => "trilinear", Sinc => "sinc", Spline => "spline" });
option_enum!(AntsInterpolation {
    Linear => "Linear",
    BSpline => "BSpline",
    LanczosWindowedSinc => "LanczosWindowedSinc",
});
option_enum!(
    /// How the groupwise template averages its inputs.
    AvgMethod { Median => "median", Mean => "mean" }
);

/// Resources that are persisted when no `publishable_outputs` list is configured.
pub const DEFAULT_PUBLISHABLE: &[&str] = &[
    "anatomical_brain",
    "anatomical_reorient",
    "anatomical_brain_mask",
    "anatomical_to_standard",
    "anatomical_to_mni_linear_xfm",
    "mni_to_anatomical_linear_xfm",
    "anatomical_to_mni_nonlinear_xfm",
    "mni_to_anatomical_nonlinear_xfm",
    "ants_initial_xfm",
    "ants_rigid_xfm",
    "ants_affine_xfm",
    "anat_to_mni_ants_composite_xfm",
    "symmetric_anatomical_to_standard",
    "anatomical_to_symmetric_mni_linear_xfm",
    "symmetric_mni_to_anatomical_linear_xfm",
    "anatomical_to_symmetric_mni_nonlinear_xfm",
    "symmetric_mni_to_anatomical_nonlinear_xfm",
    "ants_symmetric_initial_xfm",
    "ants_symmetric_rigid_xfm",
    "ants_symmetric_affine_xfm",
    "anat_to_symmetric_mni_ants_composite_xfm",
];

/// Pipeline configuration, loaded from YAML and validated once.
///
/// Option lists are sets: duplicates are dropped and each list is kept in its
/// enum's declared order, so the same config always builds the same graph.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub pipeline_name: String,
    pub working_directory: String,
    pub output_directory: String,

    pub already_skullstripped: bool,
    pub skullstrip_option: Vec<SkullstripOption>,
    pub skullstrip_shrink_factor: f64,
    pub bet_frac: f64,

    pub reg_option: Vec<RegistrationOption>,
    /// `true` keeps a linear-only branch, `false` adds a nonlinear one.
    pub fsl_linear_reg_only: Vec<bool>,
    pub reg_with_skull: Vec<bool>,
    pub fsl_interpolation: FslInterpolation,
    pub ants_interpolation: AntsInterpolation,
    pub fnirt_config: String,
    pub ants_parameters: Vec<String>,
    pub num_ants_threads: u32,

    pub run_vmhc: bool,
    pub run_functional: bool,

    // templates:
    pub resolution_for_anat: String,
    pub resolution_for_func_preproc: String,
    pub resolution_for_func_derivative: String,
    pub template_brain_only_for_anat: String,
    pub template_skull_for_anat: String,
    pub template_symmetric_brain_only: String,
    pub template_symmetric_skull: String,
    pub dilated_symmetric_brain_mask: String,
    pub ref_mask: String,
    pub template_brain_only_for_func: String,
    pub template_skull_for_func: String,

    // groupwise template:
    pub long_reg_avg_method: AvgMethod,
    pub dof: u32,
    pub interp: String,
    pub cost: String,
    pub convergence_threshold: f64,
    pub thread_pool: u32,

    pub publishable_outputs: Option<Vec<String>>,
}

const STANDARD: &str = "/usr/share/fsl/data/standard";

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline_name: String::from("default"),
            working_directory: String::from("working"),
            output_directory: String::from("output"),

            already_skullstripped: false,
            skullstrip_option: vec![SkullstripOption::Afni],
            skullstrip_shrink_factor: 0.6,
            bet_frac: 0.5,

            reg_option: vec![RegistrationOption::Fsl],
            fsl_linear_reg_only: vec![true],
            reg_with_skull: vec![false],
            fsl_interpolation: FslInterpolation::Sinc,
            ants_interpolation: AntsInterpolation::LanczosWindowedSinc,
            fnirt_config: String::from("T1_2_MNI152_2mm"),
            ants_parameters: Vec::with_capacity(0),
            num_ants_threads: 1,

            run_vmhc: false,
            run_functional: true,

            resolution_for_anat: String::from("2mm"),
            resolution_for_func_preproc: String::from("3mm"),
            resolution_for_func_derivative: String::from("3mm"),
            template_brain_only_for_anat: format!("{STANDARD}/MNI152_T1_${{resolution_for_anat}}_brain.nii.gz"),
            template_skull_for_anat: format!("{STANDARD}/MNI152_T1_${{resolution_for_anat}}.nii.gz"),
            template_symmetric_brain_only: format!(
                "{STANDARD}/MNI152_T1_${{resolution_for_anat}}_brain_symmetric.nii.gz"
            ),
            template_symmetric_skull: format!("{STANDARD}/MNI152_T1_${{resolution_for_anat}}_symmetric.nii.gz"),
            dilated_symmetric_brain_mask: format!(
                "{STANDARD}/MNI152_T1_${{resolution_for_anat}}_brain_mask_symmetric_dil.nii.gz"
            ),
            ref_mask: format!("{STANDARD}/MNI152_T1_${{resolution_for_anat}}_brain_mask_dil.nii.gz"),
            template_brain_only_for_func: format!("{STANDARD}/MNI152_T1_${{resolution_for_func_preproc}}_brain.nii.gz"),
            template_skull_for_func: format!("{STANDARD}/MNI152_T1_${{resolution_for_func_preproc}}.nii.gz"),

            long_reg_avg_method: AvgMethod::Median,
            dof: 12,
            interp: String::from("trilinear"),
            cost: String::from("corratio"),
            convergence_threshold: 1.0,
            thread_pool: 2,

            publishable_outputs: None,
        }
    }
}

impl PipelineConfig {
    /// Read, normalize and validate a YAML pipeline config.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("while reading pipeline config {path:?}"))?;
        Self::from_yaml(&text).with_context(|| format!("while loading pipeline config {path:?}"))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(text)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Dedupe every option list and put it in declared order.
    pub fn normalize(&mut self) {
        fn set<T: Ord>(v: &mut Vec<T>) {
            v.sort_unstable();
            v.dedup();
        }
        set(&mut self.skullstrip_option);
        set(&mut self.reg_option);
        set(&mut self.fsl_linear_reg_only);
        set(&mut self.reg_with_skull);
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.skullstrip_option.is_empty() && !self.already_skullstripped {
            return Err(Error::EmptyOptions("skullstrip_option"));
        }
        if self.reg_option.is_empty() {
            return Err(Error::EmptyOptions("reg_option"));
        }
        if self.fsl_linear_reg_only.is_empty() {
            return Err(Error::EmptyOptions("fsl_linear_reg_only"));
        }
        if self.reg_with_skull.is_empty() {
            return Err(Error::EmptyOptions("reg_with_skull"));
        }
        if ![6, 7, 9, 12].contains(&self.dof) {
            return Err(Error::InvalidValue("dof", format!("{} (expected 6, 7, 9 or 12)", self.dof)));
        }
        if self.convergence_threshold <= 0.0 {
            return Err(Error::InvalidValue(
                "convergence_threshold",
                format!("{} (must be greater than 0)", self.convergence_threshold),
            ));
        }
        if self.thread_pool == 0 {
            return Err(Error::InvalidValue("thread_pool", String::from("0 (must be at least 1)")));
        }
        if self.num_ants_threads == 0 {
            return Err(Error::InvalidValue("num_ants_threads", String::from("0 (must be at least 1)")));
        }
        if self.pipeline_name.is_empty() {
            return Err(Error::InvalidValue("pipeline_name", String::from("must not be empty")));
        }
        Ok(())
    }

    #[inline]
    pub fn has_skullstrip(&self, option: SkullstripOption) -> bool {
        self.skullstrip_option.contains(&option)
    }

    #[inline]
    pub fn has_registration(&self, option: RegistrationOption) -> bool {
        self.reg_option.contains(&option)
    }

    /// true if the symmetric-template registration stage should be built.
    pub fn symmetric_registration(&self) -> bool {
        self.run_vmhc && self.run_functional
    }

    /// Resource names the output router persists.
    pub fn publishable(&self) -> Vec<&str> {
        match &self.publishable_outputs {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => DEFAULT_PUBLISHABLE.to_vec(),
        }
    }
}
