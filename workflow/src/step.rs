//! The contract between graph construction and the external processing steps.

use serde::Serialize;

use crate::ArtifactRef;

/// Every kind of step that can enter a graph.
/// Applied-step history is recorded as a list of these, so mutual-exclusion
/// checks are typed queries rather than node-name matching.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum StepKind {
    // data sources and shared reference nodes:
    AnatGather,
    BrainMaskGather,
    ResampleTemplate,
    TemplateCenterOfMass,
    // skull stripping, one kind per method:
    MaskSkullstrip,
    AlreadySkullstripped,
    AfniSkullstrip,
    FslSkullstrip,
    // groupwise aggregation:
    LongitudinalMerge,
    LongitudinalTemplate,
    // standard-space registration:
    FlirtRegister,
    FnirtRegister,
    AntsRegister,
    AntsSkullRegister,
    // symmetric-template registration:
    SymmetricFlirtRegister,
    SymmetricFnirtRegister,
    SymmetricAntsRegister,
    SymmetricAntsSkullRegister,
}

impl StepKind {
    /// Name used in strategy labels and applied-step history.
    #[rustfmt::skip]
    pub fn as_str(&self) -> &'static str {
        use StepKind::*;
        match self {
            AnatGather                  => "anat_gather",
            BrainMaskGather             => "brain_gather",
            ResampleTemplate            => "resampled_template",
            TemplateCenterOfMass        => "template_center_of_mass",
            MaskSkullstrip              => "mask_skullstrip",
            AlreadySkullstripped        => "already_skullstripped",
            AfniSkullstrip              => "afni_skullstrip",
            FslSkullstrip               => "fsl_skullstrip",
            LongitudinalMerge           => "anat_longitudinal_merge",
            LongitudinalTemplate        => "subject_specific_template",
            FlirtRegister               => "anat_mni_flirt_register",
            FnirtRegister               => "anat_mni_fnirt_register",
            AntsRegister                => "anat_mni_ants_register",
            AntsSkullRegister           => "anat_mni_ants_skull_register",
            SymmetricFlirtRegister      => "anat_symmetric_mni_flirt_register",
            SymmetricFnirtRegister      => "anat_symmetric_mni_fnirt_register",
            SymmetricAntsRegister       => "anat_symmetric_mni_ants_register",
            SymmetricAntsSkullRegister  => "anat_symmetric_mni_ants_skull_register",
        }
    }

    /// true for the kinds that produce a skull-stripped brain from a session's anatomical.
    pub fn is_skullstrip(&self) -> bool {
        matches!(
            self,
            Self::MaskSkullstrip | Self::AlreadySkullstripped | Self::AfniSkullstrip | Self::FslSkullstrip
        )
    }

    /// true for standard-space and symmetric-template registration kinds.
    pub fn is_registration(&self) -> bool {
        use StepKind::*;
        matches!(
            self,
            FlirtRegister
                | FnirtRegister
                | AntsRegister
                | AntsSkullRegister
                | SymmetricFlirtRegister
                | SymmetricFnirtRegister
                | SymmetricAntsRegister
                | SymmetricAntsSkullRegister
        )
    }
}

impl Serialize for StepKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A literal parameter value handed to a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    List(Vec<String>),
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<String>> for Literal {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}

/// A fully-resolved input as it is stored on a graph node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeInput {
    Artifact(ArtifactRef),
    Literal(Literal),
}

impl NodeInput {
    /// The upstream artifact this input depends on, if any.
    pub fn artifact(&self) -> Option<ArtifactRef> {
        match self {
            Self::Artifact(a) => Some(*a),
            Self::Literal(_) => None,
        }
    }

    /// The literal value of this input, if it is one.
    pub fn literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(lit) => Some(lit),
            Self::Artifact(_) => None,
        }
    }
}

/// What a step implementation sees when it's asked to join the graph.
#[derive(Debug)]
pub struct StepRequest<'a> {
    pub kind: StepKind,
    pub name: &'a str,
    pub inputs: &'a [(String, NodeInput)],
}

impl StepRequest<'_> {
    /// Look up an input by parameter name.
    pub fn input(&self, param: &str) -> Option<&NodeInput> {
        self.inputs.iter().find(|(k, _)| k == param).map(|(_, v)| v)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StepConfigurationError {
    #[error("step \"{step}\" is missing required input \"{input}\"")]
    MissingInput { step: String, input: String },
    #[error("step \"{step}\" does not accept input \"{input}\"")]
    UnknownInput { step: String, input: String },
    #[error("step \"{step}\" has invalid value for \"{input}\": {reason}")]
    InvalidValue {
        step: String,
        input: String,
        reason: String,
    },
    #[error("step \"{step}\" does not produce output \"{slot}\"")]
    UnknownOutput { step: String, slot: String },
}

/// External processing-step contract.
///
/// Given a step request, an implementation validates the inputs and reports
/// the ordered list of output slots the step will produce. The registrar turns
/// each slot into an [`ArtifactRef`]. Nothing is executed here.
pub trait StepBackend {
    fn output_slots(&self, request: &StepRequest<'_>) -> Result<Vec<String>, StepConfigurationError>;
}

impl<T: StepBackend + ?Sized> StepBackend for &T {
    fn output_slots(&self, request: &StepRequest<'_>) -> Result<Vec<String>, StepConfigurationError> {
        (**self).output_slots(request)
    }
}
