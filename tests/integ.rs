use anyhow::Result;
use std::path::Path;
use tempfile::tempdir;

use stratagraph::build::{SubjectBuilder, SubjectGraph};
use stratagraph::config::{PipelineConfig, RegistrationOption, Session, SessionError, SkullstripOption};
use stratagraph::steps::Catalog;
use stratagraph::{App, Args};
use workflow::error::AggregatedErrors;
use workflow::{
    Error, Family, StepBackend, StepConfigurationError, StepKind, StepRequest, StrategySet,
};

fn sessions(subject: &str, n: usize) -> Vec<Session> {
    (1..=n)
        .map(|i| {
            let ses = format!("ses-{i}");
            let anat = format!("/data/{subject}/{ses}/anat.nii.gz");
            Session::new(subject, &ses, &anat)
        })
        .collect()
}

fn build(config: &PipelineConfig, sessions: &[Session]) -> Result<SubjectGraph> {
    SubjectBuilder::new(config, "sub-01", sessions, Catalog).build()
}

fn has_error(e: &anyhow::Error, f: impl Fn(&Error) -> bool) -> bool {
    e.chain().any(|c| c.downcast_ref::<Error>().is_some_and(&f))
}

fn count_kind(built: &SubjectGraph, kind: StepKind) -> usize {
    built.graph.nodes().filter(|(_, n)| n.kind == kind).count()
}

#[test]
fn test_single_session_fsl() -> Result<()> {
    let config = PipelineConfig::default();
    let built = build(&config, &sessions("sub-01", 1))?;

    assert_eq!(built.preprocessing.len(), 1);
    assert_eq!(built.registration.len(), 1);
    let terminal = &built.registration[0];
    assert_eq!(terminal.len(), 1);

    let strategy = terminal.iter().next().ok_or_else(|| anyhow::anyhow!("no strategy"))?;
    assert_eq!(strategy.history(), [StepKind::AfniSkullstrip, StepKind::FlirtRegister]);
    assert_eq!(strategy.label(), "afni_skullstrip+anat_mni_flirt_register");
    assert!(strategy.pool().contains("anatomical_to_standard"));
    assert_eq!(strategy.leaf()?, strategy.get("anatomical_to_standard")?);

    // 10 resampled templates, center of mass, gather, skull strip, merge, template, flirt:
    assert_eq!(built.graph.len(), 16);
    assert_eq!(built.graph.execution_order().len(), 16);

    let dest: Vec<&str> = vec![
        "output",
        "pipeline_default_afni_skullstrip+anat_mni_flirt_register",
        "sub-01",
        "anatomical_to_standard",
    ];
    assert!(built.connections.iter().any(|c| c.destination == dest));
    assert!(built
        .connections
        .iter()
        .any(|c| c.target.resource == "anat_longitudinal_template" && c.target.session.is_empty()));
    assert!(built
        .connections
        .iter()
        .any(|c| c.target.resource == "subject_to_longitudinal_template_warp" && c.target.session == "ses-1"));
    assert_eq!(built.connections.len(), 8);
    Ok(())
}

#[test]
fn test_two_sessions_fsl_and_ants() -> Result<()> {
    let config = PipelineConfig {
        reg_option: vec![RegistrationOption::Fsl, RegistrationOption::Ants],
        ..PipelineConfig::default()
    };
    let built = build(&config, &sessions("sub-01", 2))?;

    assert_eq!(built.preprocessing.len(), 2);
    assert_eq!(built.preprocessing.families().len(), 1);
    assert_eq!(count_kind(&built, StepKind::LongitudinalTemplate), 1);
    assert_eq!(count_kind(&built, StepKind::LongitudinalMerge), 1);

    let (_, merge) = built
        .graph
        .find("anat_longitudinal_merge_afni_skullstrip_sub-01")
        .ok_or_else(|| anyhow::anyhow!("no merge node"))?;
    let params: Vec<&str> = merge.inputs.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(params, ["in1", "in2"]);

    assert_eq!(built.registration.len(), 1);
    assert_eq!(
        built.registration[0].labels(),
        [
            "afni_skullstrip+anat_mni_flirt_register",
            "afni_skullstrip+anat_mni_ants_register",
        ]
    );
    Ok(())
}

#[test]
fn test_skull_on_registration_of_stripped_input_fails_before_registration() -> Result<()> {
    let config = PipelineConfig {
        already_skullstripped: true,
        reg_option: vec![RegistrationOption::Ants],
        reg_with_skull: vec![true],
        ..PipelineConfig::default()
    };
    let sessions = sessions("sub-01", 2);
    let mut builder = SubjectBuilder::new(&config, "sub-01", &sessions, Catalog);

    let preprocessing = builder.preprocess()?;
    assert_eq!(preprocessing.labels(), ["already_skullstripped", "already_skullstripped"]);
    let families = preprocessing.families();
    let aggregate = builder.aggregate(&families[0])?;

    let res = builder.register_to_standard(aggregate.seed);
    let e = res.err().ok_or_else(|| anyhow::anyhow!("expected configuration error"))?;
    assert!(has_error(&e, |e| matches!(e, Error::InvalidConfiguration(_))));
    assert!(builder.graph().nodes().all(|(_, n)| !n.kind.is_registration()));
    Ok(())
}

#[test]
fn test_nonlinear_fsl_on_stripped_input_fails() {
    let config = PipelineConfig {
        already_skullstripped: true,
        fsl_linear_reg_only: vec![false],
        ..PipelineConfig::default()
    };
    let res = build(&config, &sessions("sub-01", 1));
    assert!(res.is_err_and(|e| has_error(&e, |e| matches!(e, Error::InvalidConfiguration(_)))));
}

#[test]
fn test_linear_and_nonlinear_fsl() -> Result<()> {
    let config = PipelineConfig {
        fsl_linear_reg_only: vec![true, false],
        ..PipelineConfig::default()
    };
    let built = build(&config, &sessions("sub-01", 1))?;
    let terminal = &built.registration[0];
    assert_eq!(
        terminal.labels(),
        [
            "afni_skullstrip+anat_mni_flirt_register",
            "afni_skullstrip+anat_mni_flirt_register+anat_mni_fnirt_register",
        ]
    );

    let linear = terminal.get(0).ok_or_else(|| anyhow::anyhow!("missing strategy"))?;
    let nonlinear = terminal.get(1).ok_or_else(|| anyhow::anyhow!("missing strategy"))?;
    // the nonlinear result supersedes the linear one, but the linear transform stays:
    assert_ne!(linear.get("anatomical_to_standard")?, nonlinear.get("anatomical_to_standard")?);
    assert_eq!(
        linear.get("anatomical_to_mni_linear_xfm")?,
        nonlinear.get("anatomical_to_mni_linear_xfm")?
    );
    assert!(!linear.pool().contains("anatomical_to_mni_nonlinear_xfm"));
    Ok(())
}

#[test]
fn test_two_skullstrip_methods_make_two_families() -> Result<()> {
    let config = PipelineConfig {
        skullstrip_option: vec![SkullstripOption::Afni, SkullstripOption::Bet],
        ..PipelineConfig::default()
    };
    let built = build(&config, &sessions("sub-01", 2))?;
    assert_eq!(
        built.preprocessing.labels(),
        ["afni_skullstrip", "afni_skullstrip", "fsl_skullstrip", "fsl_skullstrip"]
    );
    let sessions: Vec<_> = built.preprocessing.iter().map(|s| s.session().unwrap_or_default()).collect();
    assert_eq!(sessions, ["ses-1", "ses-2", "ses-1", "ses-2"]);
    assert_eq!(count_kind(&built, StepKind::LongitudinalTemplate), 2);
    assert_eq!(
        built.terminal_labels(),
        [
            "afni_skullstrip+anat_mni_flirt_register",
            "fsl_skullstrip+anat_mni_flirt_register",
        ]
    );
    Ok(())
}

#[test]
fn test_session_with_brain_mask_uses_mask_only() -> Result<()> {
    let config = PipelineConfig {
        skullstrip_option: vec![SkullstripOption::Afni, SkullstripOption::Bet],
        ..PipelineConfig::default()
    };
    let mut sessions = sessions("sub-01", 2);
    sessions[1].brain_mask = Some(String::from("/data/sub-01/ses-2/mask.nii.gz"));
    let built = build(&config, &sessions)?;

    assert_eq!(
        built.preprocessing.labels(),
        ["afni_skullstrip", "mask_skullstrip", "fsl_skullstrip"]
    );
    assert!(built.graph.find("brain_gather_sub-01_ses-2").is_some());
    assert!(built.graph.find("anat_preproc_mask_sub-01_ses-2").is_some());
    assert_eq!(built.preprocessing.families().len(), 3);
    Ok(())
}

#[test]
fn test_symmetric_registration() -> Result<()> {
    let config = PipelineConfig {
        reg_option: vec![RegistrationOption::Fsl, RegistrationOption::Ants],
        fsl_linear_reg_only: vec![false],
        run_vmhc: true,
        ..PipelineConfig::default()
    };
    let built = build(&config, &sessions("sub-01", 1))?;
    let terminal = &built.registration[0];
    assert_eq!(
        terminal.labels(),
        [
            "afni_skullstrip+anat_mni_flirt_register+anat_mni_fnirt_register\
             +anat_symmetric_mni_flirt_register+anat_symmetric_mni_fnirt_register",
            "afni_skullstrip+anat_mni_ants_register+anat_symmetric_mni_ants_register",
        ]
    );
    for s in terminal {
        assert!(s.pool().contains("symmetric_anatomical_to_standard"));
    }
    Ok(())
}

#[test]
fn test_ants_with_and_without_skull() -> Result<()> {
    let config = PipelineConfig {
        reg_option: vec![RegistrationOption::Ants],
        reg_with_skull: vec![false, true],
        run_vmhc: true,
        ..PipelineConfig::default()
    };
    let built = build(&config, &sessions("sub-01", 2))?;
    assert_eq!(
        built.terminal_labels(),
        [
            "afni_skullstrip+anat_mni_ants_register+anat_symmetric_mni_ants_register",
            "afni_skullstrip+anat_mni_ants_skull_register+anat_symmetric_mni_ants_skull_register",
        ]
    );

    let expected = [
        (StepKind::AntsSkullRegister, "resampled_template_skull_for_anat_sub-01"),
        (StepKind::SymmetricAntsSkullRegister, "resampled_template_symmetric_skull_sub-01"),
    ];
    for (kind, reference) in expected {
        assert_eq!(count_kind(&built, kind), 1);
        let (_, node) = built
            .graph
            .nodes()
            .find(|(_, n)| n.kind == kind)
            .ok_or_else(|| anyhow::anyhow!("no {kind} node"))?;
        let skull = node
            .inputs
            .iter()
            .find(|(param, _)| param == "reference_skull")
            .and_then(|(_, input)| input.artifact())
            .ok_or_else(|| anyhow::anyhow!("{kind} has no reference_skull"))?;
        let producer = built.graph.node(skull.node()).map(|n| n.name.as_str());
        assert_eq!(producer, Some(reference));
    }

    for kind in [StepKind::AntsRegister, StepKind::SymmetricAntsRegister] {
        let (_, node) = built
            .graph
            .nodes()
            .find(|(_, n)| n.kind == kind)
            .ok_or_else(|| anyhow::anyhow!("no {kind} node"))?;
        assert!(node.inputs.iter().all(|(param, _)| param != "reference_skull"));
    }
    Ok(())
}

#[test]
fn test_construction_is_deterministic() -> Result<()> {
    let config = PipelineConfig {
        skullstrip_option: vec![SkullstripOption::Afni, SkullstripOption::Bet],
        reg_option: vec![RegistrationOption::Fsl, RegistrationOption::Ants],
        fsl_linear_reg_only: vec![true, false],
        ..PipelineConfig::default()
    };
    let sessions = sessions("sub-01", 3);
    let first = build(&config, &sessions)?;
    let second = build(&config, &sessions)?;

    assert_eq!(first.terminal_labels(), second.terminal_labels());
    assert_eq!(first.terminal_labels().len(), 6);
    for (a, b) in first.registration.iter().zip(&second.registration) {
        for (sa, sb) in a.iter().zip(b) {
            assert_eq!(sa.pool(), sb.pool());
        }
    }
    assert_eq!(
        serde_json::to_string(&first.manifest())?,
        serde_json::to_string(&second.manifest())?
    );
    Ok(())
}

#[test]
fn test_empty_family() -> Result<()> {
    let config = PipelineConfig::default();
    let sessions = sessions("sub-01", 1);
    let mut builder = SubjectBuilder::new(&config, "sub-01", &sessions, Catalog);
    let family = Family {
        label: String::from("afni_skullstrip"),
        strategies: Vec::new(),
    };
    let before = builder.graph().len();
    let e = builder.aggregate(&family).err().ok_or_else(|| anyhow::anyhow!("expected error"))?;
    assert!(has_error(&e, |e| matches!(e, Error::EmptyFamily(_))));
    assert_eq!(builder.graph().len(), before);
    Ok(())
}

/// Drops the last per-input warp of the groupwise template step.
struct ShortWarps;

impl StepBackend for ShortWarps {
    fn output_slots(&self, request: &StepRequest<'_>) -> Result<Vec<String>, StepConfigurationError> {
        let mut slots = Catalog.output_slots(request)?;
        if request.kind == StepKind::LongitudinalTemplate {
            slots.pop();
        }
        Ok(slots)
    }
}

#[test]
fn test_aggregation_length_mismatch() {
    let config = PipelineConfig::default();
    let sessions = sessions("sub-01", 3);
    let res = SubjectBuilder::new(&config, "sub-01", &sessions, ShortWarps).build();
    assert!(res.is_err_and(|e| has_error(&e, |e| matches!(
        e,
        Error::AggregationLengthMismatch { expected: 3, actual: 2 }
    ))));
}

#[test]
fn test_registration_seed() -> Result<()> {
    let config = PipelineConfig::default();
    let sessions = sessions("sub-01", 2);
    let mut builder = SubjectBuilder::new(&config, "sub-01", &sessions, Catalog);
    let preprocessing = builder.preprocess()?;
    let families = preprocessing.families();
    let aggregate = builder.aggregate(&families[0])?;

    assert_eq!(aggregate.warps.len(), 2);
    let seed: &StrategySet = &aggregate.seed;
    let s = seed.get(0).ok_or_else(|| anyhow::anyhow!("empty seed"))?;
    assert_eq!(seed.len(), 1);
    assert_eq!(s.leaf()?, aggregate.template);
    assert_eq!(s.get("anatomical_brain")?, aggregate.template);
    assert_eq!(s.history(), [StepKind::AfniSkullstrip]);
    assert!(s.session().is_none());
    assert!(s.pool().contains("template_ref_mask"));
    Ok(())
}

// APP ///////////////////////

const PIPELINE_YML: &str = "\
pipeline_name: test
reg_option: [FSL, ANTS]
";

const DATA_YML: &str = "\
- subject_id: sub-01
  unique_id: ses-1
  anat: /data/sub-01/ses-1/anat.nii.gz
- subject_id: sub-01
  unique_id: ses-2
  anat: /data/sub-01/ses-2/anat.nii.gz
  brain_mask: none
- subject_id: sub-02
  unique_id: ses-1
  anat: /data/sub-02/ses-1/anat.nii.gz
";

fn args(dir: &Path, pipeline: &str) -> Result<Args> {
    let config = dir.join("pipeline.yml");
    std::fs::write(&config, pipeline)?;
    let data = dir.join("data.yml");
    std::fs::write(&data, DATA_YML)?;
    Ok(Args {
        config: config.to_string_lossy().into_owned(),
        data_config: data.to_string_lossy().into_owned(),
        output: dir.join("graphs").to_string_lossy().into_owned(),
        subjects: Vec::with_capacity(0),
        verbose: 1,
        dry_run: false,
    })
}

#[test]
fn test_app_writes_manifests() -> Result<()> {
    let dir = tempdir()?;
    let settings = args(dir.path(), PIPELINE_YML)?.try_into()?;
    App::new(settings).run()?;

    for subject in ["sub-01", "sub-02"] {
        let path = dir.path().join("graphs").join(subject).join("graph.json");
        assert!(path.exists(), "manifest for {subject} exists");
        let manifest: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(manifest["subject"], subject);
        let nodes = manifest["nodes"].as_array().map(Vec::len).unwrap_or(0);
        assert!(nodes > 0);
        assert_eq!(manifest["nodes"][0]["stage"], 0);
        assert!(manifest["sinks"].as_array().is_some_and(|s| !s.is_empty()));
    }
    Ok(())
}

#[test]
fn test_app_subject_filter_and_dry_run() -> Result<()> {
    let dir = tempdir()?;
    let mut args = args(dir.path(), PIPELINE_YML)?;
    args.subjects = vec![String::from("sub-02")];
    args.dry_run = true;
    App::new(args.try_into()?).run()?;
    assert!(!dir.path().join("graphs").exists());

    let mut args = self::args(dir.path(), PIPELINE_YML)?;
    args.subjects = vec![String::from("sub-03")];
    assert!(App::new(args.try_into()?).run().is_err());
    Ok(())
}

#[test]
fn test_app_reports_every_failed_subject() -> Result<()> {
    let dir = tempdir()?;
    let pipeline = "\
already_skullstripped: true
reg_option: [ANTS]
reg_with_skull: [true]
";
    let settings = args(dir.path(), pipeline)?.try_into()?;
    let e = App::new(settings).run().err().ok_or_else(|| anyhow::anyhow!("expected failure"))?;
    let agg = e.downcast_ref::<AggregatedErrors>();
    assert!(matches!(agg, Some(AggregatedErrors(_, 2))));
    assert!(!dir.path().join("graphs/sub-01/graph.json").exists());
    Ok(())
}

#[test]
fn test_app_rejects_ids_that_leave_output_dir() -> Result<()> {
    let dir = tempdir()?;
    for (subject, session) in [("../escaped", "ses-1"), ("sub-01", "../../escaped"), ("", "ses-1")] {
        let args = args(dir.path(), PIPELINE_YML)?;
        let data = format!("- subject_id: '{subject}'\n  unique_id: '{session}'\n  anat: /data/anat.nii.gz\n");
        std::fs::write(&args.data_config, data)?;

        let e = App::new(args.try_into()?).run().err().ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert!(e.chain().any(|c| matches!(c.downcast_ref::<SessionError>(), Some(SessionError::InvalidId(..)))));
        assert!(!dir.path().join("escaped").exists());
    }
    Ok(())
}
