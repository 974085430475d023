use anyhow::{Context, Result};

use workflow::{Registrar, StepBackend, StepCall, StepKind, Strategy, StrategySet};

use super::SubjectBuilder;
use crate::config::{PipelineConfig, Session, SkullstripOption};

const MASK: &str = "anatomical_brain_mask";

/// Skull-strip methods, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Mask,
    Already,
    Afni,
    Fsl,
}

const METHODS: [Method; 4] = [Method::Mask, Method::Already, Method::Afni, Method::Fsl];

impl Method {
    fn kind(self) -> StepKind {
        match self {
            Self::Mask => StepKind::MaskSkullstrip,
            Self::Already => StepKind::AlreadySkullstripped,
            Self::Afni => StepKind::AfniSkullstrip,
            Self::Fsl => StepKind::FslSkullstrip,
        }
    }

    /// Short name used in node names.
    fn tag(self) -> &'static str {
        match self {
            Self::Mask => "mask",
            Self::Already => "already",
            Self::Afni => "afni",
            Self::Fsl => "fsl",
        }
    }

    /// A session with its own brain mask only uses the mask; otherwise
    /// already-stripped input wins over any configured method.
    fn applies(self, config: &PipelineConfig, has_mask: bool) -> bool {
        match self {
            Self::Mask => has_mask,
            Self::Already => !has_mask && config.already_skullstripped,
            Self::Afni => !has_mask && !config.already_skullstripped && config.has_skullstrip(SkullstripOption::Afni),
            Self::Fsl => !has_mask && !config.already_skullstripped && config.has_skullstrip(SkullstripOption::Bet),
        }
    }
}

impl<B: StepBackend> SubjectBuilder<'_, B> {
    /// Seed one strategy per session and fan out over skull-strip methods.
    pub fn preprocess(&mut self) -> Result<StrategySet> {
        let templates = self.templates()?;

        let mut seeds = Vec::with_capacity(self.sessions.len());
        for session in self.sessions {
            let mut strategy = Strategy::for_session(&session.unique_id);
            self.gather(session, &mut strategy)
                .with_context(|| format!("while gathering inputs for session {}", session.unique_id))?;
            strategy.put("template_cmass", templates.center_of_mass, false)?;
            seeds.push(strategy);
        }
        let mut set = StrategySet::seed(self.subject, seeds);

        let config = self.config;
        let subject = self.subject;
        let registrar = &mut self.registrar;
        set.for_each_fork_if(
            &METHODS,
            |s, m| Ok(m.applies(config, s.pool().contains(MASK))),
            |s, m, _| skullstrip(&mut *registrar, config, subject, s, *m),
        )?;

        // every session has to come out of here stripped:
        for s in &set {
            if !s.history().iter().any(StepKind::is_skullstrip) {
                let session = s.session().unwrap_or_default();
                return Err(workflow::Error::InvalidConfiguration(format!(
                    "no skull-strip method applies to session {session}"
                ))
                .into());
            }
        }
        log::info!(
            "subject {}: {} preprocessing strategies ({})",
            self.subject,
            set.len(),
            set.labels().join(", ")
        );
        Ok(set)
    }

    /// Data source nodes for one session.
    fn gather(&mut self, session: &Session, strategy: &mut Strategy) -> Result<()> {
        let suffix = format!("{}_{}", self.subject, session.unique_id);
        let call = self.gather_call(StepKind::AnatGather, format!("anat_gather_{suffix}"), session, &session.anat);
        let anat = self.registrar.register_shared(call)?;
        strategy.put("anatomical", anat.output("anat")?, false)?;

        if let Some(mask) = &session.brain_mask {
            let call = self.gather_call(StepKind::BrainMaskGather, format!("brain_gather_{suffix}"), session, mask);
            let mask = self.registrar.register_shared(call)?;
            strategy.put(MASK, mask.output("anat")?, false)?;
        }
        Ok(())
    }

    fn gather_call(&self, kind: StepKind, name: String, session: &Session, path: &str) -> StepCall {
        let call = StepCall::new(kind, name)
            .param("subject", self.subject)
            .param("anat", path)
            .param("dl_dir", self.config.working_directory.as_str());
        match &session.creds_path {
            Some(creds) => call.param("creds_path", creds.as_str()),
            None => call,
        }
    }
}

fn skullstrip<B: StepBackend>(
    registrar: &mut Registrar<B>,
    config: &PipelineConfig,
    subject: &str,
    strategy: &mut Strategy,
    method: Method,
) -> Result<()> {
    let session = strategy.session().unwrap_or_default().to_owned();
    let name = format!("anat_preproc_{}_{subject}_{session}", method.tag());
    let mut call = StepCall::new(method.kind(), name)
        .resource("anat", "anatomical")
        .resource("template_cmass", "template_cmass");
    call = match method {
        Method::Mask => call.resource("brain_mask", MASK),
        Method::Already => call,
        Method::Afni => call.param("shrink_factor", config.skullstrip_shrink_factor),
        Method::Fsl => call.param("frac", config.bet_frac),
    };
    let call = call
        .output("brain", "anatomical_brain")
        .output("reorient", "anatomical_reorient")
        .primary("brain");
    registrar.register(strategy, call)?;
    Ok(())
}
