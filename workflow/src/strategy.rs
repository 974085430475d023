use crate::{ArtifactRef, Error, ResourcePool, StepKind, STEP_DELIM};

const BASELINE_LABEL: &str = "baseline";

/// One candidate pipeline variant: its named outputs, the steps applied so far,
/// and the leaf used as default input to the next step.
#[derive(Debug, Default, Clone)]
pub struct Strategy {
    pool: ResourcePool,
    history: Vec<StepKind>,
    leaf: Option<ArtifactRef>,
    /// Session this strategy was seeded for; `None` for subject-level strategies.
    session: Option<String>,
}

impl Strategy {
    /// Create an empty strategy for one session.
    pub fn for_session(session: impl Into<String>) -> Self {
        Self {
            session: Some(session.into()),
            ..Self::default()
        }
    }

    /// Create a subject-level strategy that starts from `leaf`, carrying over
    /// `history` so its label stays distinct from other families.
    pub fn seeded(history: Vec<StepKind>, leaf: ArtifactRef) -> Self {
        Self {
            history,
            leaf: Some(leaf),
            ..Self::default()
        }
    }

    /// Independent copy: later mutation of either side never shows in the other.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    // resource pool /////////////
    pub fn get(&self, name: &str) -> Result<ArtifactRef, Error> {
        self.pool.get(name)
    }

    pub fn put(&mut self, name: &str, artifact: ArtifactRef, override_existing: bool) -> Result<(), Error> {
        self.pool.put(name, artifact, override_existing)
    }

    #[inline]
    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    // history ///////////////////
    /// Record that a step of `kind` was applied to this strategy.
    pub fn append_step(&mut self, kind: StepKind) {
        self.history.push(kind);
    }

    /// true if a step of `kind` has already been applied.
    pub fn has_step(&self, kind: StepKind) -> bool {
        self.history.contains(&kind)
    }

    #[inline]
    pub fn history(&self) -> &[StepKind] {
        &self.history
    }

    /// Deterministic label derived from applied-step history,
    /// e.g. "afni_skullstrip+anat_mni_flirt_register".
    pub fn label(&self) -> String {
        if self.history.is_empty() {
            return BASELINE_LABEL.to_owned();
        }
        let mut label = String::with_capacity(self.history.len() * 24);
        for (i, kind) in self.history.iter().enumerate() {
            if i > 0 {
                label.push(STEP_DELIM);
            }
            label.push_str(kind.as_str());
        }
        label
    }

    // leaf //////////////////////
    pub fn set_leaf(&mut self, leaf: ArtifactRef) {
        self.leaf = Some(leaf);
    }

    pub fn leaf(&self) -> Result<ArtifactRef, Error> {
        self.leaf.ok_or(Error::MissingLeaf)
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{NodeId, SlotIdx};

    fn r(node: usize) -> ArtifactRef {
        ArtifactRef::new(NodeId::from(node), SlotIdx::from(0))
    }

    #[test]
    fn test_fork_independence() -> Result<(), Error> {
        let mut parent = Strategy::for_session("ses-1");
        parent.put("anatomical", r(0), false)?;
        parent.put("anatomical_brain", r(1), false)?;
        parent.append_step(StepKind::AfniSkullstrip);
        parent.set_leaf(r(1));

        let mut fork = parent.fork();
        assert_eq!(fork.leaf()?, r(1));

        fork.put("anatomical_to_standard", r(2), false)?;
        fork.put("anatomical_brain", r(3), true)?;
        fork.append_step(StepKind::FlirtRegister);
        fork.set_leaf(r(2));

        assert!(matches!(parent.get("anatomical_to_standard"), Err(Error::ResourceNotFound(_))));
        assert_eq!(parent.get("anatomical_brain")?, r(1));
        assert!(!parent.has_step(StepKind::FlirtRegister));
        assert_eq!(parent.leaf()?, r(1));
        assert_eq!(fork.session(), Some("ses-1"));
        Ok(())
    }

    #[test]
    fn test_label() {
        let mut s = Strategy::default();
        assert_eq!(s.label(), "baseline");
        s.append_step(StepKind::AfniSkullstrip);
        s.append_step(StepKind::FlirtRegister);
        assert_eq!(s.label(), "afni_skullstrip+anat_mni_flirt_register");
        assert!(s.has_step(StepKind::AfniSkullstrip));
        assert!(!s.has_step(StepKind::AntsRegister));
    }

    #[test]
    fn test_missing_leaf() {
        let s = Strategy::for_session("ses-1");
        assert!(matches!(s.leaf(), Err(Error::MissingLeaf)));
    }
}
