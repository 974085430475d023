use anyhow::{Context, Result};

use crate::{
    ArtifactRef, Error, Graph, Literal, Node, NodeId, NodeInput, StepBackend, StepConfigurationError,
    StepKind, StepRequest, Strategy,
};

/// An input as declared by a stage, before it's resolved against a strategy.
#[derive(Debug, Clone)]
pub enum Input {
    /// Named resource in the strategy's pool.
    Resource(String),
    /// The strategy's current leaf.
    Leaf,
    /// An artifact that doesn't live in any pool (e.g. a shared template node).
    Artifact(ArtifactRef),
    Literal(Literal),
}

/// Declaration of one step to attach to the graph.
#[derive(Debug, Clone)]
pub struct StepCall {
    kind: StepKind,
    name: String,
    inputs: Vec<(String, Input)>,
    /// (output slot, resource name)
    outputs: Vec<(String, String)>,
    primary: Option<String>,
    override_existing: bool,
}

impl StepCall {
    pub fn new(kind: StepKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            inputs: Vec::with_capacity(8),
            outputs: Vec::with_capacity(4),
            primary: None,
            override_existing: false,
        }
    }

    /// Wire `param` from the pool resource `resource`.
    pub fn resource(mut self, param: &str, resource: &str) -> Self {
        self.inputs.push((param.to_owned(), Input::Resource(resource.to_owned())));
        self
    }

    /// Wire `param` from the strategy's leaf.
    pub fn leaf(mut self, param: &str) -> Self {
        self.inputs.push((param.to_owned(), Input::Leaf));
        self
    }

    /// Wire `param` directly from an artifact.
    pub fn artifact(mut self, param: &str, artifact: ArtifactRef) -> Self {
        self.inputs.push((param.to_owned(), Input::Artifact(artifact)));
        self
    }

    /// Set `param` to a literal value.
    pub fn param(mut self, param: &str, value: impl Into<Literal>) -> Self {
        self.inputs.push((param.to_owned(), Input::Literal(value.into())));
        self
    }

    /// Write output `slot` into the pool as `resource`.
    pub fn output(mut self, slot: &str, resource: &str) -> Self {
        self.outputs.push((slot.to_owned(), resource.to_owned()));
        self
    }

    /// Make output `slot` the strategy's new leaf.
    pub fn primary(mut self, slot: &str) -> Self {
        self.primary = Some(slot.to_owned());
        self
    }

    /// Let this step's outputs supersede existing resources of the same name.
    pub fn override_existing(mut self) -> Self {
        self.override_existing = true;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Outputs of a step that was just attached to the graph.
#[derive(Debug, Clone)]
pub struct Registered {
    pub node: NodeId,
    name: String,
    outputs: Vec<(String, ArtifactRef)>,
}

impl Registered {
    /// Artifact for output `slot`.
    pub fn output(&self, slot: &str) -> Result<ArtifactRef, Error> {
        self.outputs
            .iter()
            .find(|(s, _)| s == slot)
            .map(|(_, a)| *a)
            .ok_or_else(|| {
                StepConfigurationError::UnknownOutput {
                    step: self.name.clone(),
                    slot: slot.to_owned(),
                }
                .into()
            })
    }

    /// Artifacts whose slot name starts with `prefix`, in declared order.
    pub fn outputs_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = ArtifactRef> + 'a {
        self.outputs
            .iter()
            .filter(move |(s, _)| s.starts_with(prefix))
            .map(|(_, a)| *a)
    }
}

/// The only way nodes enter the execution graph.
///
/// Every call adds exactly one node. Inputs are resolved before the node is
/// added and pool writes are checked before it's added, so a failed call
/// leaves both graph and strategy unchanged.
pub struct Registrar<B> {
    graph: Graph,
    backend: B,
}

impl<B: StepBackend> Registrar<B> {
    pub fn new(backend: B) -> Self {
        Self {
            graph: Graph::default(),
            backend,
        }
    }

    #[inline]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Consume the registrar and return the finished graph.
    pub fn into_graph(self) -> Graph {
        self.graph
    }

    /// Attach a step that reads from and writes to `strategy`'s pool.
    /// Appends the step's kind to the strategy's history, and moves the leaf
    /// to the primary output if one is declared.
    pub fn register(&mut self, strategy: &mut Strategy, call: StepCall) -> Result<Registered> {
        let name = call.name.clone();
        self.try_register(strategy, call)
            .with_context(|| format!("while registering step \"{name}\" in strategy {}", strategy.label()))
    }

    /// Attach a step that doesn't belong to any strategy (data sources,
    /// shared templates, groupwise aggregation). Its inputs must be artifacts
    /// or literals.
    pub fn register_shared(&mut self, call: StepCall) -> Result<Registered> {
        let name = call.name.clone();
        self.try_register_shared(call)
            .with_context(|| format!("while registering shared step \"{name}\""))
    }

    fn try_register(&mut self, strategy: &mut Strategy, call: StepCall) -> Result<Registered, Error> {
        let StepCall {
            kind,
            name,
            inputs,
            outputs,
            primary,
            override_existing,
        } = call;

        let mut resolved = Vec::with_capacity(inputs.len());
        for (param, input) in inputs {
            let value = match input {
                Input::Resource(resource) => NodeInput::Artifact(strategy.get(&resource)?),
                Input::Leaf => NodeInput::Artifact(strategy.leaf()?),
                Input::Artifact(artifact) => NodeInput::Artifact(artifact),
                Input::Literal(lit) => NodeInput::Literal(lit),
            };
            resolved.push((param, value));
        }

        for (i, (_, resource)) in outputs.iter().enumerate() {
            let repeated = outputs[..i].iter().any(|(_, r)| r == resource);
            if repeated || (!override_existing && strategy.pool().contains(resource)) {
                return Err(Error::ResourceCollision(resource.clone()));
            }
        }

        let registered = self.add_node(kind, name, resolved, &outputs, primary.as_deref())?;

        for (slot, resource) in &outputs {
            strategy.put(resource, registered.output(slot)?, override_existing)?;
        }
        strategy.append_step(kind);
        if let Some(slot) = &primary {
            strategy.set_leaf(registered.output(slot)?);
        }
        Ok(registered)
    }

    fn try_register_shared(&mut self, call: StepCall) -> Result<Registered, Error> {
        let StepCall {
            kind,
            name,
            inputs,
            outputs,
            primary,
            override_existing,
        } = call;
        if !outputs.is_empty() || primary.is_some() || override_existing {
            return Err(Error::SharedResourceOutput(name));
        }
        let mut resolved = Vec::with_capacity(inputs.len());
        for (param, input) in inputs {
            let value = match input {
                Input::Artifact(artifact) => NodeInput::Artifact(artifact),
                Input::Literal(lit) => NodeInput::Literal(lit),
                Input::Resource(_) | Input::Leaf => {
                    return Err(Error::SharedResourceInput(name, param));
                }
            };
            resolved.push((param, value));
        }
        self.add_node(kind, name, resolved, &[], None)
    }

    fn add_node(
        &mut self,
        kind: StepKind,
        name: String,
        inputs: Vec<(String, NodeInput)>,
        declared: &[(String, String)],
        primary: Option<&str>,
    ) -> Result<Registered, Error> {
        let request = StepRequest {
            kind,
            name: &name,
            inputs: &inputs,
        };
        let slots = self.backend.output_slots(&request)?;

        for slot in declared.iter().map(|(s, _)| s.as_str()).chain(primary) {
            if !slots.iter().any(|s| s == slot) {
                return Err(StepConfigurationError::UnknownOutput {
                    step: name,
                    slot: slot.to_owned(),
                }
                .into());
            }
        }

        log::debug!("registering {} node {name} with {} outputs", kind, slots.len());
        let node = Node {
            name: name.clone(),
            kind,
            inputs,
            outputs: slots.clone(),
        };
        let (node, refs) = self.graph.add_node(node)?;
        Ok(Registered {
            node,
            name,
            outputs: slots.into_iter().zip(refs).collect(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Backend that accepts anything and produces the slots named in a
    /// comma-separated `slots` literal.
    struct Echo;

    impl StepBackend for Echo {
        fn output_slots(&self, request: &StepRequest<'_>) -> Result<Vec<String>, StepConfigurationError> {
            match request.input("slots").and_then(NodeInput::literal) {
                Some(Literal::Str(s)) => Ok(s.split(',').map(str::to_owned).collect()),
                _ => Err(StepConfigurationError::MissingInput {
                    step: request.name.to_owned(),
                    input: "slots".to_owned(),
                }),
            }
        }
    }

    fn seeded(reg: &mut Registrar<Echo>) -> Result<Strategy> {
        let anat = reg.register_shared(
            StepCall::new(StepKind::AnatGather, "anat_gather_s1").param("slots", "anat"),
        )?;
        let mut s = Strategy::for_session("s1");
        s.put("anatomical", anat.output("anat")?, false)?;
        Ok(s)
    }

    fn has_error(e: &anyhow::Error, f: impl Fn(&Error) -> bool) -> bool {
        e.chain().any(|c| c.downcast_ref::<Error>().is_some_and(&f))
    }

    #[test]
    fn test_register_wires_pool_history_and_leaf() -> Result<()> {
        let mut reg = Registrar::new(Echo);
        let mut s = seeded(&mut reg)?;
        let out = reg.register(
            &mut s,
            StepCall::new(StepKind::AfniSkullstrip, "anat_preproc_afni_s1")
                .resource("anat", "anatomical")
                .param("slots", "brain,reorient")
                .output("brain", "anatomical_brain")
                .output("reorient", "anatomical_reorient")
                .primary("brain"),
        )?;
        assert_eq!(reg.graph().len(), 2);
        assert_eq!(s.get("anatomical_brain")?, out.output("brain")?);
        assert_eq!(s.leaf()?, out.output("brain")?);
        assert_eq!(s.history(), [StepKind::AfniSkullstrip]);

        let (_, node) = reg
            .graph()
            .find("anat_preproc_afni_s1")
            .ok_or_else(|| anyhow::anyhow!("node not added"))?;
        assert_eq!(node.dependencies().count(), 1);
        Ok(())
    }

    #[test]
    fn test_missing_resource_adds_no_node() -> Result<()> {
        let mut reg = Registrar::new(Echo);
        let mut s = seeded(&mut reg)?;
        let res = reg.register(
            &mut s,
            StepCall::new(StepKind::FlirtRegister, "flirt")
                .resource("input_brain", "anatomical_brain")
                .param("slots", "output_brain"),
        );
        let e = res.err().ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert!(has_error(&e, |e| matches!(e, Error::ResourceNotFound(n) if n == "anatomical_brain")));
        assert_eq!(reg.graph().len(), 1);
        assert!(s.history().is_empty());
        Ok(())
    }

    #[test]
    fn test_collision_unless_override() -> Result<()> {
        let mut reg = Registrar::new(Echo);
        let mut s = seeded(&mut reg)?;
        let call = |name: &str| {
            StepCall::new(StepKind::FlirtRegister, name)
                .resource("input_brain", "anatomical")
                .param("slots", "output_brain")
                .output("output_brain", "anatomical_to_standard")
        };
        reg.register(&mut s, call("flirt"))?;
        let res = reg.register(&mut s, call("fnirt"));
        let e = res.err().ok_or_else(|| anyhow::anyhow!("expected collision"))?;
        assert!(has_error(&e, |e| matches!(e, Error::ResourceCollision(_))));
        assert_eq!(reg.graph().len(), 2);

        let fnirt = reg.register(&mut s, call("fnirt").override_existing())?;
        assert_eq!(s.get("anatomical_to_standard")?, fnirt.output("output_brain")?);
        Ok(())
    }

    #[test]
    fn test_undeclared_slot_is_step_error() -> Result<()> {
        let mut reg = Registrar::new(Echo);
        let mut s = seeded(&mut reg)?;
        let res = reg.register(
            &mut s,
            StepCall::new(StepKind::FlirtRegister, "flirt")
                .leaf("input_brain")
                .param("slots", "output_brain"),
        );
        let e = res.err().ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert!(has_error(&e, |e| matches!(e, Error::MissingLeaf)));

        s.set_leaf(s.get("anatomical")?);
        let res = reg.register(
            &mut s,
            StepCall::new(StepKind::FlirtRegister, "flirt")
                .leaf("input_brain")
                .param("slots", "output_brain")
                .output("linear_xfm", "anatomical_to_mni_linear_xfm"),
        );
        let e = res.err().ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert!(has_error(&e, |e| matches!(e, Error::StepConfiguration(_))));
        assert_eq!(reg.graph().len(), 1);
        Ok(())
    }

    #[test]
    fn test_shared_step_rejects_pool_inputs() {
        let mut reg = Registrar::new(Echo);
        let res = reg.register_shared(
            StepCall::new(StepKind::LongitudinalMerge, "merge").resource("in1", "anatomical_brain"),
        );
        assert!(res.is_err());
        assert!(reg.graph().is_empty());
    }

    #[test]
    fn test_shared_step_rejects_pool_outputs() -> Result<()> {
        let mut reg = Registrar::new(Echo);
        let calls = [
            StepCall::new(StepKind::LongitudinalMerge, "merge").output("out", "anatomical_brain"),
            StepCall::new(StepKind::LongitudinalMerge, "merge").primary("out"),
            StepCall::new(StepKind::LongitudinalMerge, "merge").override_existing(),
        ];
        for call in calls {
            let e = reg
                .register_shared(call.param("slots", "out"))
                .err()
                .ok_or_else(|| anyhow::anyhow!("expected failure"))?;
            assert!(has_error(&e, |e| matches!(e, Error::SharedResourceOutput(n) if n == "merge")));
        }
        assert!(reg.graph().is_empty());
        Ok(())
    }
}
