//! Compile a declarative definition into the node arena.
//!
//! Compilation runs in two passes. The first allocates every node in
//! document order and checks the tree's shape; the second resolves
//! transition targets and looks up the named guards, actions and actor
//! sources. Problems from both passes are accumulated with `Validation`,
//! so a broken definition reports everything wrong with it at once.

use super::error::{DefinitionError, InvalidDefinition};
use super::machine::Registry;
use crate::core::config::{
    ActionConfig, BuiltinAction, MachineConfig, StateConfig, TransitionConfig, TransitionsConfig,
};
use crate::core::event::{after_type, done_actor_type, error_actor_type, EventSelector};
use crate::core::node::{Delay, Invocation, NamedGuard, StateNode, Transition, Trigger};
use crate::core::{Action, HistoryKind, Machine, NamedAction, NodeId, ResolverOptions, StateKind};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<DefinitionError>>;

pub(crate) fn compile(
    config: &MachineConfig,
    registry: &Registry,
    options: ResolverOptions,
) -> Result<Machine, InvalidDefinition> {
    let mut compiler = Compiler {
        registry,
        nodes: Vec::new(),
        configs: Vec::new(),
        by_id: HashMap::new(),
        checks: Vec::new(),
    };

    let root = compiler.allocate(&config.id, config.id.clone(), &config.root, None);
    if let Some(kind @ (StateKind::History | StateKind::Final)) = config.root.kind {
        compiler.fail(DefinitionError::InvalidRoot { kind });
    }
    for node in root..compiler.nodes.len() {
        compiler.link(node);
    }

    let Compiler {
        nodes,
        by_id,
        checks,
        ..
    } = compiler;
    match Validation::all_vec(checks).map(|_| ()) {
        Validation::Failure(errors) => Err(InvalidDefinition(errors.iter().cloned().collect())),
        Validation::Success(()) => Ok(Machine {
            id: config.id.clone(),
            nodes,
            by_id,
            context: config.context.clone(),
            options,
            sources: registry.sources.clone(),
        }),
    }
}

struct Compiler<'a> {
    registry: &'a Registry,
    nodes: Vec<StateNode>,
    configs: Vec<&'a StateConfig>,
    by_id: HashMap<String, NodeId>,
    checks: Vec<Check>,
}

impl<'a> Compiler<'a> {
    fn fail(&mut self, error: DefinitionError) {
        self.checks.push(Validation::fail(error));
    }

    fn check(&mut self, ok: bool, error: impl FnOnce() -> DefinitionError) {
        let check = if ok {
            Validation::success(())
        } else {
            Validation::fail(error())
        };
        self.checks.push(check);
    }

    /// First pass: allocate `config` and its descendants in pre-order.
    fn allocate(
        &mut self,
        key: &str,
        path: String,
        config: &'a StateConfig,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = config.id.clone().unwrap_or(path);
        let kind = config.kind.unwrap_or(if config.states.is_empty() {
            StateKind::Atomic
        } else {
            StateKind::Compound
        });

        let node = self.nodes.len();
        let duplicate = self.by_id.insert(id.clone(), node).is_some();
        self.check(!duplicate, || DefinitionError::DuplicateId { id: id.clone() });

        self.nodes.push(StateNode {
            id: id.clone(),
            key: key.to_string(),
            kind,
            parent,
            children: Vec::new(),
            initial: None,
            history: config.history.unwrap_or(HistoryKind::Shallow),
            history_default: Vec::new(),
            transitions: Vec::new(),
            entry: Vec::new(),
            exit: Vec::new(),
            delays: Vec::new(),
            invocations: Vec::new(),
            output: config.output.clone().unwrap_or(Value::Null),
        });
        self.configs.push(config);

        let children: Vec<NodeId> = config
            .states
            .iter()
            .map(|(child_key, child)| {
                self.allocate(child_key, format!("{id}.{child_key}"), child, Some(node))
            })
            .collect();

        let accepts_children = matches!(kind, StateKind::Compound | StateKind::Parallel);
        self.check(accepts_children || children.is_empty(), || {
            DefinitionError::ChildrenNotAllowed {
                node: id.clone(),
                kind,
            }
        });

        if kind == StateKind::History {
            let container = parent.map(|p| self.nodes[p].kind);
            if let Some(parent_kind) = container {
                self.check(
                    matches!(parent_kind, StateKind::Compound | StateKind::Parallel),
                    || DefinitionError::HistoryOutsideContainer { node: id.clone() },
                );
            }
        }

        if kind == StateKind::Compound {
            match &config.initial {
                None => self.fail(DefinitionError::MissingInitial { node: id.clone() }),
                Some(initial) => {
                    let found = children.iter().copied().find(|&child| {
                        self.nodes[child].key == *initial && !self.nodes[child].is_history()
                    });
                    match found {
                        Some(child) => self.nodes[node].initial = Some(child),
                        None => self.fail(DefinitionError::UnknownInitial {
                            node: id.clone(),
                            initial: initial.clone(),
                        }),
                    }
                }
            }
        }

        self.nodes[node].children = children;
        node
    }

    /// Second pass: transitions, actions, delays, invocations.
    fn link(&mut self, node: NodeId) {
        let config = self.configs[node];
        let mut transitions = Vec::new();

        for (descriptor, descriptors) in &config.on {
            let trigger = Trigger::Event(EventSelector::parse(descriptor));
            self.transitions(node, &trigger, descriptors, &mut transitions);
        }

        if let Some(always) = &config.always {
            self.transitions(node, &Trigger::Always, always, &mut transitions);
        }

        let mut delays = Vec::new();
        for (key, descriptors) in &config.after {
            let Ok(ms) = key.parse::<u64>() else {
                self.fail(DefinitionError::InvalidDelay {
                    node: self.nodes[node].id.clone(),
                    delay: key.clone(),
                });
                continue;
            };
            let event = after_type(ms, &self.nodes[node].id);
            let trigger = Trigger::Event(EventSelector::Exact(event.clone()));
            self.transitions(node, &trigger, descriptors, &mut transitions);
            delays.push(Delay {
                after: Duration::from_millis(ms),
                event,
            });
        }

        let mut invocations = Vec::new();
        for (index, invoke) in config.invoke.iter().enumerate() {
            let id = invoke
                .id
                .clone()
                .unwrap_or_else(|| format!("{}:invocation[{index}]", self.nodes[node].id));
            self.require_source(node, &invoke.src);
            if let Some(on_done) = &invoke.on_done {
                let trigger = Trigger::Event(EventSelector::Exact(done_actor_type(&id)));
                self.transitions(node, &trigger, on_done, &mut transitions);
            }
            if let Some(on_error) = &invoke.on_error {
                let trigger = Trigger::Event(EventSelector::Exact(error_actor_type(&id)));
                self.transitions(node, &trigger, on_error, &mut transitions);
            }
            invocations.push(Invocation {
                id,
                src: invoke.src.clone(),
                input: invoke.input.clone(),
            });
        }

        let entry = self.actions(node, &config.entry);
        let exit = self.actions(node, &config.exit);

        let history_default = match (self.nodes[node].kind, &config.target) {
            (StateKind::History, Some(target)) => self.targets(node, &[target.clone()]),
            _ => Vec::new(),
        };

        let state = &mut self.nodes[node];
        state.transitions = transitions;
        state.delays = delays;
        state.invocations = invocations;
        state.entry = entry;
        state.exit = exit;
        state.history_default = history_default;
    }

    fn transitions(
        &mut self,
        node: NodeId,
        trigger: &Trigger,
        descriptors: &TransitionsConfig,
        out: &mut Vec<Transition>,
    ) {
        for descriptor in descriptors.clone().into_vec() {
            out.push(self.transition(node, trigger.clone(), &descriptor));
        }
    }

    fn transition(
        &mut self,
        node: NodeId,
        trigger: Trigger,
        descriptor: &TransitionConfig,
    ) -> Transition {
        let targets = descriptor
            .target
            .as_ref()
            .map(|targets| self.targets(node, &targets.to_vec()))
            .unwrap_or_default();

        let guard = descriptor.guard.as_ref().and_then(|name| {
            let guard = self.registry.guards.get(name).cloned();
            if guard.is_none() {
                self.fail(DefinitionError::UnknownGuard {
                    node: self.nodes[node].id.clone(),
                    guard: name.clone(),
                });
            }
            guard.map(|guard| NamedGuard {
                name: name.clone(),
                guard,
            })
        });

        Transition {
            source: node,
            trigger,
            guard,
            targets,
            actions: self.actions(node, &descriptor.actions),
            internal: descriptor.internal,
        }
    }

    fn targets(&mut self, node: NodeId, targets: &[String]) -> Vec<NodeId> {
        let mut resolved = Vec::new();
        for target in targets {
            match self.resolve_target(node, target) {
                Some(found) => resolved.push(found),
                None => self.fail(DefinitionError::DanglingTarget {
                    node: self.nodes[node].id.clone(),
                    target: target.clone(),
                }),
            }
        }
        resolved
    }

    /// `#id` is absolute, `.child` is relative to the source, anything else
    /// is relative to the source's parent.
    fn resolve_target(&self, source: NodeId, target: &str) -> Option<NodeId> {
        if let Some(id) = target.strip_prefix('#') {
            return self.by_id.get(id).copied();
        }
        if let Some(path) = target.strip_prefix('.') {
            return self.descend(source, path);
        }
        let base = self.nodes[source].parent.unwrap_or(source);
        self.descend(base, target)
    }

    fn descend(&self, from: NodeId, path: &str) -> Option<NodeId> {
        path.split('.').try_fold(from, |current, key| {
            self.nodes[current]
                .children
                .iter()
                .copied()
                .find(|&child| self.nodes[child].key == key)
        })
    }

    fn require_source(&mut self, node: NodeId, src: &str) {
        let known = self.registry.sources.contains_key(src);
        let id = self.nodes[node].id.clone();
        self.check(known, || DefinitionError::UnknownActorSource {
            node: id,
            src: src.to_string(),
        });
    }

    fn actions(&mut self, node: NodeId, configs: &[ActionConfig]) -> Vec<Action> {
        let mut actions = Vec::new();
        for config in configs {
            let action = match config {
                ActionConfig::Named(name) => match self.registry.actions.get(name) {
                    Some(NamedAction::Assign(assigner)) => Action::Assign {
                        name: name.clone(),
                        assigner: assigner.clone(),
                    },
                    Some(NamedAction::Effect(action)) => Action::Execute {
                        name: name.clone(),
                        action: action.clone(),
                    },
                    None => {
                        self.fail(DefinitionError::UnknownAction {
                            node: self.nodes[node].id.clone(),
                            action: name.clone(),
                        });
                        continue;
                    }
                },
                ActionConfig::Builtin(builtin) => match builtin {
                    BuiltinAction::Assign { assignment } => Action::Patch(assignment.clone()),
                    BuiltinAction::Raise { event } => Action::Raise(event.clone()),
                    BuiltinAction::SendParent { event } => Action::SendParent(event.clone()),
                    BuiltinAction::SendTo { to, event } => Action::SendTo {
                        to: to.clone(),
                        event: event.clone(),
                    },
                    BuiltinAction::Spawn { id, src, input } => {
                        self.require_source(node, src);
                        Action::Spawn {
                            id: id.clone(),
                            src: src.clone(),
                            input: input.clone(),
                        }
                    }
                    BuiltinAction::Stop { id } => Action::Stop { id: id.clone() },
                    BuiltinAction::Log { message } => Action::Log {
                        message: message.clone(),
                    },
                },
            };
            actions.push(action);
        }
        actions
    }
}
