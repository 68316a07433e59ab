//! Microstep and macrostep resolution.
//!
//! [`Machine::resolve`] is a pure function of the machine definition, the
//! current [`MachineState`] and one event. It selects the enabled
//! transitions, removes conflicts, exits and enters states, and keeps
//! taking eventless transitions and internally raised events until the
//! configuration is stable. Guards and assigners run here; every other
//! action is returned as an [`Effect`] for the actor to apply.

use super::action::{merge_patch, Action};
use super::configuration::Configuration;
use super::effect::Effect;
use super::error::ResolveError;
use super::event::Event;
use super::history::HistoryRecords;
use super::machine::{ConflictPolicy, Machine, MachineState, Step};
use super::node::{HistoryKind, NodeId, StateKind, Transition, TransitionRef, Trigger, ROOT};
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};

impl Machine {
    /// Resolve one event against `state`.
    ///
    /// The start signal against an empty configuration enters the initial
    /// configuration. Events that enable no transition leave the state
    /// unchanged and produce no effects.
    pub fn resolve(&self, state: &MachineState, event: &Event) -> Result<Step, ResolveError> {
        let mut run = Resolution::new(self, state, event);

        if state.configuration.is_empty() {
            if !event.is_init() {
                return Ok(run.finish());
            }
            run.enter_initial()?;
        } else {
            let enabled = run.select(Some(event))?;
            if enabled.is_empty() {
                return Ok(run.finish());
            }
            let enabled = run.remove_conflicts(enabled);
            run.microstep(&enabled)?;
        }

        run.settle()?;
        Ok(run.finish())
    }
}

/// Working state of a single macrostep.
struct Resolution<'m> {
    machine: &'m Machine,
    configuration: Configuration,
    context: Value,
    history: HistoryRecords,
    /// Event currently being processed: the external one, then each
    /// internal event in turn.
    current: Event,
    internal: VecDeque<Event>,
    effects: Vec<Effect>,
    done: bool,
}

impl<'m> Resolution<'m> {
    fn new(machine: &'m Machine, state: &MachineState, event: &Event) -> Self {
        Self {
            machine,
            configuration: state.configuration.clone(),
            context: state.context.clone(),
            history: state.history.clone(),
            current: event.clone(),
            internal: VecDeque::new(),
            effects: Vec::new(),
            done: false,
        }
    }

    fn finish(self) -> Step {
        Step {
            state: MachineState {
                configuration: self.configuration,
                context: self.context,
                history: self.history,
            },
            effects: self.effects,
        }
    }

    fn transition(&self, t: TransitionRef) -> &'m Transition {
        &self.machine.nodes[t.source].transitions[t.index]
    }

    fn enter_initial(&mut self) -> Result<(), ResolveError> {
        let mut entry = BTreeSet::new();
        self.add_descendants(ROOT, &mut entry);
        self.enter(entry)
    }

    /// Take eventless transitions, then internal events, until stable.
    fn settle(&mut self) -> Result<(), ResolveError> {
        let limit = self.machine.options.max_microsteps;
        let mut steps = 0;

        while !self.done {
            let mut enabled = self.select(None)?;
            if enabled.is_empty() {
                let Some(event) = self.internal.pop_front() else {
                    break;
                };
                self.current = event;
                enabled = self.select(Some(&self.current))?;
                if enabled.is_empty() {
                    continue;
                }
            }

            steps += 1;
            if steps > limit {
                return Err(ResolveError::MicrostepLimit { limit });
            }
            let enabled = self.remove_conflicts(enabled);
            self.microstep(&enabled)?;
        }
        Ok(())
    }

    /// Select enabled transitions: one per active leaf at most, found by
    /// walking from the leaf towards the root. `None` selects eventless
    /// transitions, whose guards see the current event.
    fn select(&self, trigger: Option<&Event>) -> Result<Vec<TransitionRef>, ResolveError> {
        let guard_event = trigger.unwrap_or(&self.current);
        let mut selected: Vec<TransitionRef> = Vec::new();

        for leaf in self.machine.leaves(&self.configuration) {
            let chain = std::iter::once(leaf).chain(self.machine.proper_ancestors(leaf, None));
            'walk: for node in chain {
                for candidate in self.candidates(node, trigger) {
                    if self.enabled(candidate, guard_event)? {
                        if !selected.contains(&candidate) {
                            selected.push(candidate);
                        }
                        break 'walk;
                    }
                }
            }
        }
        Ok(selected)
    }

    /// Transitions of `node` matching the trigger, exact matches first.
    fn candidates(&self, node: NodeId, trigger: Option<&Event>) -> Vec<TransitionRef> {
        let transitions = &self.machine.nodes[node].transitions;
        let refs = |exact: bool| {
            transitions
                .iter()
                .enumerate()
                .filter(move |(_, t)| match (&t.trigger, trigger) {
                    (Trigger::Always, None) => exact,
                    (Trigger::Event(selector), Some(event)) => {
                        selector.is_exact() == exact && selector.matches(&event.kind)
                    }
                    _ => false,
                })
                .map(move |(index, _)| TransitionRef {
                    source: node,
                    index,
                })
        };
        refs(true).chain(refs(false)).collect()
    }

    fn enabled(&self, t: TransitionRef, event: &Event) -> Result<bool, ResolveError> {
        match &self.transition(t).guard {
            None => Ok(true),
            Some(named) => {
                named
                    .guard
                    .check(&self.context, event)
                    .map_err(|message| ResolveError::Guard {
                        name: named.name.clone(),
                        message,
                    })
            }
        }
    }

    fn remove_conflicts(&self, selected: Vec<TransitionRef>) -> Vec<TransitionRef> {
        let mut kept: Vec<(TransitionRef, BTreeSet<NodeId>)> = Vec::new();

        for candidate in selected {
            let exits = self.exit_set(candidate);
            let mut preempted = false;
            let mut displaced = Vec::new();

            for (i, (other, other_exits)) in kept.iter().enumerate() {
                if exits.is_disjoint(other_exits) {
                    continue;
                }
                match self.machine.options.conflict_policy {
                    ConflictPolicy::DocumentOrder => {
                        preempted = true;
                    }
                    ConflictPolicy::DescendantFirst => {
                        if self.machine.is_descendant(candidate.source, other.source) {
                            displaced.push(i);
                        } else {
                            preempted = true;
                        }
                    }
                }
                if preempted {
                    break;
                }
            }

            if !preempted {
                for i in displaced.into_iter().rev() {
                    kept.remove(i);
                }
                kept.push((candidate, exits));
            }
        }
        kept.into_iter().map(|(t, _)| t).collect()
    }

    /// Node under which everything active is exited. `None` for targetless
    /// transitions, which exit nothing.
    fn domain(&self, t: TransitionRef) -> Option<NodeId> {
        let transition = self.transition(t);
        if transition.targets.is_empty() {
            return None;
        }
        let source = transition.source;
        let internal = transition.internal
            && self.machine.nodes[source].kind == StateKind::Compound
            && transition
                .targets
                .iter()
                .all(|&target| self.machine.is_descendant(target, source));
        if internal {
            return Some(source);
        }
        let mut states = vec![source];
        states.extend(transition.targets.iter().copied());
        Some(self.machine.lcca(&states))
    }

    fn exit_set(&self, t: TransitionRef) -> BTreeSet<NodeId> {
        match self.domain(t) {
            None => BTreeSet::new(),
            Some(domain) => self
                .configuration
                .iter()
                .filter(|&node| self.machine.is_descendant(node, domain))
                .collect(),
        }
    }

    fn microstep(&mut self, transitions: &[TransitionRef]) -> Result<(), ResolveError> {
        self.exit_states(transitions)?;

        for &t in transitions {
            for action in &self.transition(t).actions {
                self.run_action(action)?;
            }
        }

        let mut entry = BTreeSet::new();
        for &t in transitions {
            let Some(domain) = self.domain(t) else {
                continue;
            };
            let targets = &self.transition(t).targets;
            for &target in targets {
                self.add_descendants(target, &mut entry);
            }
            for &target in targets {
                self.add_ancestors(target, domain, &mut entry);
            }
        }
        self.enter(entry)
    }

    fn exit_states(&mut self, transitions: &[TransitionRef]) -> Result<(), ResolveError> {
        let exits: BTreeSet<NodeId> = transitions
            .iter()
            .flat_map(|&t| self.exit_set(t))
            .collect();
        let machine = self.machine;

        for &node in &exits {
            for &child in &machine.nodes[node].children {
                let history = &machine.nodes[child];
                if !history.is_history() {
                    continue;
                }
                let recorded: Vec<NodeId> = match history.history {
                    HistoryKind::Deep => self
                        .configuration
                        .iter()
                        .filter(|&s| machine.nodes[s].is_atomic() && machine.is_descendant(s, node))
                        .collect(),
                    HistoryKind::Shallow => machine.nodes[node]
                        .children
                        .iter()
                        .copied()
                        .filter(|&c| self.configuration.contains(c))
                        .collect(),
                };
                self.history = self.history.record(child, recorded);
            }
        }

        for &node in exits.iter().rev() {
            let state = &machine.nodes[node];
            for action in &state.exit {
                self.run_action(action)?;
            }
            for delay in &state.delays {
                self.effects.push(Effect::Cancel {
                    id: delay.event.clone(),
                });
            }
            for invocation in &state.invocations {
                self.effects.push(Effect::Stop {
                    id: invocation.id.clone(),
                });
            }
            self.configuration.remove(node);
        }
        Ok(())
    }

    /// Add `node` and its default descendants to the entry set. History
    /// nodes expand to the recorded configuration or their defaults.
    fn add_descendants(&self, node: NodeId, entry: &mut BTreeSet<NodeId>) {
        let machine = self.machine;
        let state = &machine.nodes[node];

        if state.is_history() {
            let parent = state.parent.unwrap_or(ROOT);
            let restored: Vec<NodeId> = match self.history.get(node) {
                Some(recorded) => recorded.to_vec(),
                None if !state.history_default.is_empty() => state.history_default.clone(),
                None => machine.nodes[parent].initial.into_iter().collect(),
            };
            for &s in &restored {
                self.add_descendants(s, entry);
            }
            for &s in &restored {
                self.add_ancestors(s, parent, entry);
            }
            return;
        }

        entry.insert(node);
        match state.kind {
            StateKind::Compound => {
                if let Some(initial) = state.initial {
                    self.add_descendants(initial, entry);
                    self.add_ancestors(initial, node, entry);
                }
            }
            StateKind::Parallel => {
                for &child in &state.children {
                    if machine.nodes[child].is_history() || self.covers(child, entry) {
                        continue;
                    }
                    self.add_descendants(child, entry);
                }
            }
            _ => {}
        }
    }

    /// Add the ancestors of `node` below `until`, completing any parallel
    /// ancestor's other regions with their defaults.
    fn add_ancestors(&self, node: NodeId, until: NodeId, entry: &mut BTreeSet<NodeId>) {
        let machine = self.machine;
        for ancestor in machine.proper_ancestors(node, Some(until)) {
            entry.insert(ancestor);
            if machine.nodes[ancestor].kind != StateKind::Parallel {
                continue;
            }
            for &child in &machine.nodes[ancestor].children {
                if machine.nodes[child].is_history() || self.covers(child, entry) {
                    continue;
                }
                self.add_descendants(child, entry);
            }
        }
    }

    /// Whether the entry set already holds `node` or one of its descendants.
    fn covers(&self, node: NodeId, entry: &BTreeSet<NodeId>) -> bool {
        entry
            .iter()
            .any(|&s| s == node || self.machine.is_descendant(s, node))
    }

    fn enter(&mut self, entry: BTreeSet<NodeId>) -> Result<(), ResolveError> {
        let machine = self.machine;

        for node in entry {
            if !self.configuration.insert(node) {
                continue;
            }
            let state = &machine.nodes[node];
            for action in &state.entry {
                self.run_action(action)?;
            }
            for delay in &state.delays {
                self.effects.push(Effect::Schedule {
                    id: delay.event.clone(),
                    delay: delay.after,
                    event: Event::new(delay.event.clone()),
                });
            }
            for invocation in &state.invocations {
                self.effects.push(Effect::Spawn {
                    id: invocation.id.clone(),
                    src: invocation.src.clone(),
                    input: invocation.input.clone(),
                });
            }
            if state.kind == StateKind::Final {
                self.on_final_entered(node);
            }
        }
        Ok(())
    }

    fn on_final_entered(&mut self, node: NodeId) {
        let machine = self.machine;
        let Some(parent) = machine.nodes[node].parent else {
            return;
        };
        let output = machine.nodes[node].output.clone();

        if parent == ROOT {
            self.finish_machine(output);
            return;
        }
        self.internal
            .push_back(Event::done_state(&machine.nodes[parent].id, output));

        if let Some(grandparent) = machine.nodes[parent].parent {
            if machine.nodes[grandparent].kind == StateKind::Parallel
                && self.in_final_state(grandparent)
            {
                if grandparent == ROOT {
                    self.finish_machine(Value::Null);
                } else {
                    self.internal.push_back(Event::done_state(
                        &machine.nodes[grandparent].id,
                        Value::Null,
                    ));
                }
            }
        }
    }

    fn finish_machine(&mut self, output: Value) {
        if !self.done {
            self.done = true;
            self.effects.push(Effect::Done { output });
        }
    }

    fn in_final_state(&self, node: NodeId) -> bool {
        let machine = self.machine;
        let state = &machine.nodes[node];
        match state.kind {
            StateKind::Compound => state.children.iter().any(|&child| {
                machine.nodes[child].kind == StateKind::Final && self.configuration.contains(child)
            }),
            StateKind::Parallel => state
                .children
                .iter()
                .filter(|&&child| !machine.nodes[child].is_history())
                .all(|&child| self.in_final_state(child)),
            _ => false,
        }
    }

    fn run_action(&mut self, action: &Action) -> Result<(), ResolveError> {
        match action {
            Action::Assign { name, assigner } => {
                self.context = assigner
                    .apply(&self.context, &self.current)
                    .map_err(|message| ResolveError::Action {
                        name: name.clone(),
                        message,
                    })?;
            }
            Action::Patch(patch) => {
                self.context = merge_patch(&self.context, patch);
            }
            Action::Execute { name, action } => self.effects.push(Effect::Execute {
                name: name.clone(),
                action: action.clone(),
                context: self.context.clone(),
                event: self.current.clone(),
            }),
            Action::Raise(event) => self.internal.push_back(event.clone()),
            Action::SendParent(event) => self.effects.push(Effect::SendParent(event.clone())),
            Action::SendTo { to, event } => self.effects.push(Effect::SendTo {
                to: to.clone(),
                event: event.clone(),
            }),
            Action::Spawn { id, src, input } => self.effects.push(Effect::Spawn {
                id: id.clone(),
                src: src.clone(),
                input: input.clone(),
            }),
            Action::Stop { id } => self.effects.push(Effect::Stop { id: id.clone() }),
            Action::Log { message } => self.effects.push(Effect::Log {
                message: message.clone(),
                context: self.context.clone(),
            }),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MachineConfig;
    use crate::core::machine::ResolverOptions;
    use crate::core::{EffectAction, Guard};
    use serde_json::json;
    use std::sync::Arc;

    fn config(value: Value) -> MachineConfig {
        serde_json::from_value(value).unwrap()
    }

    /// Register a logging effect action for every name in `names`.
    fn machine_with_logs(value: Value, names: &[&str]) -> Arc<Machine> {
        let mut builder = Machine::builder(config(value));
        for name in names {
            builder = builder.action(*name, EffectAction::new(|_| Ok(())));
        }
        Arc::new(builder.build().unwrap())
    }

    fn executed(step: &Step) -> Vec<String> {
        step.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Execute { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    fn start(machine: &Machine) -> Step {
        machine.start(&machine.initial_state()).unwrap()
    }

    fn send(machine: &Machine, state: &MachineState, event: &str) -> Step {
        machine.resolve(state, &Event::new(event)).unwrap()
    }

    #[test]
    fn start_enters_default_descendants() {
        let machine = machine_with_logs(
            json!({
                "id": "m",
                "initial": "a",
                "states": {
                    "a": {
                        "initial": "a1",
                        "entry": "enterA",
                        "states": { "a1": { "entry": "enterA1" }, "a2": {} }
                    },
                    "b": {}
                }
            }),
            &["enterA", "enterA1"],
        );

        let step = start(&machine);

        assert_eq!(machine.state_value(&step.state.configuration), json!({ "a": "a1" }));
        assert_eq!(executed(&step), vec!["enterA", "enterA1"]);
        assert!(machine.is_legal(&step.state.configuration));
    }

    #[test]
    fn unhandled_event_changes_nothing() {
        let machine = machine_with_logs(
            json!({ "id": "m", "initial": "a", "states": { "a": { "on": { "GO": "b" } }, "b": {} } }),
            &[],
        );
        let started = start(&machine);

        let step = send(&machine, &started.state, "UNKNOWN");

        assert_eq!(step.state, started.state);
        assert!(step.effects.is_empty());
    }

    #[test]
    fn exit_transition_entry_order() {
        let machine = machine_with_logs(
            json!({
                "id": "m",
                "initial": "a",
                "states": {
                    "a": {
                        "initial": "a1",
                        "exit": "exitA",
                        "states": { "a1": { "exit": "exitA1", "on": { "GO": { "target": "#m.b.b1", "actions": "onGo" } } } }
                    },
                    "b": {
                        "initial": "b2",
                        "entry": "enterB",
                        "states": { "b1": { "entry": "enterB1" }, "b2": {} }
                    }
                }
            }),
            &["exitA", "exitA1", "onGo", "enterB", "enterB1"],
        );
        let started = start(&machine);

        let step = send(&machine, &started.state, "GO");

        assert_eq!(
            executed(&step),
            vec!["exitA1", "exitA", "onGo", "enterB", "enterB1"]
        );
        assert_eq!(machine.state_value(&step.state.configuration), json!({ "b": "b1" }));
    }

    #[test]
    fn external_self_transition_reenters_source() {
        let machine = machine_with_logs(
            json!({
                "id": "m",
                "initial": "a",
                "states": {
                    "a": {
                        "initial": "a1",
                        "entry": "enterA",
                        "exit": "exitA",
                        "on": { "EXT": ".a2", "INT": { "target": ".a2", "internal": true } },
                        "states": { "a1": {}, "a2": {} }
                    }
                }
            }),
            &["enterA", "exitA"],
        );
        let started = start(&machine);

        let external = send(&machine, &started.state, "EXT");
        let internal = send(&machine, &started.state, "INT");

        assert_eq!(executed(&external), vec!["exitA", "enterA"]);
        assert!(executed(&internal).is_empty());
        assert_eq!(
            machine.state_value(&internal.state.configuration),
            json!({ "a": "a2" })
        );
    }

    #[test]
    fn parallel_regions_move_in_one_microstep() {
        let machine = machine_with_logs(
            json!({
                "id": "m",
                "type": "parallel",
                "states": {
                    "left": {
                        "initial": "off",
                        "states": {
                            "off": { "exit": "exitLeft", "on": { "E": "on" } },
                            "on": { "entry": "enterLeft" }
                        }
                    },
                    "right": {
                        "initial": "off",
                        "states": {
                            "off": { "exit": "exitRight", "on": { "E": "on" } },
                            "on": { "entry": "enterRight" }
                        }
                    }
                }
            }),
            &["exitLeft", "enterLeft", "exitRight", "enterRight"],
        );
        let started = start(&machine);

        let step = send(&machine, &started.state, "E");

        assert_eq!(
            machine.state_value(&step.state.configuration),
            json!({ "left": "on", "right": "on" })
        );
        assert_eq!(
            executed(&step),
            vec!["exitRight", "exitLeft", "enterLeft", "enterRight"]
        );
    }

    fn conflicting(policy: ConflictPolicy) -> Arc<Machine> {
        let value = json!({
            "id": "m",
            "initial": "p",
            "states": {
                "p": {
                    "type": "parallel",
                    "states": {
                        "r1": { "initial": "a", "states": { "a": { "on": { "E": "#m.x" } } } },
                        "r2": { "initial": "b", "states": { "b": { "on": { "E": "#m.y" } } } }
                    }
                },
                "x": {},
                "y": {}
            }
        });
        let options = ResolverOptions {
            conflict_policy: policy,
            ..ResolverOptions::default()
        };
        Arc::new(
            Machine::builder(config(value))
                .options(options)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn document_order_wins_conflicts() {
        let machine = conflicting(ConflictPolicy::DocumentOrder);
        let started = start(&machine);

        let step = send(&machine, &started.state, "E");

        assert_eq!(machine.state_value(&step.state.configuration), json!("x"));
    }

    #[test]
    fn descendant_first_preempts_ancestor_transition() {
        let machine = Arc::new(
            Machine::builder(config(json!({
                "id": "m",
                "initial": "a",
                "states": {
                    "a": {
                        "type": "parallel",
                        "on": { "E": "#m.outer" },
                        "states": {
                            "r1": { "initial": "a1", "states": { "a1": {} } },
                            "r2": { "initial": "b1", "states": { "b1": { "on": { "E": "#m.inner" } } } }
                        }
                    },
                    "outer": {},
                    "inner": {}
                }
            })))
            .options(ResolverOptions {
                conflict_policy: ConflictPolicy::DescendantFirst,
                ..ResolverOptions::default()
            })
            .build()
            .unwrap(),
        );
        let started = start(&machine);

        let step = send(&machine, &started.state, "E");

        assert_eq!(machine.state_value(&step.state.configuration), json!("inner"));
    }

    #[test]
    fn guards_pick_first_enabled_transition() {
        let machine = Machine::builder(config(json!({
            "id": "m",
            "initial": "idle",
            "context": { "amount": 5 },
            "states": {
                "idle": {
                    "on": {
                        "GO": [
                            { "target": "big", "guard": "isBig" },
                            { "target": "small" }
                        ]
                    }
                },
                "big": {},
                "small": {}
            }
        })))
        .guard("isBig", Guard::new(|ctx, _| ctx["amount"].as_i64().unwrap_or(0) > 10))
        .build()
        .unwrap();
        let started = start(&machine);

        let step = send(&machine, &started.state, "GO");

        assert_eq!(machine.state_value(&step.state.configuration), json!("small"));
    }

    #[test]
    fn exact_match_takes_priority_over_wildcard() {
        let machine = machine_with_logs(
            json!({
                "id": "m",
                "initial": "a",
                "states": {
                    "a": { "on": { "*": "any", "GO": "exact" } },
                    "any": {},
                    "exact": {}
                }
            }),
            &[],
        );
        let started = start(&machine);

        let go = send(&machine, &started.state, "GO");
        let other = send(&machine, &started.state, "OTHER");

        assert_eq!(machine.state_value(&go.state.configuration), json!("exact"));
        assert_eq!(machine.state_value(&other.state.configuration), json!("any"));
    }

    #[test]
    fn assign_is_visible_to_eventless_guards() {
        let machine = Machine::builder(config(json!({
            "id": "m",
            "initial": "counting",
            "context": { "count": 0 },
            "states": {
                "counting": {
                    "on": { "INC": { "actions": "increment" } },
                    "always": { "target": "full", "guard": "isFull" }
                },
                "full": {}
            }
        })))
        .assign("increment", |ctx, _| {
            Ok(json!({ "count": ctx["count"].as_i64().unwrap_or(0) + 1 }))
        })
        .guard("isFull", Guard::new(|ctx, _| ctx["count"].as_i64() == Some(2)))
        .build()
        .unwrap();

        let s0 = start(&machine).state;
        let s1 = send(&machine, &s0, "INC").state;
        let s2 = send(&machine, &s1, "INC").state;

        assert_eq!(machine.state_value(&s1.configuration), json!("counting"));
        assert_eq!(machine.state_value(&s2.configuration), json!("full"));
        assert_eq!(s2.context, json!({ "count": 2 }));
    }

    #[test]
    fn raised_events_are_processed_in_the_same_macrostep() {
        let machine = machine_with_logs(
            json!({
                "id": "m",
                "initial": "a",
                "states": {
                    "a": { "on": { "GO": { "target": "b", "actions": { "type": "raise", "event": { "type": "NEXT" } } } } },
                    "b": { "on": { "NEXT": "c" } },
                    "c": {}
                }
            }),
            &[],
        );
        let started = start(&machine);

        let step = send(&machine, &started.state, "GO");

        assert_eq!(machine.state_value(&step.state.configuration), json!("c"));
    }

    #[test]
    fn shallow_and_deep_history() {
        let value = |depth: &str| {
            json!({
                "id": "m",
                "initial": "work",
                "states": {
                    "work": {
                        "initial": "edit",
                        "on": { "PAUSE": "paused" },
                        "states": {
                            "hist": { "type": "history", "history": depth },
                            "edit": {
                                "initial": "draft",
                                "on": { "NEXT": "review" },
                                "states": { "draft": { "on": { "POLISH": "final" } }, "final": {} }
                            },
                            "review": {
                                "initial": "first",
                                "states": { "first": { "on": { "NEXT": "second" } }, "second": {} }
                            }
                        }
                    },
                    "paused": { "on": { "RESUME": "work.hist" } }
                }
            })
        };

        let run = |depth: &str| {
            let machine = Machine::builder(config(value(depth))).build().unwrap();
            let mut state = start(&machine).state;
            for event in ["NEXT", "NEXT", "PAUSE", "RESUME"] {
                state = send(&machine, &state, event).state;
            }
            assert!(machine.is_legal(&state.configuration));
            machine.state_value(&state.configuration)
        };

        assert_eq!(run("deep"), json!({ "work": { "review": "second" } }));
        assert_eq!(run("shallow"), json!({ "work": { "review": "first" } }));
    }

    #[test]
    fn history_without_record_uses_parent_initial() {
        let machine = Machine::builder(config(json!({
            "id": "m",
            "initial": "off",
            "states": {
                "off": { "on": { "ON": "on.hist" } },
                "on": {
                    "initial": "low",
                    "states": { "hist": { "type": "history" }, "low": {}, "high": {} }
                }
            }
        })))
        .build()
        .unwrap();
        let started = start(&machine);

        let step = send(&machine, &started.state, "ON");

        assert_eq!(machine.state_value(&step.state.configuration), json!({ "on": "low" }));
    }

    #[test]
    fn final_child_raises_done_state() {
        let machine = machine_with_logs(
            json!({
                "id": "m",
                "initial": "job",
                "states": {
                    "job": {
                        "initial": "running",
                        "on": { "statecraft.done.state.m.job": "complete" },
                        "states": {
                            "running": { "on": { "FINISH": "finished" } },
                            "finished": { "type": "final", "output": { "ok": true } }
                        }
                    },
                    "complete": { "type": "final", "output": 7 }
                }
            }),
            &[],
        );
        let started = start(&machine);

        let step = send(&machine, &started.state, "FINISH");

        assert_eq!(machine.state_value(&step.state.configuration), json!("complete"));
        assert!(step.is_done());
        assert!(step
            .effects
            .iter()
            .any(|e| matches!(e, Effect::Done { output } if output == &json!(7))));
    }

    #[test]
    fn parallel_completes_when_all_regions_final() {
        let machine = machine_with_logs(
            json!({
                "id": "m",
                "initial": "both",
                "states": {
                    "both": {
                        "type": "parallel",
                        "on": { "statecraft.done.state.m.both": "done" },
                        "states": {
                            "a": { "initial": "a1", "states": { "a1": { "on": { "A": "a2" } }, "a2": { "type": "final" } } },
                            "b": { "initial": "b1", "states": { "b1": { "on": { "B": "b2" } }, "b2": { "type": "final" } } }
                        }
                    },
                    "done": { "type": "final" }
                }
            }),
            &[],
        );
        let s0 = start(&machine).state;

        let s1 = send(&machine, &s0, "A");
        assert!(!s1.is_done());
        let s2 = send(&machine, &s1.state, "B");

        assert!(s2.is_done());
        assert_eq!(machine.state_value(&s2.state.configuration), json!("done"));
    }

    #[test]
    fn delays_are_scheduled_on_entry_and_cancelled_on_exit() {
        let machine = machine_with_logs(
            json!({
                "id": "m",
                "initial": "waiting",
                "states": {
                    "waiting": { "after": { "500": "timedOut" }, "on": { "CANCEL": "idle" } },
                    "timedOut": {},
                    "idle": {}
                }
            }),
            &[],
        );
        let started = start(&machine);
        assert!(started
            .effects
            .iter()
            .any(|e| matches!(e, Effect::Schedule { id, delay, .. }
                if id == "statecraft.after.500.m.waiting" && delay.as_millis() == 500)));

        let cancelled = send(&machine, &started.state, "CANCEL");
        assert!(cancelled
            .effects
            .iter()
            .any(|e| matches!(e, Effect::Cancel { id } if id == "statecraft.after.500.m.waiting")));

        let fired = send(&machine, &started.state, "statecraft.after.500.m.waiting");
        assert_eq!(machine.state_value(&fired.state.configuration), json!("timedOut"));
    }

    #[test]
    fn eventless_loop_hits_microstep_limit() {
        let machine = Machine::builder(config(json!({
            "id": "m",
            "initial": "ping",
            "states": {
                "ping": { "on": { "GO": "pong" } },
                "pong": { "always": "pang" },
                "pang": { "always": "pong" }
            }
        })))
        .options(ResolverOptions {
            max_microsteps: 10,
            ..ResolverOptions::default()
        })
        .build()
        .unwrap();
        let started = start(&machine);

        let err = machine
            .resolve(&started.state, &Event::new("GO"))
            .unwrap_err();

        assert_eq!(err, ResolveError::MicrostepLimit { limit: 10 });
    }

    #[test]
    fn failing_guard_is_reported() {
        let machine = Machine::builder(config(json!({
            "id": "m",
            "initial": "a",
            "states": { "a": { "on": { "GO": { "target": "b", "guard": "broken" } } }, "b": {} }
        })))
        .guard("broken", Guard::fallible(|_, _| Err("no balance".to_string())))
        .build()
        .unwrap();
        let started = start(&machine);

        let err = machine
            .resolve(&started.state, &Event::new("GO"))
            .unwrap_err();

        assert_eq!(
            err,
            ResolveError::Guard {
                name: "broken".to_string(),
                message: "no balance".to_string()
            }
        );
    }

    #[test]
    fn effects_capture_context_at_their_point() {
        let machine = Machine::builder(config(json!({
            "id": "m",
            "initial": "a",
            "context": { "n": 0 },
            "states": {
                "a": {
                    "on": {
                        "GO": {
                            "target": "b",
                            "actions": ["report", { "type": "assign", "assignment": { "n": 1 } }, "report"]
                        }
                    }
                },
                "b": {}
            }
        })))
        .action("report", EffectAction::new(|_| Ok(())))
        .build()
        .unwrap();
        let started = start(&machine);

        let step = send(&machine, &started.state, "GO");

        let contexts: Vec<Value> = step
            .effects
            .iter()
            .filter_map(|e| match e {
                Effect::Execute { context, .. } => Some(context.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(contexts, vec![json!({ "n": 0 }), json!({ "n": 1 })]);
    }
}
