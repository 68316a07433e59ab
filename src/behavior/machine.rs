//! Statechart-backed actors.

use crate::actor::{ActorError, ActorScope};
use crate::checkpoint::{CheckpointError, PersistedBehavior};
use crate::core::{merge_patch, Configuration, Event, HistoryRecords, Machine, MachineState};
use serde_json::Value;
use std::collections::BTreeMap;

/// Initial context with an object input shallow-merged over it.
pub(crate) fn initial_state(machine: &Machine, input: &Value) -> MachineState {
    let mut state = machine.initial_state();
    if let Value::Object(patch) = input {
        state.context = merge_patch(&state.context, patch);
    }
    state
}

pub(crate) fn start(
    machine: &Machine,
    state: &MachineState,
    scope: &mut ActorScope<'_>,
) -> Result<MachineState, ActorError> {
    let step = machine.start(state)?;
    scope.extend(step.effects);
    Ok(step.state)
}

pub(crate) fn transition(
    machine: &Machine,
    state: &MachineState,
    event: &Event,
    scope: &mut ActorScope<'_>,
) -> Result<MachineState, ActorError> {
    let step = machine.resolve(state, event)?;
    scope.extend(step.effects);
    Ok(step.state)
}

/// Re-arm the delayed transitions of a restored configuration.
pub(crate) fn resume(machine: &Machine, state: &MachineState, scope: &mut ActorScope<'_>) {
    scope.extend(machine.pending_delays(&state.configuration));
}

pub(crate) fn persist(machine: &Machine, state: &MachineState) -> PersistedBehavior {
    let name = |node| machine.node(node).id.clone();
    PersistedBehavior::Machine {
        configuration: machine.configuration_ids(&state.configuration),
        context: state.context.clone(),
        history: state
            .history
            .iter()
            .map(|(node, states)| (name(node), states.iter().copied().map(name).collect()))
            .collect::<BTreeMap<_, _>>(),
    }
}

pub(crate) fn restore(
    machine: &Machine,
    configuration: &[String],
    context: &Value,
    history: &BTreeMap<String, Vec<String>>,
) -> Result<MachineState, CheckpointError> {
    let lookup = |id: &String| {
        machine
            .node_by_id(id)
            .ok_or_else(|| CheckpointError::UnknownNode { id: id.clone() })
    };

    let configuration = configuration
        .iter()
        .map(lookup)
        .collect::<Result<Configuration, _>>()?;
    if !configuration.is_empty() && !machine.is_legal(&configuration) {
        return Err(CheckpointError::IllegalConfiguration {
            ids: machine.configuration_ids(&configuration),
        });
    }

    let history = history
        .iter()
        .map(|(node, states)| {
            let states = states.iter().map(lookup).collect::<Result<Vec<_>, _>>()?;
            Ok((lookup(node)?, states))
        })
        .collect::<Result<HistoryRecords, CheckpointError>>()?;

    Ok(MachineState {
        configuration,
        context: context.clone(),
        history,
    })
}
