//! Table-driven state machine for the phase loop
//!
//! Pure data and lookups, no I/O. States are named slots bound to a phase,
//! so one phase (Execute) can occupy two positions in the cycle. The
//! transition table maps `(state, event)` to the next state or to the
//! terminal marker.
//!
//! A registry is validated once when built:
//! - state names are unique
//! - exactly one state is initial
//! - every transition starts and ends at a registered state (or Terminal)

use std::collections::HashMap;

use taskloop_core::{Result, TaskloopError};

use crate::phases::{Phase, PhaseEvent};

pub const EXECUTE_1: &str = "execute_1";
pub const CREATE: &str = "create";
pub const EXECUTE_2: &str = "execute_2";
pub const PRIORITIZE: &str = "prioritize";
pub const STOP_CHECK: &str = "stop_check";

/// Where a transition leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    State(String),
    Terminal,
}

impl Target {
    pub fn state(name: &str) -> Self {
        Target::State(name.to_string())
    }
}

/// Result of looking up `(state, event)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Move to the named state
    Next(String),
    /// The run ends normally
    Terminal,
    /// No transition registered; the run halts
    Unhandled,
}

/// A named slot in the cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDef {
    pub name: String,
    pub phase: Phase,
}

/// Validated state registry and transition table
#[derive(Debug, Clone)]
pub struct StateMachine {
    states: Vec<StateDef>,
    initial: String,
    transitions: HashMap<(String, PhaseEvent), Target>,
}

impl StateMachine {
    pub fn builder() -> StateMachineBuilder {
        StateMachineBuilder::default()
    }

    /// execute_1 -> create -> execute_2 -> prioritize -> execute_1
    pub fn cyclic() -> Result<Self> {
        Self::builder()
            .initial_state(EXECUTE_1, Phase::Execute)
            .state(CREATE, Phase::Create)
            .state(EXECUTE_2, Phase::Execute)
            .state(PRIORITIZE, Phase::Prioritize)
            .transition(EXECUTE_1, PhaseEvent::Done, Target::state(CREATE))
            .transition(CREATE, PhaseEvent::Done, Target::state(EXECUTE_2))
            .transition(EXECUTE_2, PhaseEvent::Done, Target::state(PRIORITIZE))
            .transition(PRIORITIZE, PhaseEvent::Done, Target::state(EXECUTE_1))
            .build()
    }

    /// Like [`StateMachine::cyclic`] with a stop check after prioritize
    ///
    /// The stop check returns to execute_1 on "done" and ends the run on
    /// "stop".
    pub fn cyclic_with_stop_check() -> Result<Self> {
        Self::builder()
            .initial_state(EXECUTE_1, Phase::Execute)
            .state(CREATE, Phase::Create)
            .state(EXECUTE_2, Phase::Execute)
            .state(PRIORITIZE, Phase::Prioritize)
            .state(STOP_CHECK, Phase::StopCheck)
            .transition(EXECUTE_1, PhaseEvent::Done, Target::state(CREATE))
            .transition(CREATE, PhaseEvent::Done, Target::state(EXECUTE_2))
            .transition(EXECUTE_2, PhaseEvent::Done, Target::state(PRIORITIZE))
            .transition(PRIORITIZE, PhaseEvent::Done, Target::state(STOP_CHECK))
            .transition(STOP_CHECK, PhaseEvent::Done, Target::state(EXECUTE_1))
            .transition(STOP_CHECK, PhaseEvent::Stop, Target::Terminal)
            .build()
    }

    pub fn for_stop_check(enable_stop_check: bool) -> Result<Self> {
        if enable_stop_check {
            Self::cyclic_with_stop_check()
        } else {
            Self::cyclic()
        }
    }

    pub fn initial(&self) -> &str {
        &self.initial
    }

    pub fn states(&self) -> &[StateDef] {
        &self.states
    }

    pub fn phase_of(&self, state: &str) -> Option<Phase> {
        self.states.iter().find(|s| s.name == state).map(|s| s.phase)
    }

    /// Look up the next step; never panics
    pub fn transition(&self, state: &str, event: PhaseEvent) -> Step {
        match self.transitions.get(&(state.to_string(), event)) {
            Some(Target::State(next)) => Step::Next(next.clone()),
            Some(Target::Terminal) => Step::Terminal,
            None => Step::Unhandled,
        }
    }
}

/// Collects states and transitions, validating on [`build`](Self::build)
#[derive(Debug, Default)]
pub struct StateMachineBuilder {
    states: Vec<StateDef>,
    initial: Vec<String>,
    transitions: Vec<(String, PhaseEvent, Target)>,
}

impl StateMachineBuilder {
    pub fn state(mut self, name: &str, phase: Phase) -> Self {
        self.states.push(StateDef {
            name: name.to_string(),
            phase,
        });
        self
    }

    pub fn initial_state(mut self, name: &str, phase: Phase) -> Self {
        self.initial.push(name.to_string());
        self.state(name, phase)
    }

    pub fn transition(mut self, from: &str, event: PhaseEvent, to: Target) -> Self {
        self.transitions.push((from.to_string(), event, to));
        self
    }

    pub fn build(self) -> Result<StateMachine> {
        let known = |name: &str| self.states.iter().any(|s| s.name == name);

        for (i, state) in self.states.iter().enumerate() {
            if self.states[..i].iter().any(|s| s.name == state.name) {
                return Err(invalid(format!("duplicate state '{}'", state.name)));
            }
        }

        let initial = match self.initial.as_slice() {
            [only] => only.clone(),
            [] => return Err(invalid("no initial state".to_string())),
            many => {
                return Err(invalid(format!(
                    "{} initial states: {}",
                    many.len(),
                    many.join(", ")
                )))
            }
        };

        let mut transitions = HashMap::new();
        for (from, event, to) in &self.transitions {
            if !known(from) {
                return Err(invalid(format!(
                    "transition from unknown state '{}'",
                    from
                )));
            }
            if let Target::State(next) = to {
                if !known(next) {
                    return Err(invalid(format!(
                        "transition {} --{}--> unknown state '{}'",
                        from, event, next
                    )));
                }
            }
            if transitions
                .insert((from.clone(), *event), to.clone())
                .is_some()
            {
                return Err(invalid(format!(
                    "duplicate transition for ({}, {})",
                    from, event
                )));
            }
        }

        Ok(StateMachine {
            states: self.states,
            initial,
            transitions,
        })
    }
}

fn invalid(message: String) -> TaskloopError {
    TaskloopError::StateMachine(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Follow "done" events from the initial state for `steps` steps
    fn walk(machine: &StateMachine, steps: usize) -> Vec<String> {
        let mut current = machine.initial().to_string();
        let mut visited = vec![current.clone()];
        for _ in 0..steps {
            match machine.transition(&current, PhaseEvent::Done) {
                Step::Next(next) => current = next,
                other => panic!("unexpected step from {}: {:?}", current, other),
            }
            visited.push(current.clone());
        }
        visited
    }

    #[test]
    fn test_cyclic_order() {
        let machine = StateMachine::cyclic().unwrap();
        assert_eq!(machine.initial(), EXECUTE_1);
        assert_eq!(
            walk(&machine, 4),
            vec![EXECUTE_1, CREATE, EXECUTE_2, PRIORITIZE, EXECUTE_1]
        );
    }

    #[test]
    fn test_cyclic_phases() {
        let machine = StateMachine::cyclic().unwrap();
        assert_eq!(machine.phase_of(EXECUTE_1), Some(Phase::Execute));
        assert_eq!(machine.phase_of(EXECUTE_2), Some(Phase::Execute));
        assert_eq!(machine.phase_of(CREATE), Some(Phase::Create));
        assert_eq!(machine.phase_of(PRIORITIZE), Some(Phase::Prioritize));
        assert_eq!(machine.phase_of(STOP_CHECK), None);
        assert_eq!(machine.states().len(), 4);
    }

    #[test]
    fn test_cyclic_has_no_stop_edge() {
        let machine = StateMachine::cyclic().unwrap();
        assert_eq!(
            machine.transition(PRIORITIZE, PhaseEvent::Stop),
            Step::Unhandled
        );
    }

    #[test]
    fn test_stop_check_cycle() {
        let machine = StateMachine::cyclic_with_stop_check().unwrap();
        assert_eq!(
            walk(&machine, 5),
            vec![EXECUTE_1, CREATE, EXECUTE_2, PRIORITIZE, STOP_CHECK, EXECUTE_1]
        );
        assert_eq!(
            machine.transition(STOP_CHECK, PhaseEvent::Stop),
            Step::Terminal
        );
    }

    #[test]
    fn test_for_stop_check_selects_topology() {
        assert_eq!(StateMachine::for_stop_check(false).unwrap().states().len(), 4);
        assert_eq!(StateMachine::for_stop_check(true).unwrap().states().len(), 5);
    }

    #[test]
    fn test_unknown_state_is_unhandled() {
        let machine = StateMachine::cyclic().unwrap();
        assert_eq!(
            machine.transition("nowhere", PhaseEvent::Done),
            Step::Unhandled
        );
    }

    #[test]
    fn test_rejects_duplicate_state() {
        let err = StateMachine::builder()
            .initial_state("a", Phase::Execute)
            .state("a", Phase::Create)
            .build()
            .unwrap_err();
        assert!(matches!(err, TaskloopError::StateMachine(_)));
        assert!(err.to_string().contains("duplicate state"));
    }

    #[test]
    fn test_requires_exactly_one_initial() {
        let none = StateMachine::builder().state("a", Phase::Execute).build();
        assert!(none.unwrap_err().to_string().contains("no initial state"));

        let two = StateMachine::builder()
            .initial_state("a", Phase::Execute)
            .initial_state("b", Phase::Execute)
            .build();
        assert!(two.unwrap_err().to_string().contains("2 initial states"));
    }

    #[test]
    fn test_rejects_dangling_transition() {
        let err = StateMachine::builder()
            .initial_state("a", Phase::Execute)
            .transition("a", PhaseEvent::Done, Target::state("b"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown state 'b'"));

        let err = StateMachine::builder()
            .initial_state("a", Phase::Execute)
            .transition("ghost", PhaseEvent::Done, Target::Terminal)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown state 'ghost'"));
    }

    #[test]
    fn test_rejects_duplicate_transition() {
        let err = StateMachine::builder()
            .initial_state("a", Phase::Execute)
            .transition("a", PhaseEvent::Done, Target::Terminal)
            .transition("a", PhaseEvent::Done, Target::state("a"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate transition"));
    }

    #[test]
    fn test_custom_topology() {
        let machine = StateMachine::builder()
            .initial_state("only", Phase::Execute)
            .transition("only", PhaseEvent::Done, Target::Terminal)
            .build()
            .unwrap();
        assert_eq!(machine.transition("only", PhaseEvent::Done), Step::Terminal);
    }
}
