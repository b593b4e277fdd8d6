use std::fmt;
use std::hash::Hash;

use log::debug;

use crate::action::{ActionTable, ActionTableBuilder, FsmModel};
use crate::bits::ActionSet;
use crate::error::ModelError;
use crate::listener::{FailureRecord, Listener};
use crate::transition::{Sequence, Transition};

/// The surface the walk algorithms drive.
///
/// Implemented by [`Model`] and by decorators such as the timed harness,
/// which are accepted anywhere a plain model is.
pub trait Harness {
    type State: Clone + Eq + Hash + fmt::Debug + fmt::Display + 'static;

    fn model_name(&self) -> &str;

    fn current_state(&self) -> Self::State;

    /// Reset the model and start a new session sequence.
    fn reset(&mut self, reason: &str, testing: bool);

    fn num_actions(&self) -> usize;

    fn action_name(&self, index: usize) -> Option<&str>;

    fn action_index(&self, name: &str) -> Option<usize>;

    /// Weight of action `index` in the current state (0 = disabled).
    fn enabled(&mut self, index: usize) -> Result<u32, ModelError>;

    /// Try action `index`. Returns false if its guard is false or the body
    /// failed (the failure having been dispatched to listeners).
    fn do_action(&mut self, index: usize) -> Result<bool, ModelError>;

    /// Transitions of the current session.
    fn sequence(&self) -> Sequence<Self::State>;

    /// Total number of transitions taken since load.
    fn history_len(&self) -> usize;

    /// Listeners fire in registration order.
    fn add_listener(&mut self, listener: Box<dyn Listener<Self::State>>);

    /// Graph construction is starting. Harnesses with their own random
    /// source switch it to a stream derived from `seed`.
    fn begin_graph_build(&mut self, _seed: u64) {}

    /// Graph construction is over. Restore whatever `begin_graph_build`
    /// replaced.
    fn end_graph_build(&mut self) {}

    /// Evaluate every guard in the current state.
    fn enabled_set(&mut self) -> Result<ActionSet, ModelError> {
        let mut set = ActionSet::new();
        for index in 0..self.num_actions() {
            if self.enabled(index)? > 0 {
                set.insert(index);
            }
        }
        Ok(set)
    }
}

/// A loaded user model together with its action table and listeners.
pub struct Model<M: FsmModel> {
    model: M,
    name: String,
    table: ActionTable<M>,
    listeners: Vec<Box<dyn Listener<M::State>>>,
    sequence: Sequence<M::State>,
    history_len: usize,
    clock: Option<fn(&M) -> i64>,
}

impl<M: FsmModel> Model<M> {
    /// Bind the action table of `model` and put it in its initial state.
    pub fn load(mut model: M) -> Result<Self, ModelError> {
        let name = model.name();
        let mut builder = ActionTableBuilder::new();
        model.actions(&mut builder);
        let table = builder.build(&name)?;
        model.reset(true);
        debug!("loaded model {name} with {} actions", table.len());

        Ok(Self {
            model,
            name,
            table,
            listeners: Vec::new(),
            sequence: Sequence::new(),
            history_len: 0,
            clock: None,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Direct access to the user model. Changes made here bypass listeners.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_inner(self) -> M {
        self.model
    }

    /// Stamp every future transition with the value read by `clock`.
    pub fn set_clock(&mut self, clock: fn(&M) -> i64) {
        self.clock = Some(clock);
    }

    /// Evaluate the guard of `index` without notifying listeners.
    pub fn guard_weight(&self, index: usize) -> Result<u32, ModelError> {
        let def = self.table.get(index).ok_or(ModelError::BadActionIndex {
            index,
            count: self.table.len(),
        })?;
        match &def.guard {
            Some(guard) => guard.weight(&self.model, &def.name),
            None => Ok(1),
        }
    }

    /// Tell every listener about a guard evaluation.
    pub fn notify_guard(&mut self, index: usize, weight: u32) {
        let state = self.model.state();
        for listener in &mut self.listeners {
            listener.on_guard(&state, index, weight > 0, weight);
        }
    }

    /// Dispatch a test failure to every listener.
    ///
    /// All listeners see the failure even if an earlier one asks to abort;
    /// the first abort reason is returned.
    pub fn report_failure(
        &mut self,
        action: &str,
        state: M::State,
        error: anyhow::Error,
    ) -> Result<(), ModelError> {
        let record = FailureRecord {
            action: action.to_string(),
            state,
            sequence: self.sequence.to_vec(),
            error,
        };
        let mut abort = None;
        for listener in &mut self.listeners {
            if let Err(e) = listener.on_failure(&record) {
                abort.get_or_insert_with(|| format!("{e:#}"));
            }
        }
        match abort {
            Some(reason) => Err(ModelError::Aborted {
                action: action.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

impl<M: FsmModel> Harness for Model<M> {
    type State = M::State;

    fn model_name(&self) -> &str {
        &self.name
    }

    fn current_state(&self) -> M::State {
        self.model.state()
    }

    fn reset(&mut self, reason: &str, testing: bool) {
        self.model.reset(testing);
        self.sequence = Sequence::new();
        for listener in &mut self.listeners {
            listener.on_reset(reason, testing);
        }
    }

    fn num_actions(&self) -> usize {
        self.table.len()
    }

    fn action_name(&self, index: usize) -> Option<&str> {
        self.table.name(index)
    }

    fn action_index(&self, name: &str) -> Option<usize> {
        self.table.index_of(name)
    }

    fn enabled(&mut self, index: usize) -> Result<u32, ModelError> {
        let weight = self.guard_weight(index)?;
        self.notify_guard(index, weight);
        Ok(weight)
    }

    fn do_action(&mut self, index: usize) -> Result<bool, ModelError> {
        if self.enabled(index)? == 0 {
            return Ok(false);
        }

        let start = self.model.state();
        let name = self.table.name(index).unwrap_or_default().to_string();
        for listener in &mut self.listeners {
            listener.on_action_starting(&start, index, &name);
        }

        let outcome = match self.table.get(index) {
            Some(def) => (def.body)(&mut self.model),
            None => Ok(()),
        };
        if let Err(error) = outcome {
            self.report_failure(&name, start, error)?;
            return Ok(false);
        }

        let mut transition = Transition::new(start, name, self.model.state());
        if let Some(clock) = self.clock {
            transition = transition.at(clock(&self.model));
        }
        self.sequence.push(transition.clone());
        self.history_len += 1;
        for listener in &mut self.listeners {
            listener.on_transition_done(index, &transition);
        }
        Ok(true)
    }

    fn sequence(&self) -> Sequence<M::State> {
        self.sequence.clone()
    }

    fn history_len(&self) -> usize {
        self.history_len
    }

    fn add_listener(&mut self, listener: Box<dyn Listener<M::State>>) {
        self.listeners.push(listener);
    }
}
