use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::error::ModelError;

/// Body of an action. An `Err` is a test failure against the system under test.
pub type ActionBody<M> = Box<dyn Fn(&mut M) -> anyhow::Result<()>>;

/// A finite-state model that can be explored by the walk algorithms.
///
/// The model does not expose its action structure through its type: it
/// registers actions and guards by name when [`FsmModel::actions`] is called
/// once at load time.
pub trait FsmModel: Sized + 'static {
    /// Abstract state snapshot. Equal snapshots are the same FSM state, even
    /// if the model's internal fields differ.
    type State: Clone + Eq + Hash + fmt::Debug + fmt::Display + 'static;

    /// Name used in dot output and logs.
    fn name(&self) -> String {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full).to_string()
    }

    fn state(&self) -> Self::State;

    /// Return to the initial state. `testing` is false while the engine is
    /// only exploring (for example during graph construction).
    fn reset(&mut self, testing: bool);

    /// Register the numbered action list. Registration order fixes indices.
    fn actions(&self, table: &mut ActionTableBuilder<Self>);
}

/// Enabled-ness evaluator of one action.
pub enum Guard<M> {
    /// Plain boolean predicate.
    Flag(Box<dyn Fn(&M) -> bool>),
    /// Non-negative weight, 0 means disabled.
    Weight(Box<dyn Fn(&M) -> i64>),
    /// Predicate that can itself fail.
    Checked(Box<dyn Fn(&M) -> anyhow::Result<bool>>),
}

impl<M> Guard<M> {
    /// Evaluate to a weight (flags map to 0 or 1).
    pub fn weight(&self, model: &M, action: &str) -> Result<u32, ModelError> {
        match self {
            Guard::Flag(f) => Ok(u32::from(f(model))),
            Guard::Weight(f) => {
                let w = f(model);
                u32::try_from(w).map_err(|_| ModelError::GuardFault {
                    action: action.to_string(),
                    reason: format!("weight {w} is out of range"),
                })
            }
            Guard::Checked(f) => f(model)
                .map(u32::from)
                .map_err(|e| ModelError::GuardFault {
                    action: action.to_string(),
                    reason: format!("{e:#}"),
                }),
        }
    }
}

/// One numbered action of a loaded model.
pub struct ActionDef<M> {
    pub name: String,
    pub guard: Option<Guard<M>>,
    pub body: ActionBody<M>,
}

/// Collects action and guard registrations before the table is frozen.
pub struct ActionTableBuilder<M> {
    actions: Vec<(String, ActionBody<M>)>,
    guards: Vec<(String, Guard<M>)>,
}

impl<M> ActionTableBuilder<M> {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
            guards: Vec::new(),
        }
    }

    /// Register an action. Its index is the registration order.
    pub fn action<F>(&mut self, name: &str, body: F) -> &mut Self
    where
        F: Fn(&mut M) -> anyhow::Result<()> + 'static,
    {
        self.actions.push((name.to_string(), Box::new(body)));
        self
    }

    /// Gate the action named `action` with a boolean guard.
    pub fn guard<F>(&mut self, action: &str, guard: F) -> &mut Self
    where
        F: Fn(&M) -> bool + 'static,
    {
        self.guards
            .push((action.to_string(), Guard::Flag(Box::new(guard))));
        self
    }

    /// Gate the action named `action` with a weight guard.
    pub fn weight<F>(&mut self, action: &str, guard: F) -> &mut Self
    where
        F: Fn(&M) -> i64 + 'static,
    {
        self.guards
            .push((action.to_string(), Guard::Weight(Box::new(guard))));
        self
    }

    /// Gate the action named `action` with a guard that can fail.
    pub fn checked_guard<F>(&mut self, action: &str, guard: F) -> &mut Self
    where
        F: Fn(&M) -> anyhow::Result<bool> + 'static,
    {
        self.guards
            .push((action.to_string(), Guard::Checked(Box::new(guard))));
        self
    }

    /// Freeze the registrations into an action table.
    pub fn build(self, model_name: &str) -> Result<ActionTable<M>, ModelError> {
        if self.actions.is_empty() {
            return Err(ModelError::NoActions {
                model: model_name.to_string(),
            });
        }

        let mut by_name = HashMap::new();
        let mut actions = Vec::with_capacity(self.actions.len());
        for (index, (name, body)) in self.actions.into_iter().enumerate() {
            if by_name.insert(name.clone(), index).is_some() {
                return Err(ModelError::DuplicateAction { name });
            }
            actions.push(ActionDef {
                name,
                guard: None,
                body,
            });
        }

        for (name, guard) in self.guards {
            let index = *by_name
                .get(&name)
                .ok_or_else(|| ModelError::UnknownGuardTarget { name: name.clone() })?;
            let slot = &mut actions[index].guard;
            if slot.is_some() {
                return Err(ModelError::DuplicateGuard { name });
            }
            *slot = Some(guard);
        }

        Ok(ActionTable { actions, by_name })
    }
}

impl<M> Default for ActionTableBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// The frozen index <-> name mapping of a loaded model.
pub struct ActionTable<M> {
    actions: Vec<ActionDef<M>>,
    by_name: HashMap<String, usize>,
}

impl<M> ActionTable<M> {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ActionDef<M>> {
        self.actions.get(index)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.actions.get(index).map(|a| a.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }
}
