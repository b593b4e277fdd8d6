use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// An observed `(start, action, end)` step.
///
/// Timed models stamp transitions with the clock value at which they were
/// taken. The stamp is not part of equality or hashing, so graph identity
/// does not depend on the clock.
#[derive(Debug, Clone)]
pub struct Transition<S> {
    pub start: S,
    pub action: String,
    pub end: S,
    pub time: Option<i64>,
}

impl<S> Transition<S> {
    pub fn new(start: S, action: impl Into<String>, end: S) -> Self {
        Self {
            start,
            action: action.into(),
            end,
            time: None,
        }
    }

    pub fn at(mut self, time: i64) -> Self {
        self.time = Some(time);
        self
    }
}

impl<S: PartialEq> PartialEq for Transition<S> {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.action == other.action && self.end == other.end
    }
}

impl<S: Eq> Eq for Transition<S> {}

impl<S: Hash> Hash for Transition<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.start.hash(state);
        self.action.hash(state);
        self.end.hash(state);
    }
}

impl<S: fmt::Display> fmt::Display for Transition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.start, self.action, self.end)?;
        if let Some(t) = self.time {
            write!(f, " @{t}")?;
        }
        Ok(())
    }
}

/// Append-only transition sequence of one test session.
///
/// Clones share the same storage, so a reader holding a clone (for example a
/// replay path) keeps seeing a stable prefix while the session grows.
#[derive(Debug)]
pub struct Sequence<S> {
    steps: Rc<RefCell<Vec<Transition<S>>>>,
}

impl<S> Clone for Sequence<S> {
    fn clone(&self) -> Self {
        Self {
            steps: Rc::clone(&self.steps),
        }
    }
}

impl<S: Clone> Sequence<S> {
    pub fn new() -> Self {
        Self {
            steps: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn push(&self, transition: Transition<S>) {
        self.steps.borrow_mut().push(transition);
    }

    pub fn len(&self) -> usize {
        self.steps.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Transition<S>> {
        self.steps.borrow().get(index).cloned()
    }

    pub fn last(&self) -> Option<Transition<S>> {
        self.steps.borrow().last().cloned()
    }

    /// Copy of transitions `0..depth` (clamped to the current length).
    pub fn prefix(&self, depth: usize) -> Vec<Transition<S>> {
        let steps = self.steps.borrow();
        steps[..depth.min(steps.len())].to_vec()
    }

    pub fn to_vec(&self) -> Vec<Transition<S>> {
        self.steps.borrow().clone()
    }

    /// Whether both handles refer to the same session.
    pub fn same_session(&self, other: &Sequence<S>) -> bool {
        Rc::ptr_eq(&self.steps, &other.steps)
    }
}

impl<S: Clone> Default for Sequence<S> {
    fn default() -> Self {
        Self::new()
    }
}
