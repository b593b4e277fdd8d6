//! Clock declaration: the model's time field and its timeout fields.
//!
//! Timeout convention: `<= 0` not armed, `> now` armed, `== now` due.

use modelwalk_model::{FsmModel, ModelError};
use rand::{Rng, RngCore};

type Getter<M> = fn(&M) -> i64;
type Setter<M> = fn(&mut M, i64);

/// A model with simulated time.
pub trait TimedFsmModel: FsmModel {
    /// Declare the time field and any timeout fields.
    fn clock(&self, clock: &mut ClockBuilder<Self>);

    /// How far time moves on one advance, before clamping to the next
    /// armed timeout.
    fn time_increment(&self, rng: &mut dyn RngCore) -> i64 {
        rng.gen_range(1..=10)
    }
}

struct TimeField<M> {
    name: String,
    get: Getter<M>,
    set: Setter<M>,
}

struct TimeoutField<M> {
    name: String,
    action: String,
    get: Getter<M>,
    set: Setter<M>,
}

/// Collects clock fields from [`TimedFsmModel::clock`].
pub struct ClockBuilder<M> {
    times: Vec<TimeField<M>>,
    timeouts: Vec<TimeoutField<M>>,
}

impl<M> ClockBuilder<M> {
    pub fn new() -> Self {
        Self {
            times: Vec::new(),
            timeouts: Vec::new(),
        }
    }

    /// Declare the monotonic time field.
    pub fn time(&mut self, name: impl Into<String>, get: Getter<M>, set: Setter<M>) -> &mut Self {
        self.times.push(TimeField {
            name: name.into(),
            get,
            set,
        });
        self
    }

    /// Declare a timeout field bound to `action`.
    pub fn timeout(
        &mut self,
        name: impl Into<String>,
        action: impl Into<String>,
        get: Getter<M>,
        set: Setter<M>,
    ) -> &mut Self {
        self.timeouts.push(TimeoutField {
            name: name.into(),
            action: action.into(),
            get,
            set,
        });
        self
    }

    /// Validate the declaration. `resolve` maps an action name to its index.
    pub fn build(
        self,
        model_name: &str,
        resolve: impl Fn(&str) -> Option<usize>,
    ) -> Result<Clock<M>, ModelError> {
        let mut times = self.times.into_iter();
        let time = times.next().ok_or_else(|| ModelError::MissingTimeField {
            model: model_name.to_string(),
        })?;
        if let Some(extra) = times.next() {
            return Err(ModelError::DuplicateTimeField {
                first: time.name,
                second: extra.name,
            });
        }

        let mut timeouts: Vec<Timeout<M>> = Vec::with_capacity(self.timeouts.len());
        for field in self.timeouts {
            if timeouts.iter().any(|t| t.name == field.name) {
                return Err(ModelError::DuplicateTimeout { name: field.name });
            }
            let Some(action) = resolve(&field.action) else {
                return Err(ModelError::UnknownTimeoutAction {
                    timeout: field.name,
                    action: field.action,
                });
            };
            timeouts.push(Timeout {
                name: field.name,
                action,
                get: field.get,
                set: field.set,
            });
        }

        Ok(Clock { time, timeouts })
    }
}

impl<M> Default for ClockBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// A timeout field resolved to its action index.
pub struct Timeout<M> {
    name: String,
    action: usize,
    get: Getter<M>,
    set: Setter<M>,
}

impl<M> Timeout<M> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> usize {
        self.action
    }

    pub fn value(&self, model: &M) -> i64 {
        (self.get)(model)
    }

    pub fn disarm(&self, model: &mut M) {
        (self.set)(model, 0);
    }
}

/// Validated clock of one model.
pub struct Clock<M> {
    time: TimeField<M>,
    timeouts: Vec<Timeout<M>>,
}

impl<M> Clock<M> {
    pub fn time_name(&self) -> &str {
        &self.time.name
    }

    pub fn time_getter(&self) -> Getter<M> {
        self.time.get
    }

    pub fn now(&self, model: &M) -> i64 {
        (self.time.get)(model)
    }

    pub fn set_now(&self, model: &mut M, now: i64) {
        (self.time.set)(model, now);
    }

    pub fn timeouts(&self) -> &[Timeout<M>] {
        &self.timeouts
    }

    /// First timeout (in declaration order) that is due now.
    pub fn due(&self, model: &M) -> Option<&Timeout<M>> {
        let now = self.now(model);
        self.timeouts.iter().find(|t| {
            let at = t.value(model);
            at > 0 && at == now
        })
    }

    /// Earliest armed timeout strictly after now.
    pub fn nearest_armed(&self, model: &M) -> Option<i64> {
        let now = self.now(model);
        self.timeouts
            .iter()
            .map(|t| t.value(model))
            .filter(|&at| at > 0 && at > now)
            .min()
    }
}
