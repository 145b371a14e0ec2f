//! Generation counters for in-flight requests.
//!
//! Each logical operation (load config, save rules, poll stats, ...) keeps
//! a counter. Starting a request takes a [`Ticket`] with the next
//! generation; when the response arrives it is applied only if its ticket
//! is still the newest one for that operation. A superseded response is
//! dropped instead of overwriting newer state.
use std::collections::HashMap;
use std::hash::Hash;

/// Proof that a request was started at a given generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket<Op> {
    pub op: Op,
    pub generation: u64,
}

/// Per-operation generation counters.
#[derive(Debug, Clone)]
pub struct Generations<Op> {
    current: HashMap<Op, u64>,
}

impl<Op: Copy + Eq + Hash> Default for Generations<Op> {
    fn default() -> Self {
        Self {
            current: HashMap::new(),
        }
    }
}

impl<Op: Copy + Eq + Hash> Generations<Op> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request for `op`, superseding any in flight.
    pub fn begin(&mut self, op: Op) -> Ticket<Op> {
        let counter = self.current.entry(op).or_insert(0);
        *counter += 1;
        Ticket {
            op,
            generation: *counter,
        }
    }

    /// Whether `ticket` is the newest request for its operation.
    pub fn is_current(&self, ticket: &Ticket<Op>) -> bool {
        self.current.get(&ticket.op) == Some(&ticket.generation)
    }
}
