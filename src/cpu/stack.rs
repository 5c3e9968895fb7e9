//! Hardware return-address stack.
//!
//! Eight slots and a wrapping top-of-stack index. There is no empty or full
//! state: a ninth push overwrites the oldest slot, and popping more than was
//! pushed returns whatever the slot still holds.

use log::trace;
use serde::{Serialize, Deserialize};

/// Number of return-address slots.
pub const STACK_DEPTH: usize = 8;

/// Circular call stack.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallStack {
    slots: [u16; STACK_DEPTH],
    tos: usize,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `address` at the current index, then advance.
    pub fn push(&mut self, address: u16) {
        self.slots[self.tos] = address;
        trace!("stack push {:#06x} at slot {}", address, self.tos);
        self.tos = (self.tos + 1) % STACK_DEPTH;
    }

    /// Retreat the index, then return the slot it lands on.
    pub fn pop(&mut self) -> u16 {
        self.tos = (self.tos + STACK_DEPTH - 1) % STACK_DEPTH;
        trace!("stack pop {:#06x} from slot {}", self.slots[self.tos], self.tos);
        self.slots[self.tos]
    }

    /// Most recently pushed value, without popping.
    pub fn top(&self) -> u16 {
        self.slots[(self.tos + STACK_DEPTH - 1) % STACK_DEPTH]
    }

    /// Current top-of-stack index (the next slot a push will write).
    pub fn index(&self) -> usize {
        self.tos
    }

    /// Raw slot contents, in slot order.
    pub fn slots(&self) -> &[u16; STACK_DEPTH] {
        &self.slots
    }
}

impl std::fmt::Debug for CallStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallStack")
            .field("tos", &self.tos)
            .field("top", &format_args!("{:#06x}", self.top()))
            .finish()
    }
}
