//! Decides whether a requested block is final enough to be voted on.

use zkoracle_primitives::consts::DEFAULT_CONFIRMATIONS;

/// Returns `true` if at least `confirmation_depth` blocks have been built on top of the
/// requested block.
///
/// A head below the requested block (a regressed head or a stale read) is never confirmed.
pub fn is_confirmed(
    requested_block_number: u64,
    current_head_number: u64,
    confirmation_depth: u64,
) -> bool {
    current_head_number
        .checked_sub(requested_block_number)
        .is_some_and(|confirmations| confirmations >= confirmation_depth)
}

/// [`is_confirmed`] with a fixed confirmation depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    depth: u64,
}

impl ConfirmationPolicy {
    pub fn new(depth: u64) -> Self {
        Self { depth }
    }

    pub fn depth(&self) -> u64 {
        self.depth
    }

    pub fn is_confirmed(&self, requested_block_number: u64, current_head_number: u64) -> bool {
        is_confirmed(requested_block_number, current_head_number, self.depth)
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRMATIONS)
    }
}
