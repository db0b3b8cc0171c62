//! Modal presentation lane: at most one modal visible, FIFO waiters.
//!
//! Pure, testable state machine with no IO or async dependencies. The
//! arbiter pairs each queued [`Ticket`] with a wakeup channel.
//!
//! ```text
//! Idle    --request-->  Showing
//! Showing --request-->  Waiting(1)
//! Waiting(n) --dismiss--> Waiting(n-1) | Showing   (slot handed to the head waiter)
//! Showing --dismiss-->  Idle
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Identifies one modal request for the lifetime of the lane.
pub type Ticket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModalState {
    Idle,
    Showing,
    /// A modal is visible and `n` more are queued behind it.
    Waiting(usize),
}

/// Outcome of asking for the modal slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Slot is yours; present now.
    Granted,
    /// Queued at this zero-based position.
    Queued(usize),
}

#[derive(Debug, Default)]
pub struct ModalLane {
    showing: bool,
    waiters: VecDeque<Ticket>,
}

impl ModalLane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ModalState {
        match (self.showing, self.waiters.len()) {
            (false, _) => ModalState::Idle,
            (true, 0) => ModalState::Showing,
            (true, n) => ModalState::Waiting(n),
        }
    }

    pub fn is_showing(&self) -> bool {
        self.showing
    }

    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }

    pub fn request(&mut self, ticket: Ticket) -> Admission {
        if !self.showing {
            self.showing = true;
            return Admission::Granted;
        }
        self.waiters.push_back(ticket);
        Admission::Queued(self.waiters.len() - 1)
    }

    /// The visible modal went away.
    ///
    /// Returns the ticket that now owns the slot, if any. A dismiss while
    /// idle is ignored.
    pub fn dismiss(&mut self) -> Option<Ticket> {
        if !self.showing {
            return None;
        }
        match self.waiters.pop_front() {
            Some(next) => Some(next),
            None => {
                self.showing = false;
                None
            }
        }
    }

    /// Give up a queued request.
    ///
    /// Returns `false` if the ticket is no longer queued, which means the
    /// slot was already handed to it and the caller now owns it.
    pub fn withdraw(&mut self, ticket: Ticket) -> bool {
        match self.waiters.iter().position(|&t| t == ticket) {
            Some(idx) => {
                self.waiters.remove(idx);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let lane = ModalLane::new();
        assert_eq!(lane.state(), ModalState::Idle);
        assert!(!lane.is_showing());
    }

    #[test]
    fn first_request_granted() {
        let mut lane = ModalLane::new();
        assert_eq!(lane.request(1), Admission::Granted);
        assert_eq!(lane.state(), ModalState::Showing);
    }

    #[test]
    fn later_requests_queue_fifo() {
        let mut lane = ModalLane::new();
        lane.request(1);
        assert_eq!(lane.request(2), Admission::Queued(0));
        assert_eq!(lane.request(3), Admission::Queued(1));
        assert_eq!(lane.state(), ModalState::Waiting(2));

        assert_eq!(lane.dismiss(), Some(2));
        assert_eq!(lane.state(), ModalState::Waiting(1));
        assert_eq!(lane.dismiss(), Some(3));
        assert_eq!(lane.state(), ModalState::Showing);
        assert_eq!(lane.dismiss(), None);
        assert_eq!(lane.state(), ModalState::Idle);
    }

    #[test]
    fn dismiss_while_idle_is_noop() {
        let mut lane = ModalLane::new();
        assert_eq!(lane.dismiss(), None);
        assert_eq!(lane.state(), ModalState::Idle);
        assert_eq!(lane.request(7), Admission::Granted);
    }

    #[test]
    fn withdraw_queued_ticket() {
        let mut lane = ModalLane::new();
        lane.request(1);
        lane.request(2);
        lane.request(3);
        assert!(lane.withdraw(2));
        assert_eq!(lane.waiting(), 1);
        assert_eq!(lane.dismiss(), Some(3));
    }

    #[test]
    fn withdraw_after_grant_reports_ownership() {
        let mut lane = ModalLane::new();
        lane.request(1);
        lane.request(2);
        assert_eq!(lane.dismiss(), Some(2));
        // Ticket 2 was handed the slot before it could withdraw.
        assert!(!lane.withdraw(2));
        assert!(lane.is_showing());
    }
}
