//! Ownership of the active solution.
//!
//! At most one player holds the solution at a time. The holder is first
//! `Locking` until its client acknowledges the lock (or the acknowledgment
//! times out), then `Locked` for the hold duration, after which the caller
//! completes the solution and the slot is free again.

use shared::{GridPoint, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SolutionLock {
    #[default]
    Unoccupied,
    Locking {
        player: PlayerId,
        cell: GridPoint,
        since: f64,
    },
    Locked {
        player: PlayerId,
        cell: GridPoint,
        started: f64,
    },
}

/// What the session has to do for the current tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LockStep {
    /// Nobody holds the solution; matching may run.
    Idle,
    /// The holder keeps its blocks, which fade to `opacity`.
    Hold { player: PlayerId, opacity: f32 },
    /// The hold expired this tick. The slot is already free.
    Complete { player: PlayerId, cell: GridPoint },
}

impl SolutionLock {
    pub fn is_occupied(&self) -> bool {
        !matches!(self, SolutionLock::Unoccupied)
    }

    pub fn holder(&self) -> Option<PlayerId> {
        match self {
            SolutionLock::Unoccupied => None,
            SolutionLock::Locking { player, .. } | SolutionLock::Locked { player, .. } => {
                Some(*player)
            }
        }
    }

    /// Claims the slot for `player`. Fails if it is already held.
    pub fn begin(&mut self, player: PlayerId, cell: GridPoint, now: f64) -> bool {
        if self.is_occupied() {
            return false;
        }
        *self = SolutionLock::Locking {
            player,
            cell,
            since: now,
        };
        true
    }

    /// The holder's client confirmed it is locked; start the hold countdown.
    pub fn acknowledge(&mut self, player: PlayerId, now: f64) -> bool {
        match *self {
            SolutionLock::Locking {
                player: holder,
                cell,
                ..
            } if holder == player => {
                *self = SolutionLock::Locked {
                    player,
                    cell,
                    started: now,
                };
                true
            }
            _ => false,
        }
    }

    /// Releases the slot if `player` holds it, whatever the phase.
    pub fn cancel_for(&mut self, player: PlayerId) -> bool {
        if self.holder() == Some(player) {
            *self = SolutionLock::Unoccupied;
            true
        } else {
            false
        }
    }

    /// Advances the lock to `now`.
    pub fn poll(&mut self, now: f64, hold_ms: u64, ack_timeout_ms: u64) -> LockStep {
        match *self {
            SolutionLock::Unoccupied => LockStep::Idle,
            SolutionLock::Locking {
                player,
                cell,
                since,
            } => {
                if now - since >= ack_timeout_ms as f64 {
                    *self = SolutionLock::Locked {
                        player,
                        cell,
                        started: now,
                    };
                }
                LockStep::Hold {
                    player,
                    opacity: 1.0,
                }
            }
            SolutionLock::Locked {
                player,
                cell,
                started,
            } => {
                let elapsed = now - started;
                if elapsed >= hold_ms as f64 {
                    *self = SolutionLock::Unoccupied;
                    LockStep::Complete { player, cell }
                } else {
                    let opacity = if hold_ms == 0 {
                        0.0
                    } else {
                        (1.0 - elapsed / hold_ms as f64).max(0.0) as f32
                    };
                    LockStep::Hold { player, opacity }
                }
            }
        }
    }
}
