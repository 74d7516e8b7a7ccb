//! Stop-loss evaluation across the open position set
//!
//! The manager detects; it never closes. Triggered keys are returned to the
//! orchestrator, which decides when to act. Evaluation is idempotent: a
//! position stays flagged until it is cleared, so unchanged state cannot
//! re-report it.

use crate::money::ArithmeticOverflow;
use crate::position::{Position, PositionKey};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Tracks which positions have already had their stop reported.
#[derive(Debug, Default)]
pub struct StopLossManager {
    flagged: HashSet<PositionKey>,
}

impl StopLossManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ratchet every trailing stop toward its position's current price.
    pub fn advance_trailing(
        positions: &mut HashMap<PositionKey, Position>,
    ) -> Result<(), ArithmeticOverflow> {
        for position in positions.values_mut() {
            let side = position.side;
            let price = position.current_price;
            position.stop.advance(side, price)?;
        }
        Ok(())
    }

    /// Evaluate every open position and return the keys whose stop fired
    /// this cycle, in deterministic key order. Keys already flagged in a
    /// previous cycle are not re-reported.
    pub fn evaluate(
        &mut self,
        positions: &HashMap<PositionKey, Position>,
        now: DateTime<Utc>,
    ) -> Vec<PositionKey> {
        let mut triggered: Vec<PositionKey> = positions
            .iter()
            .filter(|(key, position)| {
                !self.flagged.contains(key)
                    && position.stop.is_triggered(position.side, position.current_price, now)
            })
            .map(|(key, _)| key.clone())
            .collect();

        triggered.sort();
        for key in &triggered {
            self.flagged.insert(key.clone());
        }
        triggered
    }

    /// Returns `true` if the key has been reported and not yet cleared.
    pub fn is_flagged(&self, key: &PositionKey) -> bool {
        self.flagged.contains(key)
    }

    /// Clear a key, typically after its position was closed or its stop
    /// reassigned.
    pub fn clear(&mut self, key: &PositionKey) {
        self.flagged.remove(key);
    }

    /// Forget all flags (session reset).
    pub fn reset(&mut self) {
        self.flagged.clear();
    }
}
