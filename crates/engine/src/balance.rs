//! Balance derivation.
//!
//! Balances are never stored: they are reduced from the account's flows every
//! time they are needed.
//!
//! - `total` counts accepted flows plus pending credits.
//! - `available` counts accepted flows plus pending debits.
//!
//! A pending credit is expected to land but cannot be spent yet; a pending
//! debit is not spent yet but is already reserved. Rejected flows count for
//! nothing.

use serde::{Deserialize, Serialize};

use crate::Flow;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub total: i64,
    pub available: i64,
}

impl Balance {
    pub fn from_flows<'a>(flows: impl IntoIterator<Item = &'a Flow>) -> Self {
        flows.into_iter().fold(Self::default(), |mut balance, flow| {
            balance.apply(flow.delta_points, flow.is_pending(), flow.accepted);
            balance
        })
    }

    /// Folds one flow into the balance.
    pub fn apply(&mut self, delta_points: i64, pending: bool, accepted: bool) {
        if pending {
            if delta_points > 0 {
                self.total += delta_points;
            } else {
                self.available += delta_points;
            }
        } else if accepted {
            self.total += delta_points;
            self.available += delta_points;
        }
    }

    /// Points held by pending flows (`total - available`).
    pub fn reserved(&self) -> i64 {
        self.total - self.available
    }
}
