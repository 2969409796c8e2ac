//! Per-agent reservation-price quotes.
//!
//! Quotes are a lightweight matching heuristic: reservation bounds from the
//! utility's MRS, widened by a spread. They are recomputed only during
//! Housekeeping (and once at initialization), so every reader within a tick
//! sees the values established at the end of the previous tick.

use serde::{Deserialize, Serialize};

use crate::types::{Good, Inventory, Price};
use crate::utility::Utility;

/// Keys of the per-agent quote dictionary. `*InB`/`*InA` are barter quotes
/// (price of one good in units of the other); `*InM` are money quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuoteKey {
    AskAInB,
    BidAInB,
    AskBInA,
    BidBInA,
    AskAInM,
    BidAInM,
    AskBInM,
    BidBInM,
}

/// The quote dictionary itself. Fixed key set, every entry finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quotes {
    ask_a_in_b: Price,
    bid_a_in_b: Price,
    ask_b_in_a: Price,
    bid_b_in_a: Price,
    ask_a_in_m: Price,
    bid_a_in_m: Price,
    ask_b_in_m: Price,
    bid_b_in_m: Price,
}

impl Quotes {
    /// Placeholder quote set (everything at 1.0). Agents are constructed
    /// with this and receive real quotes during engine initialization.
    pub fn neutral() -> Quotes {
        Quotes {
            ask_a_in_b: 1.0,
            bid_a_in_b: 1.0,
            ask_b_in_a: 1.0,
            bid_b_in_a: 1.0,
            ask_a_in_m: 1.0,
            bid_a_in_m: 1.0,
            ask_b_in_m: 1.0,
            bid_b_in_m: 1.0,
        }
    }

    /// Derive all entries from the utility at the given inventory.
    ///
    /// Returns `Err` with the offending key name if any entry comes out
    /// NaN or infinite; the caller escalates that to an invariant
    /// violation rather than letting a poisoned price into matching.
    pub fn compute(
        utility: &Utility,
        inv: Inventory,
        spread: f64,
        money_lambda: f64,
    ) -> Result<Quotes, String> {
        let ab = utility.bounds_a_in_b(inv.a, inv.b);
        let ba = utility.bounds_b_in_a(inv.a, inv.b);
        let mu_a = utility.mu_a(inv.a, inv.b);
        let mu_b = utility.mu_b(inv.a, inv.b);
        let p_a_m = (mu_a / money_lambda).clamp(0.0, 1e9);
        let p_b_m = (mu_b / money_lambda).clamp(0.0, 1e9);

        let quotes = Quotes {
            ask_a_in_b: ab.min * (1.0 + spread),
            bid_a_in_b: ab.max * (1.0 - spread),
            ask_b_in_a: ba.min * (1.0 + spread),
            bid_b_in_a: ba.max * (1.0 - spread),
            ask_a_in_m: p_a_m * (1.0 + spread),
            bid_a_in_m: p_a_m * (1.0 - spread),
            ask_b_in_m: p_b_m * (1.0 + spread),
            bid_b_in_m: p_b_m * (1.0 - spread),
        };
        quotes.check_finite()?;
        Ok(quotes)
    }

    pub fn price(&self, key: QuoteKey) -> Price {
        match key {
            QuoteKey::AskAInB => self.ask_a_in_b,
            QuoteKey::BidAInB => self.bid_a_in_b,
            QuoteKey::AskBInA => self.ask_b_in_a,
            QuoteKey::BidBInA => self.bid_b_in_a,
            QuoteKey::AskAInM => self.ask_a_in_m,
            QuoteKey::BidAInM => self.bid_a_in_m,
            QuoteKey::AskBInM => self.ask_b_in_m,
            QuoteKey::BidBInM => self.bid_b_in_m,
        }
    }

    /// Ask for selling `good` against the other good.
    pub fn barter_ask(&self, good: Good) -> Price {
        match good {
            Good::A => self.ask_a_in_b,
            Good::B => self.ask_b_in_a,
        }
    }

    /// Bid for buying `good` against the other good.
    pub fn barter_bid(&self, good: Good) -> Price {
        match good {
            Good::A => self.bid_a_in_b,
            Good::B => self.bid_b_in_a,
        }
    }

    /// Ask for selling `good` against money.
    pub fn money_ask(&self, good: Good) -> Price {
        match good {
            Good::A => self.ask_a_in_m,
            Good::B => self.ask_b_in_m,
        }
    }

    /// Bid for buying `good` against money.
    pub fn money_bid(&self, good: Good) -> Price {
        match good {
            Good::A => self.bid_a_in_m,
            Good::B => self.bid_b_in_m,
        }
    }

    fn check_finite(&self) -> Result<(), String> {
        let entries = [
            (QuoteKey::AskAInB, self.ask_a_in_b),
            (QuoteKey::BidAInB, self.bid_a_in_b),
            (QuoteKey::AskBInA, self.ask_b_in_a),
            (QuoteKey::BidBInA, self.bid_b_in_a),
            (QuoteKey::AskAInM, self.ask_a_in_m),
            (QuoteKey::BidAInM, self.bid_a_in_m),
            (QuoteKey::AskBInM, self.ask_b_in_m),
            (QuoteKey::BidBInM, self.bid_b_in_m),
        ];
        for (key, value) in entries {
            if !value.is_finite() {
                return Err(format!("quote {key:?} is not finite: {value}"));
            }
        }
        Ok(())
    }
}
