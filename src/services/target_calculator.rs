//! Target Calculator
//!
//! Turns broker-accumulation and order-book aggregates into smart-money
//! price levels. Pure and deterministic; callers validate inputs first.
//!
//! Formula (IDX "bandarmology" convention):
//!
//! ```text
//! fraksi            = tick size of the close-price bracket
//! total_papan       = (ara - arb) / fraksi
//! rata_rata_bid_ofer = (total_bid/100 + total_offer/100) / total_papan
//! a                 = rata_rata_bandar * 5%
//! p                 = barang_bandar / rata_rata_bid_ofer
//! target_realistis  = rata_rata_bandar + a + (p / 2) * fraksi
//! target_max        = rata_rata_bandar + a + p * fraksi
//! ```
//!
//! Targets are rounded to the nearest tick. Zero divisors resolve to 0.

use crate::error::{AppError, Result};
use crate::provider::types::{BrokerAggregate, OrderBookSnapshot};
use serde::{Deserialize, Serialize};

/// Anchor "a" as a fraction of the average accumulation price
pub const ANCHOR_A_RATE: f64 = 0.05;

/// IDX equity tick-size schedule: (upper bound exclusive, tick)
const TICK_SCHEDULE: [(f64, f64); 4] = [(200.0, 1.0), (500.0, 2.0), (2_000.0, 5.0), (5_000.0, 10.0)];
const TOP_TICK: f64 = 25.0;

/// Minimum price increment (fraksi) for a price
pub fn tick_size(price: f64) -> f64 {
    TICK_SCHEDULE
        .iter()
        .find(|(upper, _)| price < *upper)
        .map(|(_, tick)| *tick)
        .unwrap_or(TOP_TICK)
}

/// Calculator inputs, lot totals already normalized to board lots (÷100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetInputs {
    pub avg_accumulated_price: f64,
    pub accumulated_lots: f64,
    pub best_offer_price: f64,
    pub best_bid_price: f64,
    pub total_bid_lots_100: f64,
    pub total_offer_lots_100: f64,
    pub close_price: f64,
}

impl TargetInputs {
    /// Assemble inputs from the typed provider records
    pub fn from_market(broker: &BrokerAggregate, book: &OrderBookSnapshot) -> Self {
        Self {
            avg_accumulated_price: broker.average_accumulated_price,
            accumulated_lots: broker.accumulated_lots as f64,
            best_offer_price: book.best_offer_price,
            best_bid_price: book.best_bid_price,
            total_bid_lots_100: book.bid_lots_100(),
            total_offer_lots_100: book.offer_lots_100(),
            close_price: book.close_price,
        }
    }

    /// Reject NaN, infinite and negative values
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("avg_accumulated_price", self.avg_accumulated_price),
            ("accumulated_lots", self.accumulated_lots),
            ("best_offer_price", self.best_offer_price),
            ("best_bid_price", self.best_bid_price),
            ("total_bid_lots_100", self.total_bid_lots_100),
            ("total_offer_lots_100", self.total_offer_lots_100),
            ("close_price", self.close_price),
        ];

        for (name, value) in fields {
            if !value.is_finite() {
                return Err(AppError::Validation(format!("{} is not a finite number", name)));
            }
            if value < 0.0 {
                return Err(AppError::Validation(format!("{} is negative: {}", name, value)));
            }
        }

        Ok(())
    }
}

/// Calculator output, one per (symbol, date)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetFigures {
    pub tick_size: f64,
    pub board_count: f64,
    pub average_bid_offer: f64,
    pub anchor_a: f64,
    pub anchor_p: f64,
    pub target_realistic: f64,
    pub target_max: f64,
}

impl TargetFigures {
    /// Describe a broken target contract, if any
    ///
    /// Targets must be ordered and must not sit below the current price.
    pub fn contract_violation(&self, close_price: f64) -> Option<String> {
        if self.target_max < self.target_realistic {
            return Some(format!(
                "target_max {} is below target_realistic {}",
                self.target_max, self.target_realistic
            ));
        }
        if self.target_realistic < close_price {
            return Some(format!(
                "target_realistic {} is below close price {}",
                self.target_realistic, close_price
            ));
        }
        None
    }
}

/// Target computation seam
pub trait TargetCalculator: Send + Sync {
    fn compute(&self, inputs: &TargetInputs) -> TargetFigures;
}

/// Default calculator implementing the formula in the module docs
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartMoneyCalculator;

impl SmartMoneyCalculator {
    #[allow(clippy::too_many_arguments)]
    pub fn calculate(
        avg_accumulated_price: f64,
        accumulated_lots: f64,
        best_offer_price: f64,
        best_bid_price: f64,
        total_bid_lots_100: f64,
        total_offer_lots_100: f64,
        close_price: f64,
    ) -> TargetFigures {
        let tick = tick_size(close_price);

        let board_count = ((best_offer_price - best_bid_price) / tick).max(0.0);

        let average_bid_offer = if board_count > 0.0 {
            (total_bid_lots_100 + total_offer_lots_100) / board_count
        } else {
            0.0
        };

        let anchor_a = avg_accumulated_price * ANCHOR_A_RATE;

        let anchor_p = if average_bid_offer > 0.0 {
            accumulated_lots / average_bid_offer
        } else {
            0.0
        };

        let base = avg_accumulated_price + anchor_a;
        let target_realistic = round_to_tick(base + (anchor_p / 2.0) * tick, tick);
        let target_max = round_to_tick(base + anchor_p * tick, tick);

        TargetFigures {
            tick_size: tick,
            board_count,
            average_bid_offer,
            anchor_a,
            anchor_p,
            target_realistic,
            target_max,
        }
    }
}

impl TargetCalculator for SmartMoneyCalculator {
    fn compute(&self, inputs: &TargetInputs) -> TargetFigures {
        Self::calculate(
            inputs.avg_accumulated_price,
            inputs.accumulated_lots,
            inputs.best_offer_price,
            inputs.best_bid_price,
            inputs.total_bid_lots_100,
            inputs.total_offer_lots_100,
            inputs.close_price,
        )
    }
}

fn round_to_tick(value: f64, tick: f64) -> f64 {
    (value / tick).round() * tick
}
