//! Take-profit ladder: pricing at entry and per-bar hit processing.

use crate::config::TpLevelSpec;
use crate::domain::{Candle, Direction, ExitFill, ExitKind, Position, TpLevel};

/// Price every configured rung from the entry price.
///
/// Specs are assumed validated: strictly ascending distance, sizes summing to
/// at most 100%.
pub fn build(direction: Direction, entry_price: f64, specs: &[TpLevelSpec]) -> Vec<TpLevel> {
    specs
        .iter()
        .enumerate()
        .map(|(i, spec)| TpLevel {
            level: i + 1,
            distance_percent: spec.distance_percent,
            price: direction.offset_price(entry_price, spec.distance_percent),
            size_fraction: spec.size_percent / 100.0,
            hit: false,
            hit_index: None,
        })
        .collect()
}

/// Credit every unhit level the bar reaches, in ascending order.
///
/// A volatile bar may gap through several levels; each is filled at its own
/// price. When the last level is hit, whatever size is still open (ladders
/// summing to less than 100%) closes with it. Returns the number of levels hit.
pub fn take_profits(position: &mut Position, index: usize, candle: &Candle) -> usize {
    let direction = position.direction;
    let entry_price = position.entry_price;
    let last_level = position.tp_ladder.len();
    let mut fills = Vec::new();

    for level in position.tp_ladder.iter_mut().filter(|l| !l.hit) {
        if !level.is_reached(direction, candle.high, candle.low) {
            break;
        }
        level.hit = true;
        level.hit_index = Some(index);
        fills.push((level.level, level.price, level.size_fraction));
    }

    let hits = fills.len();
    for (level, price, size_fraction) in fills {
        let remaining = position.remaining_size_fraction;
        let size = if level == last_level {
            remaining
        } else {
            size_fraction.min(remaining)
        };
        if size <= 0.0 {
            continue;
        }
        position.exits.push(ExitFill {
            index,
            time: candle.timestamp,
            price,
            size_fraction: size,
            pnl_percent: direction.move_percent(entry_price, price),
            kind: ExitKind::TakeProfit { level },
        });
        position.remaining_size_fraction = if level == last_level {
            0.0
        } else {
            (remaining - size).max(0.0)
        };
    }

    hits
}
