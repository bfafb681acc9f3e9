//! Cross-order sequential purchase mining.
//!
//! Only consecutive orders of the same customer contribute: a pair is
//! (product in the earlier order) -> (product in the later order), recorded
//! with the elapsed days between the two orders. Products bought inside the
//! same order never form a sequential pair.

use std::collections::HashMap;

use super::SequentialPattern;
use crate::domain::{CustomerId, Order, ProductId};

const SECONDS_PER_DAY: f64 = 86_400.0;

pub(super) fn analyze_sequential_patterns(
    orders: &[Order],
) -> HashMap<ProductId, HashMap<ProductId, SequentialPattern>> {
    let mut by_customer: HashMap<&CustomerId, Vec<&Order>> = HashMap::new();
    for order in orders {
        by_customer.entry(&order.customer_id).or_default().push(order);
    }

    let mut observations: HashMap<ProductId, HashMap<ProductId, Vec<f64>>> = HashMap::new();

    for sequence in by_customer.values_mut() {
        sequence.sort_by_key(|order| order.created_at);

        for pair in sequence.windows(2) {
            let (earlier, later) = (pair[0], pair[1]);
            let elapsed_days =
                (later.created_at - earlier.created_at).num_seconds() as f64 / SECONDS_PER_DAY;

            for from in earlier.product_ids() {
                for to in later.product_ids() {
                    if from == to {
                        continue;
                    }
                    observations
                        .entry(from.clone())
                        .or_default()
                        .entry(to)
                        .or_default()
                        .push(elapsed_days);
                }
            }
        }
    }

    observations
        .into_iter()
        .map(|(from, followers)| {
            let patterns = followers
                .into_iter()
                .map(|(to, occurrences)| (to, aggregate(occurrences)))
                .collect();
            (from, patterns)
        })
        .collect()
}

fn aggregate(mut occurrences: Vec<f64>) -> SequentialPattern {
    occurrences.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let count = occurrences.len() as u64;
    let avg_days = occurrences.iter().sum::<f64>() / occurrences.len() as f64;
    let median_days = if occurrences.len() % 2 == 1 {
        occurrences[occurrences.len() / 2]
    } else {
        let upper = occurrences.len() / 2;
        (occurrences[upper - 1] + occurrences[upper]) / 2.0
    };

    SequentialPattern { count, avg_days, median_days, occurrences }
}
