use std::collections::HashMap;

use serde::Serialize;
use shared::domain::{Category, ItemId, ItemStatus};

/// Summary figures for the whole list against a spending ceiling.
///
/// `remaining` may be negative; over-budget is flagged, never clamped.
/// The bar percentages are the only clamped values: they drive a stacked
/// two-segment rendering whose segments must not add up past 100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub total_items: usize,
    pub total_estimated: f64,
    pub shortlisted_count: usize,
    pub shortlisted_total: f64,
    pub purchased_count: usize,
    pub purchased_total: f64,
    pub remaining: f64,
    pub purchased_bar_pct: f64,
    pub shortlisted_bar_pct: f64,
    pub over_budget: bool,
}

/// Computes the summary in a single pass over every item, in category
/// order then item order, so float accumulation is reproducible. A missing
/// price contributes nothing to the totals but the item still counts.
pub fn summarize(
    categories: &[Category],
    statuses: &HashMap<ItemId, ItemStatus>,
    budget: f64,
) -> BudgetSummary {
    let mut total_items = 0usize;
    let mut total_estimated = 0.0f64;
    let mut shortlisted_count = 0usize;
    let mut shortlisted_total = 0.0f64;
    let mut purchased_count = 0usize;
    let mut purchased_total = 0.0f64;

    for category in categories {
        for item in &category.items {
            total_items += 1;
            let price = item.price.unwrap_or(0.0);
            total_estimated += price;
            match statuses.get(&item.id).copied().unwrap_or_default() {
                ItemStatus::Shortlisted => {
                    shortlisted_count += 1;
                    shortlisted_total += price;
                }
                ItemStatus::Purchased => {
                    purchased_count += 1;
                    purchased_total += price;
                }
                ItemStatus::Unset => {}
            }
        }
    }

    let remaining = budget - purchased_total;
    let purchased_bar_pct = bucket_pct(purchased_total, budget).min(100.0);
    let shortlisted_bar_pct =
        bucket_pct(shortlisted_total, budget).min(100.0 - purchased_bar_pct);

    BudgetSummary {
        total_items,
        total_estimated,
        shortlisted_count,
        shortlisted_total,
        purchased_count,
        purchased_total,
        remaining,
        purchased_bar_pct,
        shortlisted_bar_pct,
        over_budget: remaining < 0.0,
    }
}

fn bucket_pct(bucket_total: f64, budget: f64) -> f64 {
    if budget <= 0.0 {
        0.0
    } else {
        bucket_total / budget * 100.0
    }
}
