use std::collections::HashMap;

use shared::domain::{Category, ItemId, ItemStatus};

/// Status predicate for the list view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    ToBuy,
    Shortlisted,
    Purchased,
}

impl StatusFilter {
    fn matches(self, status: ItemStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::ToBuy => !status.is_set(),
            StatusFilter::Shortlisted => status == ItemStatus::Shortlisted,
            StatusFilter::Purchased => status == ItemStatus::Purchased,
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "all" => Ok(StatusFilter::All),
            "to-buy" => Ok(StatusFilter::ToBuy),
            "shortlisted" => Ok(StatusFilter::Shortlisted),
            "purchased" => Ok(StatusFilter::Purchased),
            other => Err(format!(
                "unknown filter '{other}' (expected all, to-buy, shortlisted or purchased)"
            )),
        }
    }
}

/// Applies search and status filtering the way the list view renders it:
/// an item stays when its own name or its category's name matches the
/// search (case-insensitive) and its status passes the filter. Categories
/// left with no items are dropped.
pub fn filtered_categories(
    categories: &[Category],
    statuses: &HashMap<ItemId, ItemStatus>,
    search: &str,
    filter: StatusFilter,
) -> Vec<Category> {
    let needle = search.trim().to_lowercase();
    categories
        .iter()
        .map(|category| {
            let category_matches = category.name.to_lowercase().contains(&needle);
            let items: Vec<_> = category
                .items
                .iter()
                .filter(|item| {
                    let matches_search = needle.is_empty()
                        || category_matches
                        || item.name.to_lowercase().contains(&needle);
                    let status = statuses.get(&item.id).copied().unwrap_or_default();
                    matches_search && filter.matches(status)
                })
                .cloned()
                .collect();
            Category {
                items,
                ..category.clone()
            }
        })
        .filter(|category| !category.items.is_empty())
        .collect()
}
