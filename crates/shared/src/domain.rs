use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

id_newtype!(ItemId);
id_newtype!(CategoryId);

/// Per-item tri-state marker. Stores and the wire carry only the two set
/// marks; key absence means `Unset`, and conversion happens at the store
/// boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Unset,
    Shortlisted,
    Purchased,
}

impl ItemStatus {
    pub fn is_set(self) -> bool {
        !matches!(self, ItemStatus::Unset)
    }

    /// Storage form. `None` for `Unset`, which is never persisted.
    pub fn as_stored(self) -> Option<&'static str> {
        match self {
            ItemStatus::Unset => None,
            ItemStatus::Shortlisted => Some("shortlisted"),
            ItemStatus::Purchased => Some("purchased"),
        }
    }

    /// Parses the storage form. Unknown values map to `Unset` so callers
    /// drop invalid rows instead of failing the whole read.
    pub fn from_stored(raw: &str) -> Self {
        match raw {
            "shortlisted" => ItemStatus::Shortlisted,
            "purchased" => ItemStatus::Purchased,
            _ => ItemStatus::Unset,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_stored().unwrap_or("unset"))
    }
}

/// A purchasable product entry. Immutable once fetched except via an
/// explicit add; display order within its category is append order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_preferred: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// A named, icon-tagged grouping of items with display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_deadline: Option<String>,
    #[serde(default)]
    pub items: Vec<Item>,
}
