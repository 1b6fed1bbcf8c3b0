//! Inventory partitions and the named selections used in config.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One enumerable inventory collection: (application, context).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InventoryPartition {
    /// Application namespace.
    pub app_id: u32,
    /// Context inside the application.
    pub context_id: u64,
}

impl InventoryPartition {
    pub const CS2: Self = Self::new(730, 2);
    pub const TF2: Self = Self::new(440, 2);
    pub const DOTA2: Self = Self::new(570, 2);
    /// Trading cards, backgrounds, emoticons.
    pub const COMMUNITY: Self = Self::new(753, 6);

    pub const fn new(app_id: u32, context_id: u64) -> Self {
        Self { app_id, context_id }
    }
}

impl std::fmt::Display for InventoryPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.app_id, self.context_id)
    }
}

/// Unknown name in an inventory selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("inventory selection is empty")]
    Empty,
    #[error("unknown inventory type {0:?} (expected all, cs2, tf2, dota2)")]
    Unknown(String),
}

/// Parse an inventory selection such as `all` or `cs2, tf2`.
///
/// Case and whitespace are ignored; `all` anywhere selects everything;
/// duplicates collapse in first-seen order.
///
/// # Errors
/// Returns `SelectionError` for an empty selection or an unknown name.
pub fn parse_selection(raw: &str) -> Result<Vec<InventoryPartition>, SelectionError> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let names: Vec<&str> = normalized.split(',').filter(|s| !s.is_empty()).collect();
    if names.is_empty() {
        return Err(SelectionError::Empty);
    }
    if names.contains(&"all") {
        return Ok(vec![
            InventoryPartition::CS2,
            InventoryPartition::TF2,
            InventoryPartition::DOTA2,
            InventoryPartition::COMMUNITY,
        ]);
    }

    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        let partition = match name {
            "cs2" => InventoryPartition::CS2,
            "tf2" => InventoryPartition::TF2,
            "dota2" => InventoryPartition::DOTA2,
            other => return Err(SelectionError::Unknown(other.to_string())),
        };
        if !selected.contains(&partition) {
            selected.push(partition);
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_selects_four_partitions() {
        let all = parse_selection("all").unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.contains(&InventoryPartition::COMMUNITY));
        assert_eq!(parse_selection("cs2, ALL").unwrap(), all);
    }

    #[test]
    fn test_subset_preserves_order_and_dedupes() {
        let picked = parse_selection(" TF2 ,cs2,tf2 ").unwrap();
        assert_eq!(
            picked,
            vec![InventoryPartition::TF2, InventoryPartition::CS2]
        );
    }

    #[test]
    fn test_unknown_and_empty_rejected() {
        assert_eq!(
            parse_selection("cs2,rust"),
            Err(SelectionError::Unknown("rust".to_string()))
        );
        assert_eq!(parse_selection(" , "), Err(SelectionError::Empty));
    }

    #[test]
    fn test_display() {
        assert_eq!(InventoryPartition::COMMUNITY.to_string(), "753/6");
    }
}
