//! Item storage with change detection

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use hass_events::ItemValue;

use crate::error::{RegistryError, Result};

/// A locally cached item
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub name: String,
    pub value: ItemValue,
    /// Last time any value was written, changed or not
    pub last_update: DateTime<Utc>,
    /// Last time the value actually changed
    pub last_change: DateTime<Utc>,
}

impl Item {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            value: ItemValue::Undefined,
            last_update: now,
            last_change: now,
        }
    }

    pub fn with_value(mut self, value: ItemValue) -> Self {
        self.value = value;
        self
    }

    /// Write a value, returning whether it differed from the previous one
    fn set_value(&mut self, value: ItemValue) -> bool {
        let now = Utc::now();
        self.last_update = now;
        if self.value == value {
            return false;
        }
        self.value = value;
        self.last_change = now;
        true
    }
}

/// Thread-safe registry of items keyed by name
#[derive(Debug, Default)]
pub struct ItemRegistry {
    items: RwLock<HashMap<String, Item>>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item. Fails if an item with the same name exists.
    pub fn add(&self, item: Item) -> Result<()> {
        let mut items = self.items.write().map_err(|_| RegistryError::LockPoisoned)?;
        if items.contains_key(&item.name) {
            return Err(RegistryError::ItemExists(item.name));
        }
        items.insert(item.name.clone(), item);
        Ok(())
    }

    /// Remove an item, returning it
    pub fn remove(&self, name: &str) -> Result<Item> {
        let mut items = self.items.write().map_err(|_| RegistryError::LockPoisoned)?;
        items
            .remove(name)
            .ok_or_else(|| RegistryError::ItemNotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<Item> {
        self.items.read().ok()?.get(name).cloned()
    }

    pub fn value(&self, name: &str) -> Option<ItemValue> {
        self.items.read().ok()?.get(name).map(|item| item.value.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items
            .read()
            .map(|items| items.contains_key(name))
            .unwrap_or(false)
    }

    /// Write the cached value of an existing item.
    ///
    /// Returns whether the value changed, or [`RegistryError::ItemNotFound`].
    pub fn set_value(&self, name: &str, value: ItemValue) -> Result<bool> {
        let mut items = self.items.write().map_err(|_| RegistryError::LockPoisoned)?;
        let item = items
            .get_mut(name)
            .ok_or_else(|| RegistryError::ItemNotFound(name.to_string()))?;
        Ok(item.set_value(value))
    }

    /// Item names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .items
            .read()
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut items) = self.items.write() {
            items.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get() {
        let registry = ItemRegistry::new();
        assert!(registry.is_empty());

        registry
            .add(Item::new("Light").with_value(ItemValue::OnOff(false)))
            .unwrap();

        assert!(registry.contains("Light"));
        assert_eq!(registry.value("Light"), Some(ItemValue::OnOff(false)));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.add(Item::new("Light")),
            Err(RegistryError::ItemExists("Light".to_string()))
        );
    }

    #[test]
    fn test_set_value_change_detection() {
        let registry = ItemRegistry::new();
        registry.add(Item::new("Temp")).unwrap();
        let before = registry.get("Temp").unwrap();

        assert_eq!(registry.set_value("Temp", ItemValue::Number(20.0)), Ok(true));
        assert_eq!(registry.set_value("Temp", ItemValue::Number(20.0)), Ok(false));

        let after = registry.get("Temp").unwrap();
        assert_eq!(after.value, ItemValue::Number(20.0));
        assert!(after.last_update >= before.last_update);
        assert!(after.last_change >= before.last_change);
    }

    #[test]
    fn test_set_value_unknown_item() {
        let registry = ItemRegistry::new();
        assert_eq!(
            registry.set_value("Missing", ItemValue::Undefined),
            Err(RegistryError::ItemNotFound("Missing".to_string()))
        );
    }

    #[test]
    fn test_remove_and_names() {
        let registry = ItemRegistry::new();
        registry.add(Item::new("B")).unwrap();
        registry.add(Item::new("A")).unwrap();
        assert_eq!(registry.names(), vec!["A".to_string(), "B".to_string()]);

        let removed = registry.remove("A").unwrap();
        assert_eq!(removed.name, "A");
        assert!(registry.remove("A").is_err());

        registry.clear();
        assert!(registry.is_empty());
    }
}
