use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::backend::error::BackendError;

/// Longest accepted item name, in characters
pub const MAX_NAME_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /api/items` and `PUT /api/items/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct ItemInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of `PATCH /api/items/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// In-memory item collection
#[derive(Debug, Default)]
pub struct ItemStore {
    items: BTreeMap<u64, Item>,
    next_id: u64,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Vec<Item> {
        self.items.values().cloned().collect()
    }

    pub fn get(&self, id: u64) -> Result<&Item, BackendError> {
        self.items.get(&id).ok_or_else(|| BackendError::not_found("item", id.to_string()))
    }

    pub fn create(&mut self, input: ItemInput) -> Result<Item, BackendError> {
        let name = validate_name(&input.name)?;
        self.ensure_unique(&name, None)?;

        self.next_id += 1;
        let now = Utc::now();
        let item = Item {
            id: self.next_id,
            name,
            description: input.description,
            created_at: now,
            updated_at: now,
        };
        self.items.insert(item.id, item.clone());
        Ok(item)
    }

    /// Full update
    pub fn replace(&mut self, id: u64, input: ItemInput) -> Result<Item, BackendError> {
        self.get(id)?;
        let name = validate_name(&input.name)?;
        self.ensure_unique(&name, Some(id))?;

        let item = self
            .items
            .get_mut(&id)
            .ok_or_else(|| BackendError::not_found("item", id.to_string()))?;
        item.name = name;
        item.description = input.description;
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    /// Partial update; absent fields keep their value
    pub fn patch(&mut self, id: u64, patch: ItemPatch) -> Result<Item, BackendError> {
        self.get(id)?;
        let name = patch.name.as_deref().map(validate_name).transpose()?;
        if let Some(name) = &name {
            self.ensure_unique(name, Some(id))?;
        }

        let item = self
            .items
            .get_mut(&id)
            .ok_or_else(|| BackendError::not_found("item", id.to_string()))?;
        if let Some(name) = name {
            item.name = name;
        }
        if let Some(description) = patch.description {
            item.description = Some(description);
        }
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    pub fn remove(&mut self, id: u64) -> Result<Item, BackendError> {
        self.items
            .remove(&id)
            .ok_or_else(|| BackendError::not_found("item", id.to_string()))
    }

    fn ensure_unique(&self, name: &str, except: Option<u64>) -> Result<(), BackendError> {
        let taken = self
            .items
            .values()
            .any(|item| Some(item.id) != except && item.name.eq_ignore_ascii_case(name));
        if taken {
            return Err(BackendError::conflict(format!("an item named '{name}' already exists")));
        }
        Ok(())
    }
}

fn validate_name(raw: &str) -> Result<String, BackendError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(BackendError::validation("name", "name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(BackendError::validation(
            "name",
            format!("name must be at most {MAX_NAME_CHARS} characters"),
        ));
    }
    Ok(name.to_string())
}
