//! Items Module
//!
//! The thin CRUD collaborator whose write calls feed the observability
//! pipeline. Items live in memory for the lifetime of the process.
//!
//! - **`state`** - `ItemStore` and the item model
//! - **`handlers`** - HTTP handlers for `/api/items`

pub mod handlers;
pub mod state;

pub use handlers::SharedItems;
pub use state::{Item, ItemInput, ItemPatch, ItemStore};
