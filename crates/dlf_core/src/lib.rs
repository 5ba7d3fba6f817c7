//! Rule engine for Path of Exile loot filters: block parsing that keeps
//! untouched text byte-identical, edits addressed by `$type`/`$tier` tags,
//! first-match-wins item matching, and per-profile change logs replayed onto
//! freshly downloaded filters.

pub mod core_api;
pub mod filter;
pub mod item;
pub mod layout;
pub mod matcher;
pub mod reader;
pub mod visibility;

pub use core_api::{CoreError, CoreErrorCode, Engine, Session};
pub use filter::FilterDocument;
pub use item::Item;
pub use visibility::Visibility;
