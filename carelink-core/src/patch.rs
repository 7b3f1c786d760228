//! Partial-update helpers
//!
//! Update bodies only touch the keys they contain. For nullable columns the
//! field type is `Option<Option<T>>`:
//! - key absent → `None` (leave column alone)
//! - key `null` → `Some(None)` (clear column)
//! - key value  → `Some(Some(v))`
//!
//! ```
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Changes {
//!     #[serde(default, deserialize_with = "carelink_core::patch::nullable")]
//!     gender: Option<Option<String>>,
//! }
//!
//! let c: Changes = serde_json::from_str(r#"{"gender": null}"#).unwrap();
//! assert_eq!(c.gender, Some(None));
//! ```

use serde::{Deserialize, Deserializer};

/// Deserialize a present key (including `null`) as `Some(..)`.
pub fn nullable<'de, T, D>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

/// Apply a non-nullable change.
pub fn set<T>(target: &mut T, change: Option<T>) {
    if let Some(value) = change {
        *target = value;
    }
}

/// Apply a nullable change.
pub fn set_nullable<T>(target: &mut Option<T>, change: Option<Option<T>>) {
    if let Some(value) = change {
        *target = value;
    }
}
