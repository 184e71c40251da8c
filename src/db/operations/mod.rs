//! Query functions over a single connection.
//!
//! Every function takes `&mut SqliteConnection` so callers can run several of
//! them inside one transaction (`&mut *tx`) or on a pooled connection.

pub mod plans;
pub mod progress;
pub mod requirements;
pub mod students;

pub use plans::*;
pub use progress::*;
pub use requirements::*;
pub use students::*;

pub(crate) fn decode_error(message: impl Into<String>) -> sqlx::Error {
    sqlx::Error::Decode(message.into().into())
}
