//! Types shared across the post collector crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
