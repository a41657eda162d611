//! Token set and secret wrappers persisted by the token store.

pub mod record;
pub mod secret;
