//! Entity identity, values and state.

mod id;
mod state;
mod value;

pub use id::EntityId;
pub use state::{EntityState, EntityStatus};
pub use value::{Association, Value};
