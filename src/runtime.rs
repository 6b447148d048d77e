//! Runtime for executing conversation turns
//!
//! [`TurnRunner`] feeds events into the pure state machine and performs the
//! effects it returns against the model, the function dispatcher, the
//! transcript store and the user-facing output.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::TurnRunner;
pub use traits::*;
