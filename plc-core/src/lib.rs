//! In-process shared-variable store for PLC-style control logic: a
//! concurrent [`Memory`](memory::Memory) of tagged [`Value`](value::Value)s,
//! observer-driven change notification, and a [`Controller`](controller::Controller)
//! wait engine with edge- and level-triggered waits plus heartbeat liveness.

pub mod controller;
pub mod logic;
pub mod memory;
pub mod value;

pub use controller::Controller;
pub use logic::Logic;
pub use memory::{Memory, Observer};
pub use value::Value;
