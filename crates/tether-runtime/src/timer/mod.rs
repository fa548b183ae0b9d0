mod fuzz;
mod periodic;

pub use fuzz::fuzzy_delay;
pub use periodic::{FnAction, PeriodicTimer, TickError, TickFuture, TimerAction};
