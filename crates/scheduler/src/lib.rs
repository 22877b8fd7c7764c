//! Automatic, time-driven order transitions.
//!
//! Each tick scans the orders whose `next_transition_at` has passed and
//! fires their scheduled trigger through [`domain::OrderService`], with the
//! version the scan observed. A tick that races a manual change loses the
//! version check and leaves the order for the next tick.

pub mod error;
pub mod scheduler;

pub use error::{Result, SchedulerError};
pub use scheduler::{AutoTransitionScheduler, DueTransition, TickReport};
