//! Runtime adapters.

pub mod timer;

pub use timer::TimerRuntime;
