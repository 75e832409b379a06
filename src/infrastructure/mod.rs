pub mod clock;
pub mod events;
pub mod memory;
pub mod persistence;
