// Session module
// Owns the single active run and publishes its state to the UI

mod run_slot;

pub use run_slot::{RunSlot, RunSnapshot, RunTicket};
