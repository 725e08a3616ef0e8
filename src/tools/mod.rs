pub mod command_gate;
pub mod launcher;
pub mod process_runner;
