mod cli;
mod parsers;


pub use cli::{FleetArgs, Role};
