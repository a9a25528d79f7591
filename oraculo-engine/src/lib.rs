pub mod analysis;
pub mod collapse;
pub mod config;
pub mod cycle;
pub mod parse;
pub mod reconcile;
pub mod state;
pub mod voice;
