pub mod breezer;
pub mod config;
pub mod dispatch;
pub mod pi;
pub mod protocol;
pub mod state;
