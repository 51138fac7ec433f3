// Peer connection management module

pub mod state;
pub mod registry;
pub mod bans;
pub mod broadcaster;
pub mod handler;
