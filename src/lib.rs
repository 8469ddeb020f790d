pub mod config;
pub mod duration;
pub mod error;
pub mod identity;
pub mod logging;
pub mod mime_types;
pub mod object_id;
pub mod path_safety;
pub mod ssdp;
pub mod state;
pub mod web;
