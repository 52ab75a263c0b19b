// src/lib.rs

pub mod api;
pub mod app_state;
pub mod backend;
pub mod config;
pub mod error;
pub mod object;
pub mod store;
