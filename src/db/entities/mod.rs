//! Database entities

pub mod local_state;
