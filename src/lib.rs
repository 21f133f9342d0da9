pub mod catalogue;
pub mod config;
pub mod detect;
pub mod executor;
pub mod geodesy;
pub mod imagery;
pub mod pipeline;
pub mod predict;
pub mod store;
