pub mod cli;
pub mod config;
pub mod flock;
pub mod git;
pub mod includes;
pub mod model;
pub mod pipeline;
pub mod tree;
pub mod workspace;

mod api;
pub use api::{Vendorfetch, VendorfetchBuilder};
