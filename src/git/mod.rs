pub mod cache;
pub mod repository;
