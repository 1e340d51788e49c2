pub mod config;
pub mod engine;
pub mod shared;
pub mod tools;
