pub mod catalog;
pub mod controller;
pub mod display;
pub mod errors;
pub mod execute;
pub mod extract;
pub mod runner;
pub mod stats;
pub mod template;
pub mod types;
