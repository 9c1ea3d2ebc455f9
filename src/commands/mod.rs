pub mod app;
pub mod collection;
