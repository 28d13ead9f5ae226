pub mod properties;
pub mod sink;
