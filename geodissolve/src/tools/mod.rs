pub mod dissolve;
pub mod probe;
