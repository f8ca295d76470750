pub mod elements;
pub mod expr;
