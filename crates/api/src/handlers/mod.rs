pub mod line;
pub mod polling;
