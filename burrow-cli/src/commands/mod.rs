pub mod check;
pub mod open;
