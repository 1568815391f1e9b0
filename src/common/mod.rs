pub mod constants;
pub mod structs;
