pub mod edc;
pub mod tables;
