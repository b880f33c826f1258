pub mod constants;
pub mod data;
pub mod networks;
pub mod training;
