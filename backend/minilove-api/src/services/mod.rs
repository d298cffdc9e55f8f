/// Domain rules shared by handlers
pub mod emotion;
pub mod trending;
pub mod visibility;
