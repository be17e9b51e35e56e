pub mod surplus;
pub mod user_defined;
