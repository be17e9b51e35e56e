pub mod base;
pub mod linear;
pub mod linear_stretched;
