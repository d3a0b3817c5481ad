pub mod code;
pub mod debug;
pub mod health;
