pub mod delivery;
pub mod intake;
pub mod issue;
pub mod sweep;
pub mod validate;
