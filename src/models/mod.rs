pub mod generation;
pub mod job;
pub mod template;
pub mod transaction;
pub mod user;
