pub mod account;
pub mod generation;
pub mod pipeline;
pub mod provider;
pub mod queue;
pub mod safety;
pub mod worker;
