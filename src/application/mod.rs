pub mod actors;
pub mod notify;
