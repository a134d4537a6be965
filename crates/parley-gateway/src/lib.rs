pub mod bridge;
pub mod broker;
pub mod relay;
pub mod stream;
