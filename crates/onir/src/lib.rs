pub mod broker;
pub mod errors;
pub mod models;
pub mod providers;

pub use broker::{Broker, EventReceiver, RequestId};
