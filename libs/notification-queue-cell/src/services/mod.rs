pub mod queue;
pub mod redis_queue;
pub mod producer;
pub mod transport;
pub mod worker;

pub use queue::*;
pub use redis_queue::*;
pub use producer::*;
pub use transport::*;
pub use worker::*;
