pub mod config;
pub mod disrupt;
pub mod error;
pub mod record;
pub mod store;

pub use config::{ConnectConfig, Credentials};
pub use disrupt::{DisruptError, Disruptor};
pub use error::{ErrorKind, StoreError};
pub use record::{NewRecord, Record, User};
pub use store::{BoxFuture, Connection, ConnectionFactory};
