pub mod backend;
pub mod config;
pub mod entity;
pub mod error;
pub mod store;

pub use backend::Backend;
pub use config::StoreConfig;
pub use entity::Entity;
pub use error::{Error, Result};
pub use store::Store;
