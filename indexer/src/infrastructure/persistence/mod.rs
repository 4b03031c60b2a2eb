pub mod connection;
pub mod entities;
pub mod error;
pub mod factory;
pub mod memory;
pub mod repositories;
pub mod sea_orm_store;
pub mod store;

pub use connection::DbPool;
pub use error::DbError;
pub use factory::RepositoryFactory;
pub use memory::{MemoryStore, Tables};
pub use repositories::Repositories;
pub use sea_orm_store::SeaOrmStore;
pub use store::Store;
