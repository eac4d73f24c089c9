//! 持久化实现

mod error_mapper;
mod memory;
mod migrations;
mod settings_repository;
mod tx_repositories;
mod unit_of_work;

pub use error_mapper::map_sqlx_error;
pub use memory::{InMemorySettings, InMemoryUnitOfWorkFactory};
pub use migrations::migrations;
pub use settings_repository::PostgresSettingsRepository;
pub use tx_repositories::SharedTx;
pub use unit_of_work::{PostgresUnitOfWork, PostgresUnitOfWorkFactory};
