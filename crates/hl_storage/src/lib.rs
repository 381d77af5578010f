use async_trait::async_trait;
use hl_core::config::{StorageConfig, StorageKind};
use hl_core::{ArticleStorage, NoteStorage, Result, Stores};

pub mod backends;

pub use backends::*;

/// A backend that can be opened from configuration and serves both the
/// article and note collections.
#[async_trait]
pub trait StorageBackend: ArticleStorage + NoteStorage + Sized + 'static {
    fn get_error_message() -> &'static str;
    async fn open(config: &StorageConfig) -> Result<Self>;
}

/// Open the configured backend and hand out its collection handles.
pub async fn create_storage(config: &StorageConfig) -> Result<Stores> {
    match config.backend {
        StorageKind::Memory => open_backend::<MemoryStorage>(config).await,
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => open_backend::<SQLiteStorage>(config).await,
        #[cfg(not(feature = "sqlite"))]
        StorageKind::Sqlite => Err(hl_core::Error::Config(
            "sqlite storage requires the `sqlite` feature".to_string(),
        )),
    }
}

async fn open_backend<B: StorageBackend>(config: &StorageConfig) -> Result<Stores> {
    match B::open(config).await {
        Ok(backend) => Ok(Stores::from_backend(backend)),
        Err(e) => {
            tracing::error!("{}: {}", B::get_error_message(), e);
            Err(e)
        }
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageBackend};
}
