pub mod errors;
pub mod sync;
pub mod vault;

pub use errors::AppError;
pub use sync::{SyncEngine, SyncOptions};
pub use vault::Vault;
