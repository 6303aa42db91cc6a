pub mod analytics;
pub mod credentials;
pub mod deposit;
pub mod memory_store;
pub mod provider;
pub mod redis_store;
pub mod store;

pub use analytics::Analytics;
pub use credentials::{CredentialValidator, RequestContext};
pub use deposit::DepositService;
pub use memory_store::MemoryStore;
pub use provider::{KobaruClient, PaymentProvider};
pub use redis_store::RedisStore;
pub use store::{DepositStore, StoreResult};
