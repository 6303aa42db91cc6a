pub mod deposit;
pub mod health;
pub mod profile;
pub mod stats;

pub use deposit::*;
pub use health::*;
pub use profile::*;
pub use stats::*;
