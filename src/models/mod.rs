pub mod deposit;
pub mod profile;
pub mod response;
pub mod upstream;

pub use deposit::*;
pub use profile::*;
pub use response::*;
pub use upstream::*;
