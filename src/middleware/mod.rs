pub mod api_key;
pub mod cors;

pub use api_key::{AuthenticatedUser, API_ID_HEADER, API_KEY_HEADER};
pub use cors::create_cors_layer;
