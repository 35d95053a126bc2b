pub mod auth;
pub mod owner;

pub use auth::AuthGuard;
pub use owner::{load_owned, Ownable};
