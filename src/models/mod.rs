pub mod request;
pub mod skill;
pub mod user;

pub use request::*;
pub use skill::*;
pub use user::*;
