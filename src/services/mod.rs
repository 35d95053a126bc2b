pub mod google;
pub mod jwt;

pub use google::GoogleOAuthService;
pub use jwt::JwtService;
