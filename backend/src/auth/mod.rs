pub mod jwt;
pub mod middleware;
pub mod models;

pub use jwt::JwtService;
pub use middleware::{AuthMiddleware, AuthenticatedUser};
pub use models::RequesterId;
