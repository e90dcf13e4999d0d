use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Requester (list owner) id
    pub exp: usize,
    pub iat: usize,
}

/// Verified identity of the caller, placed in request extensions by
/// `AuthMiddleware`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequesterId(pub String);
