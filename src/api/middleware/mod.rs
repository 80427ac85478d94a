pub mod auth;

pub use auth::RequireIdentity;
