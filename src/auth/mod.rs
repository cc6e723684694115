pub mod authentication;
pub mod permissions;
pub mod token;
pub mod user;

pub use authentication::*;
pub use permissions::*;
pub use user::*;
