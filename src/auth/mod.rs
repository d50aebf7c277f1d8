mod helpers;
mod middleware;
mod token;

pub use middleware::{RequireAdmin, RequireUser};
pub use token::{TokenGenerator, parse_token};
