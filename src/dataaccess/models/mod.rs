pub mod group;
pub mod role;
pub mod token;
pub mod user;

pub use group::Group;
pub use role::{Role, RolePermission};
pub use token::Token;
pub use user::User;
