mod entitlement;
mod order;
mod payment;
mod tool;
mod user;

pub use entitlement::*;
pub use order::*;
pub use payment::*;
pub use tool::*;
pub use user::*;
