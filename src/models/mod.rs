pub mod photo;
pub mod share;
pub mod tournament;
pub mod user;

pub use photo::*;
pub use share::*;
pub use tournament::*;
pub use user::*;
