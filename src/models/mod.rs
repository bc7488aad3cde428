mod game;
pub use game::*;

mod publisher;
pub use publisher::*;

mod user;
pub use user::*;

mod review;
pub use review::*;
