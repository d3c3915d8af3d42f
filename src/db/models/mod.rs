mod course;
mod download_log;
mod material;
mod user;

pub use course::*;
pub use download_log::*;
pub use material::*;
pub use user::*;
