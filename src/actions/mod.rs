mod connect;
mod create;
mod delete;
mod list;
mod materialize;
mod volume;

pub use connect::*;
pub use create::*;
pub use delete::*;
pub use list::*;
pub use materialize::*;
pub use volume::*;
