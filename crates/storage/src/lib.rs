pub mod error;
mod inspect;
mod models;
mod path;
mod root;

pub use crate::inspect::inspect;
pub use crate::models::{FileInfo, Transfer, Transferred};
pub use crate::path::validate as validate_path;
pub use crate::root::LibraryRoot;
