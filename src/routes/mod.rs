pub(crate) mod health_check;
mod admin;
mod api;
mod pages;

pub use health_check::*;
pub use admin::*;
pub use api::*;
pub use pages::*;
