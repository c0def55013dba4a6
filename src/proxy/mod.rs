pub mod context;
pub mod fanout;
pub mod forward;

pub use context::{BoxBody, RequestContext};
