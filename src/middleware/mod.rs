pub mod resolve_institute;

pub use resolve_institute::{resolve_institute_middleware, INSTITUTE_HEADER};
