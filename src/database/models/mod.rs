pub mod institute;

pub use institute::Institute;
