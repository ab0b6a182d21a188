pub mod draft;
pub mod errors;
