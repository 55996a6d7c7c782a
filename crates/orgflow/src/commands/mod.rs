pub mod apply;
pub mod plan;
pub mod status;
pub mod validate;
