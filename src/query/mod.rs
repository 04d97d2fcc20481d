pub mod queries;
pub mod rows;
