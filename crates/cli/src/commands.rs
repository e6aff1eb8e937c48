pub mod run;
pub mod schema;
