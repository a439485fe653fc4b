//! Statement import: schema, row mapping, commission and orchestration

pub mod commission;
pub mod core;
pub mod mapper;
pub mod schema;

pub use commission::*;
pub use self::core::*;
pub use mapper::*;
pub use schema::*;
