//! Order-by lists and their compilation into order clauses
//!
//! Entries that sort through relationships add one left join per distinct
//! relationship path; the clauses themselves reference the join alias.

mod ast;
mod compile;
mod parse;

pub use ast::OrderNode;
pub use compile::{compile, join_alias};
pub use parse::parse_order;
