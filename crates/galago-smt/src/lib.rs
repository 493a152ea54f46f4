#![doc = include_str!("../README.md")]

//! SMT terms, the solver trait, and backends.
//!
//! Every solver interaction in galago goes through [`solver::SmtSolver`];
//! queries scope their assertions with [`solver::with_scope`] so no
//! assertion outlives the query that pushed it.

pub mod backends;
pub mod solver;
pub mod sorts;
pub mod terms;
