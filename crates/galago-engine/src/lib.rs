#![doc = include_str!("../README.md")]

//! Galago synthesis engine.
//!
//! This crate holds the algorithms the refinement loop drives: the static
//! [`coloring::Coloring`], the symbolic [`coloring_smt::ColoringSmt`], and
//! the [`counterexample::CounterexampleGenerator`], together with the
//! external model-checker interface and result/profiling types.

pub mod checker;
pub mod coloring;
pub mod coloring_smt;
pub mod counterexample;
pub mod result;
