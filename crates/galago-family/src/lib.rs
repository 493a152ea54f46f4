#![doc = include_str!("../README.md")]

//! Galago family domain model.
//!
//! This crate defines the hole/family representation shared by every
//! synthesis component: bit-mask option domains, quotient row groups,
//! deterministic sub-models, property classification, and the flat
//! decision-tree arena.

pub mod bitset;
pub mod family;
pub mod property;
pub mod quotient;
pub mod tree;
