//! N×N×N Cube Solver Library
//!
//! Stores cube states in several interchangeable encodings, applies layer
//! turns through precomputed permutation tables, checks that a state is
//! reachable, and searches for a move sequence that solves it.

pub mod cube;
pub mod filter;
pub mod geometry;
pub mod grid;
pub mod moves;
pub mod packed;
pub mod persistence;
pub mod pieces;
pub mod solver;
pub mod verify;
pub mod worker;
