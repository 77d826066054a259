//! Traffic Planner Library
//!
//! A traffic simulation library with a Q-learning traffic-light controller,
//! comparing a baseline city against an optimized one.

pub mod simulation;
