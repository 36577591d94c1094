//! Core types and data models for the prompt auto-optimizer
//!
//! This crate provides the fundamental data structures shared across the
//! experimentation engine: experiments and their per-arm metric accumulators,
//! variant descriptions exchanged with the variant registry, and mutation
//! strategy definitions used by the variant generator.

pub mod experiments;
pub mod strategies;
pub mod variants;
