//! Core math modules.

pub mod chi_square;
pub mod extended_stats;
pub mod gamma;
pub mod stable;
