//! Utility data structures shared by the writer and reader sides.

pub mod cow_vec;
