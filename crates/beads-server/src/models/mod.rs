pub mod bead;

pub use bead::*;
