//! Domain types for the pipeline input.

pub mod bar;

pub use bar::Bar;
