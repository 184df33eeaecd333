// ABOUTME: Configuration and constants for the expression interpreter

pub const VERSION: &str = "1.0.0";

/// Initial semi-space capacity, in objects, for a freshly constructed
/// [`crate::step::Machine`]. Doubles on `Heap::grow`.
pub const INITIAL_HEAP_CAPACITY: usize = 4096;

/// Slots reserved below capacity before a collection is forced. Mirrors the
/// source's `safety_margin` constant.
pub const SAFETY_MARGIN: usize = 16;

/// `clap`'s `--help` text for the CLI.
pub const CLI_ABOUT: &str = "Interprets a small expression language";
