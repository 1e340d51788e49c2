pub mod clock;
pub mod fs_atomic;
pub mod ids;
pub mod logging;
