pub mod clock;
pub mod gui;
pub mod logging;
pub mod mark_sync;
pub mod time;
pub mod workspace;
