// Library surface for headless/integration tests and reuse.
// Terminal drawing stays in the binary.
pub mod app;
pub mod app_dirs;
pub mod bus;
pub mod catalog;
pub mod celebration;
pub mod config;
pub mod editor;
pub mod runtime;
pub mod session;
pub mod stats;
pub mod store;
pub mod timer;
pub mod transfer;
pub mod util;
