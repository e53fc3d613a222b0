// Lingflow Infrastructure - Local filesystem adapters

mod archive;
mod log_file;
mod state_file;
mod watcher;

pub use archive::ZipAssembler;
pub use log_file::SessionLog;
pub use state_file::FileStateStore;
pub use watcher::watch_credentials;
