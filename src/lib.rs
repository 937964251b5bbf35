pub mod draw;
pub mod logging;
pub mod persistence;
pub mod replay;
pub mod session;
pub mod settings;
