pub mod connector;
pub mod editor;
pub mod history;
pub mod logger;
pub mod session;
