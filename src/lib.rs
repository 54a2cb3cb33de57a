//! Messaging core of the theBandFam client: conversation state, the
//! repository boundary, and the hosted-backend and cache implementations.

pub mod api;
pub mod app;
pub mod error;
pub mod messaging;
pub mod storage;
pub mod ui;
pub mod utils;

pub use error::{MessagingError, RepositoryError, Result, SessionError};
