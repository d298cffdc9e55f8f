//! MiniLove API client
//!
//! Mirrors the signed-in session on the client side: the token and user are
//! persisted through a [`SessionStorage`], every request carries the bearer
//! header, and a 401 from the server ends the session. The [`router`] module
//! guards navigation based on that session.

pub mod client;
pub mod error;
pub mod models;
pub mod router;
pub mod session;
pub mod storage;

pub use client::ApiClient;
pub use error::{ClientError, Result};
pub use router::{before_each, page_title, Navigation};
pub use session::{Notification, NotificationKind, SessionStore};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
