pub mod files;
pub mod users;

pub use files::{NewPdfFile, PdfFile};
pub use users::{NewUser, SessionUser, User};
