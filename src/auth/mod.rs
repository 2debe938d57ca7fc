pub mod google;
pub mod jwt;
pub mod session;

pub use jwt::JwtSession;
pub use session::{RequestSession, SessionClient, SessionProvider, SessionState, SessionSubscription};
