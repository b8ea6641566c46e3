mod identity;
mod course;
mod enrollment;
mod message;
mod notification;
mod newsletter;
mod session;

pub use identity::*;
pub use course::*;
pub use enrollment::*;
pub use message::*;
pub use notification::*;
pub use newsletter::*;
pub use session::*;
