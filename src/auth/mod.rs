pub mod handlers;
pub mod login;
pub mod session;

pub use login::{LogMailer, LoginMail, Mailer};
