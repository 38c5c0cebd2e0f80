//! Passwordless email login.
//!
//! `auth(email)` registers or finds the user and mails a single-use link.
//! Following the link trades the login token for a session.

use async_trait::async_trait;
use chrono::Duration;
use rusqlite::{params, OptionalExtension};
use url::Url;

use crate::auth::session;
use crate::config::Config;
use crate::db::{format_time, now, parse_time, write_transaction};
use crate::error::{AppError, AppResult};
use crate::forum::users;
use crate::state::DbPool;

/// A login message ready to be delivered.
#[derive(Debug, Clone)]
pub struct LoginMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub link: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: LoginMail) -> anyhow::Result<()>;
}

/// Writes login links to the log instead of delivering them.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: LoginMail) -> anyhow::Result<()> {
        tracing::info!(to = %mail.to, link = %mail.link, "Login link issued");
        Ok(())
    }
}

pub fn issue_login_token(
    conn: &rusqlite::Connection,
    user_id: &str,
    minutes: u64,
) -> AppResult<String> {
    let token = session::generate_token();
    let expires_at = now() + Duration::minutes(minutes as i64);
    conn.execute(
        "INSERT INTO login_tokens (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
        params![token, user_id, format_time(&expires_at)],
    )?;
    Ok(token)
}

/// Consumes a login token and returns its user id. Unknown, used and
/// expired tokens are all rejected the same way.
pub fn redeem_login_token(conn: &rusqlite::Connection, token: &str) -> AppResult<String> {
    let tx = write_transaction(conn)?;
    let row: Option<(String, String)> = tx
        .query_row(
            "SELECT user_id, expires_at FROM login_tokens WHERE token = ?1",
            params![token],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let (user_id, expires_at) = row.ok_or(AppError::Unauthorized)?;
    tx.execute("DELETE FROM login_tokens WHERE token = ?1", params![token])?;
    tx.commit()?;

    if parse_time(&expires_at)? <= now() {
        return Err(AppError::Unauthorized);
    }
    Ok(user_id)
}

pub fn login_link(public_url: &str, token: &str) -> AppResult<String> {
    let mut url = Url::parse(&format!("{}/auth/verify", public_url))
        .map_err(|e| AppError::Internal(format!("invalid public url '{}': {}", public_url, e)))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url.to_string())
}

/// Registers or finds the user behind `email` and mails them a login link.
pub async fn start_login(
    pool: &DbPool,
    config: &Config,
    mailer: &dyn Mailer,
    email: &str,
) -> AppResult<()> {
    let (user, token) = {
        let conn = pool.get()?;
        let user = users::upsert_by_email(&conn, email)?;
        let token = issue_login_token(&conn, &user.id, config.auth.login_token_minutes)?;
        (user, token)
    };

    let link = login_link(&config.public_url(), &token)?;
    let mail = LoginMail {
        to: user.email.clone(),
        subject: "Your sign-in link".to_string(),
        body: format!(
            "Open this link within {} minutes to sign in:\n\n{}\n",
            config.auth.login_token_minutes, link
        ),
        link,
    };
    mailer
        .send(mail)
        .await
        .map_err(|e| AppError::Internal(format!("failed to send login mail: {}", e)))?;

    tracing::info!("Login requested for user {}", user.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<LoginMail>>);

    #[async_trait]
    impl Mailer for Outbox {
        async fn send(&self, mail: LoginMail) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(mail);
            Ok(())
        }
    }

    #[test]
    fn login_token_is_single_use() {
        let (_tmp, pool) = test_support::pool();
        let conn = pool.get().unwrap();
        test_support::insert_user(&conn, "u1", None);

        let token = issue_login_token(&conn, "u1", 30).unwrap();
        assert_eq!(redeem_login_token(&conn, &token).unwrap(), "u1");
        assert!(matches!(
            redeem_login_token(&conn, &token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn expired_login_token_is_rejected() {
        let (_tmp, pool) = test_support::pool();
        let conn = pool.get().unwrap();
        test_support::insert_user(&conn, "u1", None);

        let token = issue_login_token(&conn, "u1", 0).unwrap();
        assert!(matches!(
            redeem_login_token(&conn, &token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn login_link_escapes_token() {
        let link = login_link("http://bbs.example.org", "a b").unwrap();
        assert_eq!(link, "http://bbs.example.org/auth/verify?token=a+b");
    }

    #[tokio::test]
    async fn start_login_mails_a_working_link() {
        let (_tmp, pool) = test_support::pool();
        let mut config = Config::default();
        config.server.public_url = Some("https://bbs.example.org/".into());
        let outbox = Outbox::default();

        start_login(&pool, &config, &outbox, " Alice@Example.org ").await.unwrap();

        let mail = outbox.0.lock().unwrap().pop().unwrap();
        assert_eq!(mail.to, "alice@example.org");
        let prefix = "https://bbs.example.org/auth/verify?token=";
        assert!(mail.link.starts_with(prefix), "{}", mail.link);
        assert!(mail.body.contains(&mail.link));

        let conn = pool.get().unwrap();
        let user_id = redeem_login_token(&conn, &mail.link[prefix.len()..]).unwrap();
        assert_eq!(users::get(&conn, &user_id).unwrap().email, "alice@example.org");
    }

    #[tokio::test]
    async fn start_login_rejects_bad_email() {
        let (_tmp, pool) = test_support::pool();
        let outbox = Outbox::default();
        let err = start_login(&pool, &Config::default(), &outbox, "not-an-email")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(outbox.0.lock().unwrap().is_empty());
    }
}
