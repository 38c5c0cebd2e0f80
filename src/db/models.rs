use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    /// Subscribed tags, in subscription order.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub id: String,
    pub seq: i64,
    pub user_id: String,
    pub anonymous: bool,
    pub author: String,
    pub title: String,
    pub content: String,
    pub main_tag: String,
    pub sub_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub seq: i64,
    pub thread_id: String,
    pub user_id: String,
    pub anonymous: bool,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemNotification {
    pub id: String,
    pub seq: i64,
    pub title: String,
    pub content: String,
    pub event_time: DateTime<Utc>,
    pub has_read: bool,
}

/// A replied or quoted notification. `post_id` is empty for replied ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: String,
    pub seq: i64,
    pub user_id: String,
    pub kind: NotiKind,
    pub thread_id: String,
    pub post_id: String,
    /// Display authors of the repliers or quoters, oldest first.
    pub actors: Vec<String>,
    pub has_read: bool,
    pub event_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotiKind {
    System,
    Replied,
    Quoted,
}

impl NotiKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotiKind::System => "system",
            NotiKind::Replied => "replied",
            NotiKind::Quoted => "quoted",
        }
    }
}

impl fmt::Display for NotiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotiKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(NotiKind::System),
            "replied" => Ok(NotiKind::Replied),
            "quoted" => Ok(NotiKind::Quoted),
            other => Err(format!(
                "unknown notification type '{}', expected system, replied or quoted",
                other
            )),
        }
    }
}
