use std::net::IpAddr;

use chrono::Utc;

pub use uuid::Uuid;

mod db;
mod error;
mod tree;

pub use db::{CommentDraft, Store};
pub use error::Error;
pub use tree::{assemble, CommentPage};

pub type Time = chrono::DateTime<Utc>;

/// Fixed page size for root-level pagination; replies are never paginated.
pub const ROOT_PAGE_SIZE: usize = 25;

pub const MAX_USER_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_TEXT_LEN: usize = 10_000;
pub const MAX_HOME_PAGE_LEN: usize = 200;
pub const MAX_USER_AGENT_LEN: usize = 255;

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ClientInfoId(pub Uuid);

/// One flat comment record, as stored. `client_info_id` is audit-only
/// and never reaches the nested client view.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub user_name: String,
    pub email: String,
    pub text: String,
    pub created_at: Time,
    pub updated_at: Time,
    pub active: bool,
    pub parent_id: Option<CommentId>,
    pub home_page: Option<String>,
    pub image_url: Option<String>,
    pub text_file_url: Option<String>,
    pub client_info_id: ClientInfoId,
}

/// The same comment, as served: one node of the assembled forest.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentNode {
    pub id: CommentId,
    pub user_name: String,
    pub email: String,
    pub text: String,
    pub created_at: Time,
    pub updated_at: Time,
    pub active: bool,
    pub parent_id: Option<CommentId>,
    pub home_page: Option<String>,
    pub image_url: Option<String>,
    pub text_file_url: Option<String>,
    pub children: Vec<CommentNode>,
}

impl From<&Comment> for CommentNode {
    fn from(c: &Comment) -> CommentNode {
        CommentNode {
            id: c.id,
            user_name: c.user_name.clone(),
            email: c.email.clone(),
            text: c.text.clone(),
            created_at: c.created_at,
            updated_at: c.updated_at,
            active: c.active,
            parent_id: c.parent_id,
            home_page: c.home_page.clone(),
            image_url: c.image_url.clone(),
            text_file_url: c.text_file_url.clone(),
            children: Vec::new(),
        }
    }
}

/// Provenance captured alongside each comment at creation time.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewClientInfo {
    pub ip_address: IpAddr,
    pub user_agent: String,
    pub user_name: String,
}

/// What a client submits on `POST /comments`, attachments excluded.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub user_name: String,
    pub email: String,
    pub text: String,
    pub home_page: Option<String>,
    pub parent_comment: Option<CommentId>,
    pub captcha_key: Uuid,
    pub captcha_value: String,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), Error> {
        validate_string(&self.user_name)?;
        validate_string(&self.email)?;
        validate_string(&self.text)?;
        if self.user_name.trim().is_empty() {
            return Err(Error::InvalidInput(String::from("user_name is required")));
        }
        if self.user_name.len() > MAX_USER_NAME_LEN {
            return Err(Error::InvalidInput(String::from("user_name is too long")));
        }
        if self.email.len() > MAX_EMAIL_LEN {
            return Err(Error::InvalidInput(String::from("email is too long")));
        }
        validate_email(&self.email)?;
        if self.text.trim().is_empty() {
            return Err(Error::InvalidInput(String::from("text is required")));
        }
        if self.text.len() > MAX_TEXT_LEN {
            return Err(Error::InvalidInput(String::from("text is too long")));
        }
        if let Some(home_page) = &self.home_page {
            validate_string(home_page)?;
            if home_page.len() > MAX_HOME_PAGE_LEN {
                return Err(Error::InvalidInput(String::from("home_page is too long")));
            }
            let url = url::Url::parse(home_page)
                .map_err(|_| Error::InvalidInput(String::from("home_page is not a valid URL")))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(Error::InvalidInput(String::from(
                    "home_page must be an http(s) URL",
                )));
            }
        }
        Ok(())
    }
}

fn validate_string(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::InvalidInput(String::from(
            "null bytes are not allowed",
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), Error> {
    let bad = || Error::InvalidInput(String::from("email is not a valid address"));
    let (local, domain) = email.split_once('@').ok_or_else(bad)?;
    if local.is_empty() || domain.is_empty() {
        return Err(bad());
    }
    if domain.contains('@') || !domain.contains('.') {
        return Err(bad());
    }
    if email.chars().any(|c| c.is_whitespace()) {
        return Err(bad());
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    UserName,
    Email,
    DateAdded,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortBy {
    pub fn parse(s: &str) -> Option<SortBy> {
        match s {
            "user_name" => Some(SortBy::UserName),
            "email" => Some(SortBy::Email),
            "date_added" => Some(SortBy::DateAdded),
            _ => None,
        }
    }
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<SortOrder> {
        match s {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// Resolve the raw query parameters into a (key, order) pair. An
/// unrecognized or missing sort key falls back to newest-first.
pub fn sort_params(sort_by: Option<&str>, order: Option<&str>) -> (SortBy, SortOrder) {
    match sort_by.and_then(SortBy::parse) {
        Some(key) => (
            key,
            order.and_then(SortOrder::parse).unwrap_or(SortOrder::Asc),
        ),
        None => (SortBy::DateAdded, SortOrder::Desc),
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub enum FeedMessage {
    Pong,
    NewComment(CommentNode),
}
