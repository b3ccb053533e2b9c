use anyhow::Context;
use arbor_api::{assemble, CommentId, CommentPage, NewComment, Store, Uuid, ROOT_PAGE_SIZE};
use axum::{
    extract::{Multipart, Query, State, WebSocketUpgrade},
    Json,
};
use futures::StreamExt;
use serde_json::json;

use crate::{
    captcha::ChallengeStore,
    db::PgStore,
    extractors::{ClientMeta, PgConn},
    feeds::CommentFeeds,
    submit::{self, Attachments},
    upload::HttpUploader,
    Error,
};

pub async fn get_captcha(State(challenges): State<ChallengeStore>) -> Json<serde_json::Value> {
    let issued = challenges.issue();
    Json(json!({
        "key": issued.key,
        "image_url": issued.image_url,
    }))
}

#[derive(Debug, serde::Deserialize)]
pub struct ReadParams {
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub page: Option<usize>,
}

pub async fn get_comments(
    Query(params): Query<ReadParams>,
    mut conn: PgConn,
) -> Result<Json<CommentPage>, Error> {
    let (sort_by, order) =
        arbor_api::sort_params(params.sort_by.as_deref(), params.order.as_deref());
    let mut store = PgStore { conn: &mut *conn };
    let records = store
        .fetch_comments(sort_by, order)
        .await
        .context("fetching comment records")?;
    Ok(Json(assemble(
        &records,
        params.page.unwrap_or(1),
        ROOT_PAGE_SIZE,
    )))
}

pub async fn post_comment(
    State(feeds): State<CommentFeeds>,
    State(challenges): State<ChallengeStore>,
    State(uploader): State<HttpUploader>,
    client: ClientMeta,
    mut conn: PgConn,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, Error> {
    let (data, attachments) = parse_submission(multipart).await?;
    let mut store = PgStore { conn: &mut *conn };
    let comment = submit::submit_comment(
        &mut store,
        &uploader,
        &challenges,
        &client,
        data,
        attachments,
    )
    .await?;
    // the comment is durable from here on: fan-out failures only get logged
    feeds.publish(comment.clone()).await;
    Ok(Json(json!({
        "success": true,
        "comment_id": comment.id,
        "image_url": comment.image_url,
        "text_file_url": comment.text_file_url,
    })))
}

async fn parse_submission(mut multipart: Multipart) -> Result<(NewComment, Attachments), Error> {
    let mut user_name = None;
    let mut email = None;
    let mut text = None;
    let mut home_page = None;
    let mut parent_comment = None;
    let mut captcha_key = None;
    let mut captcha_value = None;
    let mut attachments = Attachments::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| Error::invalid_input("malformed multipart body"))?
    {
        let name = field.name().unwrap_or("").to_owned();
        match &*name {
            "user_name" => user_name = Some(text_field(&name, field).await?),
            "email" => email = Some(text_field(&name, field).await?),
            "text" => text = Some(text_field(&name, field).await?),
            "home_page" => {
                let value = text_field(&name, field).await?;
                if !value.is_empty() {
                    home_page = Some(value);
                }
            }
            "parent_comment" => {
                let value = text_field(&name, field).await?;
                if !value.is_empty() {
                    let id = Uuid::parse_str(&value).map_err(|_| {
                        Error::invalid_input("parent_comment is not a valid comment id")
                    })?;
                    parent_comment = Some(CommentId(id));
                }
            }
            "captcha_key" => captcha_key = Uuid::parse_str(&text_field(&name, field).await?).ok(),
            "captcha_value" => captcha_value = Some(text_field(&name, field).await?),
            "image" => attachments.image = Some(binary_field(&name, field).await?),
            "text_file" => attachments.text_file = Some(binary_field(&name, field).await?),
            _ => (),
        }
    }

    let data = NewComment {
        user_name: user_name.ok_or_else(|| Error::invalid_input("user_name is required"))?,
        email: email.ok_or_else(|| Error::invalid_input("email is required"))?,
        text: text.ok_or_else(|| Error::invalid_input("text is required"))?,
        home_page,
        parent_comment,
        // an absent or malformed key can never match an issued challenge,
        // so the pipeline reports it as a captcha failure
        captcha_key: captcha_key.unwrap_or_else(Uuid::nil),
        captcha_value: captcha_value.unwrap_or_default(),
    };
    Ok((data, attachments))
}

async fn text_field(
    name: &str,
    field: axum::extract::multipart::Field<'_>,
) -> Result<String, Error> {
    field
        .text()
        .await
        .map_err(|_| Error::invalid_input(format!("field {name} is not valid text")))
}

async fn binary_field(
    name: &str,
    field: axum::extract::multipart::Field<'_>,
) -> Result<(String, Vec<u8>), Error> {
    let file_name = field.file_name().unwrap_or(name).to_owned();
    let bytes = field
        .bytes()
        .await
        .map_err(|_| Error::invalid_input(format!("could not read attachment {name}")))?;
    Ok((file_name, bytes.to_vec()))
}

pub async fn comment_feed(
    ws: WebSocketUpgrade,
    State(feeds): State<CommentFeeds>,
) -> axum::response::Response {
    ws.on_upgrade(move |sock| async move {
        tracing::debug!("comment feed websocket connected");
        let (write, read) = sock.split();
        feeds.add_socket(write, read).await;
    })
}
