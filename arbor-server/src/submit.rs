use anyhow::Context;
use arbor_api::{
    CommentDraft, CommentNode, NewClientInfo, NewComment, Store, MAX_USER_AGENT_LEN,
};

use crate::{
    captcha::ChallengeStore,
    error::Error,
    extractors::ClientMeta,
    sanitize,
    upload::{self, UploadKind, Uploader},
};

/// Attachment blobs pulled out of the multipart body, with the
/// client-supplied file names.
#[derive(Debug, Default)]
pub struct Attachments {
    pub image: Option<(String, Vec<u8>)>,
    pub text_file: Option<(String, Vec<u8>)>,
}

/// Run one submission through the validation pipeline, terminal on the
/// first failure. Nothing about the comment is persisted until every
/// step before the final insert has passed, so a failed submission
/// never leaves a partial comment behind. Fan-out is the caller's move
/// once this returns.
pub async fn submit_comment<S, U>(
    store: &mut S,
    uploader: &U,
    challenges: &ChallengeStore,
    client: &ClientMeta,
    data: NewComment,
    attachments: Attachments,
) -> Result<CommentNode, Error>
where
    S: Store + Send,
    U: Uploader + Sync,
{
    // the challenge is consumed whatever the outcome
    if !challenges.consume(data.captcha_key, &data.captcha_value) {
        return Err(Error::invalid_captcha());
    }

    data.validate()?;

    if let Some(parent) = data.parent_comment {
        if !store
            .comment_exists(parent)
            .await
            .context("resolving parent comment")?
        {
            return Err(Error::not_found(parent));
        }
    }

    let ip_address = client
        .ip
        .ok_or_else(|| Error::client_info("client address could not be determined"))?;
    let client_info_id = store
        .insert_client_info(NewClientInfo {
            ip_address,
            user_agent: truncate_to_boundary(&client.user_agent, MAX_USER_AGENT_LEN),
            user_name: data.user_name.clone(),
        })
        .await
        .context("recording client info")?;

    // sanitization degrades, never rejects
    let text = sanitize::clean(&data.text);

    let mut image_url = None;
    if let Some((file_name, bytes)) = attachments.image {
        upload::validate_image(&bytes)?;
        let url = uploader
            .upload(bytes, &file_name, UploadKind::Image)
            .await
            .map_err(|err| {
                tracing::warn!(?err, %file_name, "image upload failed");
                Error::attachment("image upload failed")
            })?;
        image_url = Some(url);
    }
    let mut text_file_url = None;
    if let Some((file_name, bytes)) = attachments.text_file {
        upload::validate_text_file(&file_name, &bytes)?;
        let url = uploader
            .upload(bytes, &file_name, UploadKind::Raw)
            .await
            .map_err(|err| {
                tracing::warn!(?err, %file_name, "text file upload failed");
                Error::attachment("text file upload failed")
            })?;
        text_file_url = Some(url);
    }

    let comment = store
        .insert_comment(CommentDraft {
            user_name: data.user_name,
            email: data.email,
            text,
            parent_id: data.parent_comment,
            home_page: data.home_page,
            image_url,
            text_file_url,
            client_info_id,
        })
        .await
        .context("inserting comment")?;

    Ok(CommentNode::from(&comment))
}

fn truncate_to_boundary(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_owned();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_owned()
}
