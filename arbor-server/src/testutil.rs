//! In-memory stand-ins for the store and the upload collaborator, so
//! the submission and feed tests run without a database or network.

use anyhow::bail;
use arbor_api::{
    ClientInfoId, Comment, CommentDraft, CommentId, CommentNode, NewClientInfo, SortBy, SortOrder,
    Store, Uuid,
};
use async_trait::async_trait;
use chrono::Utc;

use crate::upload::{UploadKind, Uploader};

pub fn node(name: &str) -> CommentNode {
    let at = Utc::now();
    CommentNode {
        id: CommentId(Uuid::new_v4()),
        user_name: String::from(name),
        email: format!("{name}@example.com"),
        text: format!("comment by {name}"),
        created_at: at,
        updated_at: at,
        active: true,
        parent_id: None,
        home_page: None,
        image_url: None,
        text_file_url: None,
        children: Vec::new(),
    }
}

#[derive(Debug, Default)]
pub struct MemStore {
    pub comments: Vec<Comment>,
    pub client_infos: Vec<(ClientInfoId, NewClientInfo)>,
}

impl MemStore {
    pub fn new() -> MemStore {
        MemStore::default()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn fetch_comments(
        &mut self,
        sort_by: SortBy,
        order: SortOrder,
    ) -> anyhow::Result<Vec<Comment>> {
        let mut out = self.comments.clone();
        out.sort_by(|a, b| {
            let ord = match sort_by {
                SortBy::UserName => a.user_name.cmp(&b.user_name),
                SortBy::Email => a.email.cmp(&b.email),
                SortBy::DateAdded => a.created_at.cmp(&b.created_at),
            }
            .then(a.id.cmp(&b.id));
            match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        Ok(out)
    }

    async fn comment_exists(&mut self, id: CommentId) -> anyhow::Result<bool> {
        Ok(self.comments.iter().any(|c| c.id == id))
    }

    async fn insert_client_info(&mut self, info: NewClientInfo) -> anyhow::Result<ClientInfoId> {
        let id = ClientInfoId(Uuid::new_v4());
        self.client_infos.push((id, info));
        Ok(id)
    }

    async fn insert_comment(&mut self, draft: CommentDraft) -> anyhow::Result<Comment> {
        let now = Utc::now();
        let comment = Comment {
            id: CommentId(Uuid::new_v4()),
            user_name: draft.user_name,
            email: draft.email,
            text: draft.text,
            created_at: now,
            updated_at: now,
            active: true,
            parent_id: draft.parent_id,
            home_page: draft.home_page,
            image_url: draft.image_url,
            text_file_url: draft.text_file_url,
            client_info_id: draft.client_info_id,
        };
        self.comments.push(comment.clone());
        Ok(comment)
    }
}

#[derive(Debug, Default)]
pub struct MemUploader {
    pub fail: bool,
}

#[async_trait]
impl Uploader for MemUploader {
    async fn upload(
        &self,
        _data: Vec<u8>,
        file_name: &str,
        kind: UploadKind,
    ) -> anyhow::Result<String> {
        if self.fail {
            bail!("upload transport down");
        }
        Ok(format!("https://cdn.test/{}/{}", kind.as_path(), file_name))
    }
}
