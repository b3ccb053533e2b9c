use async_trait::async_trait;

use crate::{ClientInfoId, Comment, CommentId, NewClientInfo, SortBy, SortOrder};

/// A fully validated, sanitized comment ready to persist. Ids and
/// timestamps are assigned by the store at insert time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentDraft {
    pub user_name: String,
    pub email: String,
    pub text: String,
    pub parent_id: Option<CommentId>,
    pub home_page: Option<String>,
    pub image_url: Option<String>,
    pub text_file_url: Option<String>,
    pub client_info_id: ClientInfoId,
}

/// Durable comment storage. Inserts are atomic and assign ids on the
/// store side, so concurrent writers need no coordination.
#[async_trait]
pub trait Store {
    /// Fetch every comment record, ordered by the given sort key and
    /// direction. Ties must resolve deterministically.
    async fn fetch_comments(
        &mut self,
        sort_by: SortBy,
        order: SortOrder,
    ) -> anyhow::Result<Vec<Comment>>;

    async fn comment_exists(&mut self, id: CommentId) -> anyhow::Result<bool>;

    async fn insert_client_info(&mut self, info: NewClientInfo) -> anyhow::Result<ClientInfoId>;

    async fn insert_comment(&mut self, draft: CommentDraft) -> anyhow::Result<Comment>;
}
