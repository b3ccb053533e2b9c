use anyhow::Context;
use arbor_api::{
    ClientInfoId, Comment, CommentDraft, CommentId, NewClientInfo, SortBy, SortOrder, Store, Uuid,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Row};

pub struct PgStore<'a> {
    pub conn: &'a mut sqlx::PgConnection,
}

const COMMENT_COLUMNS: &str = "id, user_name, email, text, created_at, updated_at, active, \
     parent_id, home_page, image_url, text_file_url, client_info_id";

fn comment_from_row(row: &PgRow) -> anyhow::Result<Comment> {
    Ok(Comment {
        id: CommentId(row.try_get("id")?),
        user_name: row.try_get("user_name")?,
        email: row.try_get("email")?,
        text: row.try_get("text")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        active: row.try_get("active")?,
        parent_id: row.try_get::<Option<Uuid>, _>("parent_id")?.map(CommentId),
        home_page: row.try_get("home_page")?,
        image_url: row.try_get("image_url")?,
        text_file_url: row.try_get("text_file_url")?,
        client_info_id: ClientInfoId(row.try_get("client_info_id")?),
    })
}

// Sort keys map to a fixed set of ORDER BY clauses; the id tie-break
// keeps scan order deterministic for equal keys.
fn order_clause(sort_by: SortBy, order: SortOrder) -> &'static str {
    match (sort_by, order) {
        (SortBy::UserName, SortOrder::Asc) => "user_name ASC, id ASC",
        (SortBy::UserName, SortOrder::Desc) => "user_name DESC, id DESC",
        (SortBy::Email, SortOrder::Asc) => "email ASC, id ASC",
        (SortBy::Email, SortOrder::Desc) => "email DESC, id DESC",
        (SortBy::DateAdded, SortOrder::Asc) => "created_at ASC, id ASC",
        (SortBy::DateAdded, SortOrder::Desc) => "created_at DESC, id DESC",
    }
}

#[async_trait]
impl Store for PgStore<'_> {
    async fn fetch_comments(
        &mut self,
        sort_by: SortBy,
        order: SortOrder,
    ) -> anyhow::Result<Vec<Comment>> {
        let query = format!(
            "SELECT {} FROM comments ORDER BY {}",
            COMMENT_COLUMNS,
            order_clause(sort_by, order),
        );
        let rows = sqlx::query(&query)
            .fetch_all(&mut *self.conn)
            .await
            .context("querying comments table")?;
        rows.iter().map(comment_from_row).collect()
    }

    async fn comment_exists(&mut self, id: CommentId) -> anyhow::Result<bool> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM comments WHERE id = $1)")
            .bind(id.0)
            .fetch_one(&mut *self.conn)
            .await
            .with_context(|| format!("checking existence of comment {:?}", id))?;
        Ok(row.try_get(0)?)
    }

    async fn insert_client_info(&mut self, info: NewClientInfo) -> anyhow::Result<ClientInfoId> {
        let id = ClientInfoId(Uuid::new_v4());
        sqlx::query(
            "INSERT INTO client_infos (id, ip_address, user_agent, user_name)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id.0)
        .bind(info.ip_address.to_string())
        .bind(&info.user_agent)
        .bind(&info.user_name)
        .execute(&mut *self.conn)
        .await
        .context("inserting client info")?;
        Ok(id)
    }

    async fn insert_comment(&mut self, draft: CommentDraft) -> anyhow::Result<Comment> {
        let id = CommentId(Uuid::new_v4());
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO comments (id, user_name, email, text, created_at, updated_at,
                                   active, parent_id, home_page, image_url, text_file_url,
                                   client_info_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(id.0)
        .bind(&draft.user_name)
        .bind(&draft.email)
        .bind(&draft.text)
        .bind(now)
        .bind(now)
        .bind(true)
        .bind(draft.parent_id.map(|p| p.0))
        .bind(&draft.home_page)
        .bind(&draft.image_url)
        .bind(&draft.text_file_url)
        .bind(draft.client_info_id.0)
        .execute(&mut *self.conn)
        .await
        .context("inserting comment")?;
        Ok(Comment {
            id,
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
        })
    }
}
