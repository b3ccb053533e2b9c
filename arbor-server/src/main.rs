use std::net::SocketAddr;

use anyhow::Context;
use axum::{routing::get, Router};
use structopt::StructOpt;
use tower_http::trace::TraceLayer;

mod captcha;
mod db;
mod error;
mod extractors;
mod feeds;
mod handlers;
mod sanitize;
mod submit;
mod upload;

#[cfg(test)]
mod testutil;

pub use error::Error;
use extractors::AppState;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(Debug, StructOpt)]
#[structopt(name = "arbor-server", about = "threaded-comment backend")]
struct Opt {
    /// Address to listen on
    #[structopt(long, default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Base URL of the attachment upload collaborator
    #[structopt(long, env = "UPLOAD_BASE_URL")]
    upload_base_url: String,

    /// Unsigned upload preset forwarded to the upload collaborator
    #[structopt(long, env = "UPLOAD_PRESET")]
    upload_preset: String,

    /// Base URL under which the captcha collaborator renders challenge images
    #[structopt(long, env = "CAPTCHA_IMAGE_BASE")]
    captcha_image_base: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = Opt::from_args();

    let db_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let db = sqlx::postgres::PgPoolOptions::new()
        .connect(&db_url)
        .await
        .with_context(|| format!("opening database {:?}", db_url))?;
    MIGRATOR
        .run(&db)
        .await
        .context("applying database migrations")?;

    let state = AppState {
        db: extractors::PgPool::new(db),
        feeds: feeds::CommentFeeds::new(),
        challenges: captcha::ChallengeStore::new(opt.captcha_image_base),
        uploader: upload::HttpUploader::new(opt.upload_base_url, opt.upload_preset)?,
    };

    let app = Router::new()
        .route(
            "/comments",
            get(handlers::get_comments).post(handlers::post_comment),
        )
        .route("/captcha", get(handlers::get_captcha))
        .route("/ws/comments", get(handlers::comment_feed))
        // large enough for an attached image plus the 100 KB text cap
        .layer(axum::extract::DefaultBodyLimit::max(8 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("listening on {}", opt.bind);
    axum::Server::bind(&opt.bind)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("serving axum webserver")
}
