use crate::board::require_board;
use crate::gffft::{get_membership, require_gffft};
use crate::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::posts;
use crate::role::can_mutate_item;
use crate::thread::require_thread;
use actix_web::{delete, error, patch, web, Error, HttpResponse, Responder};
use chrono::prelude::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection};
use serde::Deserialize;

async fn require_post(
    db: &DatabaseConnection,
    thread_id: i64,
    pid: i64,
) -> Result<posts::Model, Error> {
    let post = posts::Entity::find_by_id(pid)
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Post not found."))?;
    if post.thread_id != thread_id {
        return Err(error::ErrorNotFound("Post not found."));
    }
    Ok(post)
}

/// Resolves the chain down to a post and checks the mutation gate:
/// original author or community owner, nobody else.
async fn require_mutable_post(
    client: &ClientCtx,
    path: (String, i64, i64, i64, i64),
) -> Result<posts::Model, Error> {
    let (uid, gid, bid, tid, pid) = path;
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&uid)?;
    let gffft = require_gffft(db, &uid, gid).await?;
    let board = require_board(db, &gffft, bid).await?;
    let thread = require_thread(db, board.id, tid).await?;
    let post = require_post(db, thread.id, pid).await?;

    let caller_role = get_membership(db, gffft.id, &caller)
        .await
        .map_err(error::ErrorInternalServerError)?
        .map(|m| m.role)
        .unwrap_or_default();
    if !can_mutate_item(&caller_role, &caller, &post.user_id) {
        return Err(error::ErrorForbidden(
            "Only the author or the owner may change this post.",
        ));
    }
    Ok(post)
}

#[derive(Deserialize)]
pub struct PostPatchForm {
    pub body: String,
}

#[patch("/api/users/{uid}/gfffts/{gid}/boards/{bid}/threads/{tid}/posts/{pid}")]
pub async fn update_post(
    client: ClientCtx,
    path: web::Path<(String, i64, i64, i64, i64)>,
    form: web::Json<PostPatchForm>,
) -> Result<impl Responder, Error> {
    let post = require_mutable_post(&client, path.into_inner()).await?;
    let body = form.body.trim().to_owned();
    if body.is_empty() {
        return Err(error::ErrorUnprocessableEntity("A post needs a body."));
    }
    posts::Entity::update(posts::ActiveModel {
        id: Set(post.id),
        body: Set(body),
        ..Default::default()
    })
    .exec(get_db_pool())
    .await
    .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::NoContent().finish())
}

#[delete("/api/users/{uid}/gfffts/{gid}/boards/{bid}/threads/{tid}/posts/{pid}")]
pub async fn delete_post(
    client: ClientCtx,
    path: web::Path<(String, i64, i64, i64, i64)>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let post = require_mutable_post(&client, path.into_inner()).await?;
    // Soft delete; the thread and board post counts stay put.
    posts::Entity::update(posts::ActiveModel {
        id: Set(post.id),
        deleted_at: Set(Some(Utc::now().naive_utc())),
        deleted_by: Set(Some(caller)),
        ..Default::default()
    })
    .exec(get_db_pool())
    .await
    .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::NoContent().finish())
}
