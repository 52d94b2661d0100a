use crate::gffft::{clamp_page_size, require_approved_membership, require_gffft, DEFAULT_SLUG};
use crate::get_db_pool;
use crate::hydrate::{author_or_placeholder, resolve_authors, AuthorHandle};
use crate::middleware::ClientCtx;
use crate::orm::{boards, gfffts, posts, threads};
use crate::{counters, refs};
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use chrono::prelude::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, DatabaseConnection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Idempotent get-or-create of the gffft's default board: one read, then
/// a conditional create. Concurrent callers may race the create; the
/// slug read keeps repeated calls stable.
pub async fn get_or_create_default(
    db: &DatabaseConnection,
    gffft: &gfffts::Model,
) -> Result<boards::Model, Error> {
    if let Some(board) = boards::Entity::find()
        .filter(
            Condition::all()
                .add(boards::Column::GffftId.eq(gffft.id))
                .add(boards::Column::Slug.eq(DEFAULT_SLUG)),
        )
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
    {
        return Ok(board);
    }
    let now = Utc::now().naive_utc();
    let res = boards::Entity::insert(boards::ActiveModel {
        gffft_id: Set(gffft.id),
        slug: Set(DEFAULT_SLUG.to_owned()),
        thread_count: Set(0),
        post_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    Ok(boards::Model {
        id: res.last_insert_id,
        gffft_id: gffft.id,
        slug: DEFAULT_SLUG.to_owned(),
        thread_count: 0,
        post_count: 0,
        created_at: now,
        updated_at: now,
    })
}

pub async fn require_board(
    db: &DatabaseConnection,
    gffft: &gfffts::Model,
    bid: i64,
) -> Result<boards::Model, Error> {
    let board = boards::Entity::find_by_id(bid)
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Board not found."))?;
    if board.gffft_id != gffft.id {
        return Err(error::ErrorNotFound("Board not found."));
    }
    Ok(board)
}

/// Store-side counter bumps; creation-time counts are never decremented
/// on delete.
pub async fn bump_board_counts(db: &DatabaseConnection, board_id: i64, threads: bool, posts: bool) {
    let mut update = boards::Entity::update_many();
    if threads {
        update = update.col_expr(boards::Column::ThreadCount, Expr::cust("thread_count + 1"));
    }
    if posts {
        update = update.col_expr(boards::Column::PostCount, Expr::cust("post_count + 1"));
    }
    let res = update
        .filter(boards::Column::Id.eq(board_id))
        .exec(db)
        .await;
    if let Err(e) = res {
        log::error!("board counter bump failed for board {}: {}", board_id, e);
    }
}

#[derive(Deserialize)]
pub struct NewThreadForm {
    pub uid: String,
    pub gid: i64,
    pub bid: i64,
    pub subject: String,
    pub body: String,
}

#[post("/api/boards/createThread")]
pub async fn create_thread(
    client: ClientCtx,
    form: web::Json<NewThreadForm>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&form.uid)?;
    let gffft = require_gffft(db, &uid, form.gid).await?;
    require_approved_membership(db, gffft.id, &caller).await?;
    let board = require_board(db, &gffft, form.bid).await?;

    let subject = form.subject.trim().to_owned();
    let body = form.body.trim().to_owned();
    if subject.is_empty() || body.is_empty() {
        return Err(error::ErrorUnprocessableEntity(
            "A thread needs a subject and a first post.",
        ));
    }

    let now = Utc::now().naive_utc();
    let thread_res = threads::Entity::insert(threads::ActiveModel {
        board_id: Set(board.id),
        user_id: Set(caller.to_owned()),
        subject: Set(subject),
        first_post_ref: Set(None),
        latest_post_ref: Set(None),
        post_count: Set(1),
        created_at: Set(now),
        deleted_at: Set(None),
        deleted_by: Set(None),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    let tid = thread_res.last_insert_id;

    let post_res = posts::Entity::insert(posts::ActiveModel {
        thread_id: Set(tid),
        user_id: Set(caller.to_owned()),
        body: Set(body),
        created_at: Set(now),
        deleted_at: Set(None),
        deleted_by: Set(None),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;

    // Post references are persisted as path strings through the full
    // ownership chain.
    let pref = refs::post_ref(&gffft.user_id, gffft.id, board.id, tid, post_res.last_insert_id);
    threads::Entity::update_many()
        .col_expr(threads::Column::FirstPostRef, Expr::value(Some(pref.to_owned())))
        .col_expr(threads::Column::LatestPostRef, Expr::value(Some(pref)))
        .filter(threads::Column::Id.eq(tid))
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    bump_board_counts(db, board.id, true, true).await;
    actix_web::rt::spawn(counters::bump_unseen(
        db,
        gffft.id,
        counters::UnseenCounter::BoardThreads,
    ));
    actix_web::rt::spawn(counters::bump_unseen(
        db,
        gffft.id,
        counters::UnseenCounter::BoardPosts,
    ));

    Ok(HttpResponse::NoContent().finish())
}

#[derive(Deserialize)]
pub struct ThreadPageQuery {
    pub max: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadListItemJson {
    pub id: i64,
    pub subject: String,
    pub author: AuthorHandle,
    pub latest_author: Option<AuthorHandle>,
    pub post_count: i32,
    pub created_at: chrono::NaiveDateTime,
    #[serde(rename = "ref")]
    pub thread_ref: String,
}

#[get("/api/users/{uid}/gfffts/{gid}/boards/{bid}/threads")]
pub async fn view_threads(
    client: ClientCtx,
    path: web::Path<(String, i64, i64)>,
    query: web::Query<ThreadPageQuery>,
) -> Result<impl Responder, Error> {
    let (uid, gid, bid) = path.into_inner();
    let db = get_db_pool();
    let uid = client.resolve_uid(&uid)?;
    let gffft = require_gffft(db, &uid, gid).await?;
    let board = require_board(db, &gffft, bid).await?;

    // Soft-deleted threads are excluded from listings.
    let rows = threads::Entity::find()
        .filter(
            Condition::all()
                .add(threads::Column::BoardId.eq(board.id))
                .add(threads::Column::DeletedAt.is_null()),
        )
        .order_by_desc(threads::Column::Id)
        .offset(query.offset.unwrap_or(0))
        .limit(clamp_page_size(query.max))
        .all(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    // Batch-resolve thread authors plus the authors of each latest post.
    let latest_ids: Vec<i64> = rows
        .iter()
        .filter_map(|t| t.latest_post_ref.as_deref())
        .filter_map(refs::parse_post_ref)
        .map(|r| r.post_id)
        .collect();
    let latest_posts: HashMap<i64, String> = if latest_ids.is_empty() {
        HashMap::new()
    } else {
        posts::Entity::find()
            .filter(posts::Column::Id.is_in(latest_ids))
            .all(db)
            .await
            .map_err(error::ErrorInternalServerError)?
            .into_iter()
            .map(|p| (p.id, p.user_id))
            .collect()
    };
    let author_ids = rows
        .iter()
        .map(|t| t.user_id.to_owned())
        .chain(latest_posts.values().cloned());
    let authors = resolve_authors(db, author_ids)
        .await
        .map_err(error::ErrorInternalServerError)?;

    let out: Vec<ThreadListItemJson> = rows
        .iter()
        .map(|t| {
            let latest_author = t
                .latest_post_ref
                .as_deref()
                .and_then(refs::parse_post_ref)
                .and_then(|r| latest_posts.get(&r.post_id))
                .map(|author_id| author_or_placeholder(&authors, author_id));
            ThreadListItemJson {
                id: t.id,
                subject: t.subject.to_owned(),
                author: author_or_placeholder(&authors, &t.user_id),
                latest_author,
                post_count: t.post_count,
                created_at: t.created_at,
                thread_ref: refs::thread_ref(&gffft.user_id, gffft.id, board.id, t.id),
            }
        })
        .collect();

    // Viewing the listing clears the caller's own unseen counter only.
    if let Some(caller) = client.identity()? {
        if let Err(e) = counters::reset_unseen(
            db,
            gffft.id,
            &caller,
            counters::UnseenCounter::BoardThreads,
        )
        .await
        {
            log::error!("unseen reset failed for {}: {}", caller, e);
        }
    }

    Ok(HttpResponse::Ok().json(out))
}
