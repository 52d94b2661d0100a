use crate::board::{bump_board_counts, require_board};
use crate::gffft::{get_membership, require_approved_membership, require_gffft};
use crate::get_db_pool;
use crate::hydrate::{author_or_placeholder, resolve_authors, AuthorHandle, DELETED_PLACEHOLDER};
use crate::middleware::ClientCtx;
use crate::orm::{posts, threads};
use crate::role::can_mutate_item;
use crate::{counters, refs};
use actix_web::{delete, error, get, post, web, Error, HttpResponse, Responder};
use chrono::prelude::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, DatabaseConnection};
use serde::{Deserialize, Serialize};

pub async fn require_thread(
    db: &DatabaseConnection,
    board_id: i64,
    tid: i64,
) -> Result<threads::Model, Error> {
    let thread = threads::Entity::find_by_id(tid)
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Thread not found."))?;
    if thread.board_id != board_id {
        return Err(error::ErrorNotFound("Thread not found."));
    }
    Ok(thread)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostJson {
    pub id: i64,
    pub author: AuthorHandle,
    pub body: String,
    pub created_at: chrono::NaiveDateTime,
    pub deleted: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadJson {
    pub id: i64,
    pub subject: String,
    pub author: AuthorHandle,
    pub post_count: i32,
    pub created_at: chrono::NaiveDateTime,
    pub deleted: bool,
    pub posts: Vec<PostJson>,
}

/// Whether this viewer sees the original content of a deleted item.
fn can_view_deleted(caller: Option<&str>, caller_role: Option<&str>, author_id: &str) -> bool {
    match caller {
        Some(id) => can_mutate_item(caller_role.unwrap_or(""), id, author_id),
        None => false,
    }
}

/// Renders a thread and its posts for one viewer. A soft-deleted thread
/// masks its subject, author, and every post body unless the viewer is
/// the thread's author or the community owner; individually deleted
/// posts are masked on the same rule.
fn render_thread(
    thread: &threads::Model,
    rows: &[posts::Model],
    authors: &std::collections::HashMap<String, AuthorHandle>,
    caller: Option<&str>,
    caller_role: Option<&str>,
) -> ThreadJson {
    let thread_deleted = thread.deleted_at.is_some();
    let mask_thread =
        thread_deleted && !can_view_deleted(caller, caller_role, &thread.user_id);

    let posts_json: Vec<PostJson> = rows
        .iter()
        .map(|p| {
            let deleted = p.deleted_at.is_some();
            let mask_post =
                deleted && !can_view_deleted(caller, caller_role, &p.user_id);
            if mask_thread || mask_post {
                PostJson {
                    id: p.id,
                    author: AuthorHandle::placeholder(&p.user_id),
                    body: DELETED_PLACEHOLDER.to_owned(),
                    created_at: p.created_at,
                    deleted: thread_deleted || deleted,
                }
            } else {
                PostJson {
                    id: p.id,
                    author: author_or_placeholder(authors, &p.user_id),
                    body: p.body.to_owned(),
                    created_at: p.created_at,
                    deleted,
                }
            }
        })
        .collect();

    if mask_thread {
        ThreadJson {
            id: thread.id,
            subject: DELETED_PLACEHOLDER.to_owned(),
            author: AuthorHandle::placeholder(&thread.user_id),
            post_count: thread.post_count,
            created_at: thread.created_at,
            deleted: true,
            posts: posts_json,
        }
    } else {
        ThreadJson {
            id: thread.id,
            subject: thread.subject.to_owned(),
            author: author_or_placeholder(authors, &thread.user_id),
            post_count: thread.post_count,
            created_at: thread.created_at,
            deleted: thread_deleted,
            posts: posts_json,
        }
    }
}

/// Threads stay fetchable by id after a soft delete; only listings hide
/// them.
#[get("/api/users/{uid}/gfffts/{gid}/boards/{bid}/threads/{tid}")]
pub async fn view_thread(
    client: ClientCtx,
    path: web::Path<(String, i64, i64, i64)>,
) -> Result<impl Responder, Error> {
    let (uid, gid, bid, tid) = path.into_inner();
    let db = get_db_pool();
    let uid = client.resolve_uid(&uid)?;
    let gffft = require_gffft(db, &uid, gid).await?;
    let board = require_board(db, &gffft, bid).await?;
    let thread = require_thread(db, board.id, tid).await?;

    let caller = client.identity()?;
    let caller_role = match &caller {
        Some(id) => get_membership(db, gffft.id, id)
            .await
            .map_err(error::ErrorInternalServerError)?
            .map(|m| m.role),
        None => None,
    };

    let rows = posts::Entity::find()
        .filter(posts::Column::ThreadId.eq(thread.id))
        .order_by_asc(posts::Column::Id)
        .all(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    let authors = resolve_authors(db, rows.iter().map(|p| p.user_id.to_owned()))
        .await
        .map_err(error::ErrorInternalServerError)?;

    if let Some(caller) = &caller {
        if let Err(e) =
            counters::reset_unseen(db, gffft.id, caller, counters::UnseenCounter::BoardPosts).await
        {
            log::error!("unseen reset failed for {}: {}", caller, e);
        }
    }

    Ok(HttpResponse::Ok().json(render_thread(
        &thread,
        &rows,
        &authors,
        caller.as_deref(),
        caller_role.as_deref(),
    )))
}

#[derive(Deserialize)]
pub struct NewPostForm {
    pub uid: String,
    pub gid: i64,
    pub bid: i64,
    pub tid: i64,
    pub body: String,
}

#[post("/api/boards/createPost")]
pub async fn create_post(
    client: ClientCtx,
    form: web::Json<NewPostForm>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&form.uid)?;
    let gffft = require_gffft(db, &uid, form.gid).await?;
    require_approved_membership(db, gffft.id, &caller).await?;
    let board = require_board(db, &gffft, form.bid).await?;
    // Replying only requires the thread to exist; its own deleted flag is
    // not consulted.
    let thread = require_thread(db, board.id, form.tid).await?;

    let body = form.body.trim().to_owned();
    if body.is_empty() {
        return Err(error::ErrorUnprocessableEntity("A post needs a body."));
    }

    let now = Utc::now().naive_utc();
    let post_res = posts::Entity::insert(posts::ActiveModel {
        thread_id: Set(thread.id),
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

    let pref = refs::post_ref(
        &gffft.user_id,
        gffft.id,
        board.id,
        thread.id,
        post_res.last_insert_id,
    );
    threads::Entity::update_many()
        .col_expr(threads::Column::PostCount, Expr::cust("post_count + 1"))
        .col_expr(threads::Column::LatestPostRef, Expr::value(Some(pref)))
        .filter(threads::Column::Id.eq(thread.id))
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    bump_board_counts(db, board.id, false, true).await;
    actix_web::rt::spawn(counters::bump_unseen(
        db,
        gffft.id,
        counters::UnseenCounter::BoardPosts,
    ));

    Ok(HttpResponse::NoContent().finish())
}

#[delete("/api/users/{uid}/gfffts/{gid}/boards/{bid}/threads/{tid}")]
pub async fn delete_thread(
    client: ClientCtx,
    path: web::Path<(String, i64, i64, i64)>,
) -> Result<impl Responder, Error> {
    let (uid, gid, bid, tid) = path.into_inner();
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&uid)?;
    let gffft = require_gffft(db, &uid, gid).await?;
    let board = require_board(db, &gffft, bid).await?;
    let thread = require_thread(db, board.id, tid).await?;

    let caller_role = get_membership(db, gffft.id, &caller)
        .await
        .map_err(error::ErrorInternalServerError)?
        .map(|m| m.role)
        .unwrap_or_default();
    if !can_mutate_item(&caller_role, &caller, &thread.user_id) {
        return Err(error::ErrorForbidden(
            "Only the author or the owner may delete this thread.",
        ));
    }

    // Soft delete. Creation-time counters are left as they are.
    threads::Entity::update(threads::ActiveModel {
        id: Set(thread.id),
        deleted_at: Set(Some(Utc::now().naive_utc())),
        deleted_by: Set(Some(caller)),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::{ROLE_MEMBER, ROLE_OWNER};
    use std::collections::HashMap;

    fn thread_row(author: &str, deleted: bool) -> threads::Model {
        let now = Utc::now().naive_utc();
        threads::Model {
            id: 1,
            board_id: 1,
            user_id: author.to_owned(),
            subject: "garden planning".to_owned(),
            first_post_ref: None,
            latest_post_ref: None,
            post_count: 2,
            created_at: now,
            deleted_at: deleted.then(|| now),
            deleted_by: deleted.then(|| "alice".to_owned()),
        }
    }

    fn post_row(id: i64, author: &str, body: &str, deleted: bool) -> posts::Model {
        let now = Utc::now().naive_utc();
        posts::Model {
            id,
            thread_id: 1,
            user_id: author.to_owned(),
            body: body.to_owned(),
            created_at: now,
            deleted_at: deleted.then(|| now),
            deleted_by: deleted.then(|| author.to_owned()),
        }
    }

    fn handles(names: &[(&str, &str)]) -> HashMap<String, AuthorHandle> {
        names
            .iter()
            .map(|(id, username)| {
                (
                    id.to_string(),
                    AuthorHandle {
                        id: id.to_string(),
                        username: username.to_string(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_deleted_thread_is_masked_for_unprivileged_viewers() {
        let thread = thread_row("alice", true);
        let rows = vec![post_row(10, "alice", "first", false)];
        let authors = handles(&[("alice", "plum")]);

        for (caller, role) in [
            (None, None),
            (Some("carol"), Some(ROLE_MEMBER)),
            (Some("carol"), None),
        ] {
            let json = render_thread(&thread, &rows, &authors, caller, role);
            assert!(json.deleted);
            assert_eq!(json.subject, DELETED_PLACEHOLDER);
            assert_eq!(json.author.username, DELETED_PLACEHOLDER);
            assert_eq!(json.posts[0].body, DELETED_PLACEHOLDER);
            assert_eq!(json.posts[0].author.username, DELETED_PLACEHOLDER);
        }
    }

    #[test]
    fn test_deleted_thread_stays_readable_for_author_and_owner() {
        let thread = thread_row("alice", true);
        let rows = vec![post_row(10, "alice", "first", false)];
        let authors = handles(&[("alice", "plum")]);

        for (caller, role) in [
            (Some("alice"), Some(ROLE_MEMBER)),
            (Some("bob"), Some(ROLE_OWNER)),
        ] {
            let json = render_thread(&thread, &rows, &authors, caller, role);
            assert!(json.deleted);
            assert_eq!(json.subject, "garden planning");
            assert_eq!(json.author.username, "plum");
            assert_eq!(json.posts[0].body, "first");
        }
    }

    #[test]
    fn test_live_thread_masks_only_deleted_posts() {
        let thread = thread_row("alice", false);
        let rows = vec![
            post_row(10, "alice", "first", false),
            post_row(11, "carol", "second", true),
        ];
        let authors = handles(&[("alice", "plum"), ("carol", "cherry")]);

        let json = render_thread(&thread, &rows, &authors, Some("dave"), Some(ROLE_MEMBER));
        assert!(!json.deleted);
        assert_eq!(json.subject, "garden planning");
        assert_eq!(json.posts[0].body, "first");
        assert_eq!(json.posts[1].body, DELETED_PLACEHOLDER);
        assert_eq!(json.posts[1].author.username, DELETED_PLACEHOLDER);

        // The deleted post's own author still sees it.
        let json = render_thread(&thread, &rows, &authors, Some("carol"), Some(ROLE_MEMBER));
        assert_eq!(json.posts[1].body, "second");
        assert_eq!(json.posts[1].author.username, "cherry");
    }
}
