use crate::gffft::{get_membership, require_gffft};
use crate::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::memberships;
use crate::role::{MembershipRole, ROLE_MEMBER};
use crate::counters;
use actix_web::{delete, error, patch, post, web, Error, HttpResponse, Responder};
use chrono::prelude::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipJson {
    pub gid: i64,
    pub member_id: String,
    pub role: String,
    pub handle: String,
    pub created_at: chrono::NaiveDateTime,
}

impl MembershipJson {
    fn from_model(m: &memberships::Model) -> Self {
        Self {
            gid: m.gffft_id,
            member_id: m.member_id.to_owned(),
            role: m.role.to_owned(),
            handle: m.handle.to_owned(),
            created_at: m.created_at,
        }
    }
}

/// Display handles are unique within a gffft, compared
/// case-insensitively.
pub fn handle_taken(existing: &[String], candidate: &str) -> bool {
    existing
        .iter()
        .any(|h| h.eq_ignore_ascii_case(candidate))
}

/// A duplicate handle fails distinctly from other errors (409).
pub async fn ensure_handle_available(
    db: &DatabaseConnection,
    gid: i64,
    handle: &str,
) -> Result<(), Error> {
    let existing: Vec<String> = memberships::Entity::find()
        .filter(memberships::Column::GffftId.eq(gid))
        .all(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .into_iter()
        .map(|m| m.handle)
        .collect();
    if handle_taken(&existing, handle) {
        return Err(error::ErrorConflict("Handle already in use."));
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct JoinForm {
    pub uid: String,
    pub gid: i64,
    pub handle: String,
}

#[post("/api/gfffts/membership")]
pub async fn join_gffft(
    client: ClientCtx,
    form: web::Json<JoinForm>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&form.uid)?;
    let gffft = require_gffft(db, &uid, form.gid).await?;

    let handle = form.handle.trim().to_owned();
    if handle.is_empty() {
        return Err(error::ErrorUnprocessableEntity("A display handle is required."));
    }
    if get_membership(db, gffft.id, &caller)
        .await
        .map_err(error::ErrorInternalServerError)?
        .is_some()
    {
        return Err(error::ErrorConflict("Already a member of this gffft."));
    }
    ensure_handle_available(db, gffft.id, &handle).await?;

    let now = Utc::now().naive_utc();
    let membership = memberships::Model {
        gffft_id: gffft.id,
        member_id: caller.to_owned(),
        role: ROLE_MEMBER.to_owned(),
        handle,
        unseen_threads: 0,
        unseen_posts: 0,
        unseen_gallery_items: 0,
        unseen_link_items: 0,
        created_at: now,
        updated_at: now,
    };
    memberships::Entity::insert(memberships::ActiveModel {
        gffft_id: Set(membership.gffft_id),
        member_id: Set(membership.member_id.to_owned()),
        role: Set(membership.role.to_owned()),
        handle: Set(membership.handle.to_owned()),
        unseen_threads: Set(0),
        unseen_posts: Set(0),
        unseen_gallery_items: Set(0),
        unseen_link_items: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    actix_web::rt::spawn(counters::on_membership_write(
        db,
        gffft.id,
        None,
        Some(ROLE_MEMBER.to_owned()),
    ));

    Ok(HttpResponse::Ok().json(MembershipJson::from_model(&membership)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangeForm {
    pub uid: String,
    pub gid: i64,
    pub member_id: String,
    pub role: String,
}

#[patch("/api/gfffts/membership")]
pub async fn update_membership(
    client: ClientCtx,
    form: web::Json<RoleChangeForm>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&form.uid)?;
    let gffft = require_gffft(db, &uid, form.gid).await?;

    let caller_role = get_membership(db, gffft.id, &caller)
        .await
        .map_err(error::ErrorInternalServerError)?
        .and_then(|m| MembershipRole::from_str(&m.role));
    if caller_role != Some(MembershipRole::Owner) {
        return Err(error::ErrorForbidden("Only the owner may change roles."));
    }

    if MembershipRole::from_str(&form.role).is_none() {
        return Err(error::ErrorBadRequest("Unknown role."));
    }
    let membership = get_membership(db, gffft.id, &form.member_id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Membership not found."))?;

    // Same role is a no-op write; counters stay untouched.
    if membership.role == form.role {
        return Ok(HttpResponse::NoContent().finish());
    }

    memberships::Entity::update(memberships::ActiveModel {
        gffft_id: Set(membership.gffft_id),
        member_id: Set(membership.member_id.to_owned()),
        role: Set(form.role.to_owned()),
        updated_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    actix_web::rt::spawn(counters::on_membership_write(
        db,
        gffft.id,
        Some(membership.role),
        Some(form.role.to_owned()),
    ));
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveForm {
    pub uid: String,
    pub gid: i64,
    /// When absent, the caller leaves. Removing someone else is an
    /// owner-only action.
    pub member_id: Option<String>,
}

#[delete("/api/gfffts/membership")]
pub async fn delete_membership(
    client: ClientCtx,
    form: web::Json<LeaveForm>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&form.uid)?;
    let gffft = require_gffft(db, &uid, form.gid).await?;

    let target = form.member_id.to_owned().unwrap_or_else(|| caller.to_owned());
    if target != caller {
        let caller_role = get_membership(db, gffft.id, &caller)
            .await
            .map_err(error::ErrorInternalServerError)?
            .and_then(|m| MembershipRole::from_str(&m.role));
        if caller_role != Some(MembershipRole::Owner) {
            return Err(error::ErrorForbidden("Only the owner may remove members."));
        }
    }

    let membership = get_membership(db, gffft.id, &target)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Membership not found."))?;
    memberships::Entity::delete_many()
        .filter(
            Condition::all()
                .add(memberships::Column::GffftId.eq(gffft.id))
                .add(memberships::Column::MemberId.eq(target)),
        )
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    actix_web::rt::spawn(counters::on_membership_write(
        db,
        gffft.id,
        Some(membership.role),
        None,
    ));
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_taken_is_case_insensitive() {
        let existing = vec!["Plum".to_owned(), "cherry".to_owned()];
        assert!(handle_taken(&existing, "plum"));
        assert!(handle_taken(&existing, "CHERRY"));
        assert!(!handle_taken(&existing, "mango"));
        assert!(!handle_taken(&[], "anything"));
    }
}
