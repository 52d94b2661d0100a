use crate::gffft::DEFAULT_SLUG;
use crate::orm::{calendars, gfffts};
use actix_web::{error, Error};
use chrono::prelude::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection};

pub async fn get_or_create_default(
    db: &DatabaseConnection,
    gffft: &gfffts::Model,
) -> Result<calendars::Model, Error> {
    if let Some(calendar) = calendars::Entity::find()
        .filter(
            Condition::all()
                .add(calendars::Column::GffftId.eq(gffft.id))
                .add(calendars::Column::Slug.eq(DEFAULT_SLUG)),
        )
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
    {
        return Ok(calendar);
    }
    let now = Utc::now().naive_utc();
    let res = calendars::Entity::insert(calendars::ActiveModel {
        gffft_id: Set(gffft.id),
        slug: Set(DEFAULT_SLUG.to_owned()),
        created_at: Set(now),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    Ok(calendars::Model {
        id: res.last_insert_id,
        gffft_id: gffft.id,
        slug: DEFAULT_SLUG.to_owned(),
        created_at: now,
    })
}
