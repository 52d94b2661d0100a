use sea_orm::entity::prelude::*;

/// Join record between a user and a gffft. One per (gffft, member).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "memberships")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub gffft_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub member_id: String,
    /// owner | admin | member | anon | pending | rejected
    pub role: String,
    /// Display handle, unique within the gffft.
    pub handle: String,
    // Unseen-activity counters, reset per member on view.
    pub unseen_threads: i32,
    pub unseen_posts: i32,
    pub unseen_gallery_items: i32,
    pub unseen_link_items: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::gfffts::Entity",
        from = "Column::GffftId",
        to = "super::gfffts::Column::Id"
    )]
    Gfffts,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::MemberId",
        to = "super::users::Column::Id"
    )]
    Users,
}

impl Related<super::gfffts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Gfffts.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
