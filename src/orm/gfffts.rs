use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "gfffts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The owning user. Every feature row is reachable only through this
    /// chain.
    pub user_id: String,
    pub name: String,
    /// Lowercase index copy of name, for prefix search.
    pub name_lower: String,
    pub description: Option<String>,
    pub intro: Option<String>,
    pub fruit_code: Option<String>,
    /// Gates public listing.
    pub enabled: bool,
    /// JSON array of enabled feature reference paths.
    pub features: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(has_many = "super::memberships::Entity")]
    Memberships,
    #[sea_orm(has_many = "super::boards::Entity")]
    Boards,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::memberships::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl Related<super::boards::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Boards.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
