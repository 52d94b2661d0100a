use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "boards")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub gffft_id: i64,
    /// Well-known slug; the lazily created instance is "default".
    pub slug: String,
    pub thread_count: i32,
    pub post_count: i32,
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
    #[sea_orm(has_many = "super::threads::Entity")]
    Threads,
}

impl Related<super::gfffts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Gfffts.def()
    }
}

impl Related<super::threads::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Threads.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
