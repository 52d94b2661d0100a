use sea_orm::entity::prelude::*;

/// Generic feed container, the typed-post generalization of boards.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "collections")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub gffft_id: i64,
    pub slug: String,
    pub post_count: i32,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::gfffts::Entity",
        from = "Column::GffftId",
        to = "super::gfffts::Column::Id"
    )]
    Gfffts,
    #[sea_orm(has_many = "super::collection_posts::Entity")]
    CollectionPosts,
}

impl Related<super::gfffts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Gfffts.def()
    }
}

impl Related<super::collection_posts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CollectionPosts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
