use sea_orm::entity::prelude::*;

/// At most one reaction per (post, user).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "collection_reactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub post_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub reaction: String,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::collection_posts::Entity",
        from = "Column::PostId",
        to = "super::collection_posts::Column::Id"
    )]
    CollectionPosts,
}

impl Related<super::collection_posts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CollectionPosts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
