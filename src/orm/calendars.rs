use sea_orm::entity::prelude::*;

/// Feature instance only; calendars define no item operations yet.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "calendars")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub gffft_id: i64,
    pub slug: String,
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
}

impl Related<super::gfffts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Gfffts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
