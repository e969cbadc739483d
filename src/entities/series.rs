use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "series")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub title: String,
    pub path: String,
    pub cover_path: Option<String>,
    pub description: Option<String>,
    /// JSON array of genre names.
    pub genres: Option<String>,
    pub external_id: Option<i32>,
    pub rating: Option<f32>,
    /// Set once the metadata provider has been asked about this series,
    /// whether or not it found anything.
    pub metadata_fetched_at: Option<String>,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::episodes::Entity")]
    Episodes,
}

impl Related<super::episodes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Episodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
