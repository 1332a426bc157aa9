//! String-valued key/value rows backing the persisted preferences and history.
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, entity::prelude::*};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "local_state")]
/// One persisted value
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    /// storage key, eg `theme`
    pub key: String,
    /// stored string value
    #[sea_orm(column_type = "Text")]
    pub value: String,
    /// when the value was last written
    pub updated_at: DateTime,
}

/// local_state has no relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    /// Reads the value stored under `key`.
    pub async fn value_of<C: ConnectionTrait>(db: &C, key: &str) -> Result<Option<String>, DbErr> {
        Ok(Self::find_by_id(key.to_string())
            .one(db)
            .await?
            .map(|row| row.value))
    }

    /// Inserts or replaces the value stored under `key`.
    pub async fn upsert<C: ConnectionTrait>(db: &C, key: &str, value: &str) -> Result<(), DbErr> {
        let row = ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(Utc::now().naive_utc()),
        };
        Self::insert(row)
            .on_conflict(
                OnConflict::column(Column::Key)
                    .update_columns([Column::Value, Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
        Ok(())
    }
}
