use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LocalState::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LocalState::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LocalState::Value).text().not_null())
                    .col(
                        ColumnDef::new(LocalState::UpdatedAt)
                            .date_time()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LocalState::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LocalState {
    Table,
    Key,
    Value,
    UpdatedAt,
}
