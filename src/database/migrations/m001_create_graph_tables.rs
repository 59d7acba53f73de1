use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create graph_nodes table
        manager
            .create_table(
                Table::create()
                    .table(GraphNodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GraphNodes::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GraphNodes::Label).string().not_null())
                    .col(ColumnDef::new(GraphNodes::Properties).json_binary().not_null())
                    .to_owned(),
            )
            .await?;

        // Create graph_edges table
        manager
            .create_table(
                Table::create()
                    .table(GraphEdges::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GraphEdges::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GraphEdges::RelType).string().not_null())
                    .col(ColumnDef::new(GraphEdges::SourceId).string().not_null())
                    .col(ColumnDef::new(GraphEdges::TargetId).string().not_null())
                    .col(ColumnDef::new(GraphEdges::Properties).json_binary().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_graph_edges_source_id")
                            .from(GraphEdges::Table, GraphEdges::SourceId)
                            .to(GraphNodes::Table, GraphNodes::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_graph_edges_target_id")
                            .from(GraphEdges::Table, GraphEdges::TargetId)
                            .to(GraphNodes::Table, GraphNodes::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_graph_nodes_label")
                    .table(GraphNodes::Table)
                    .col(GraphNodes::Label)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_graph_edges_source")
                    .table(GraphEdges::Table)
                    .col(GraphEdges::SourceId)
                    .col(GraphEdges::RelType)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_graph_edges_target")
                    .table(GraphEdges::Table)
                    .col(GraphEdges::TargetId)
                    .col(GraphEdges::RelType)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GraphEdges::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(GraphNodes::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum GraphNodes {
    Table,
    Id,
    Label,
    Properties,
}

#[derive(Iden)]
enum GraphEdges {
    Table,
    Id,
    RelType,
    SourceId,
    TargetId,
    Properties,
}
