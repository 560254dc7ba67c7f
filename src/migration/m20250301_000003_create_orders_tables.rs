use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Orders::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Orders::OrderNumber)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Orders::UserId).uuid().not_null())
                    .col(ColumnDef::new(Orders::ShipFullName).string().not_null())
                    .col(ColumnDef::new(Orders::ShipEmail).string().not_null())
                    .col(ColumnDef::new(Orders::ShipPhone).string().not_null())
                    .col(ColumnDef::new(Orders::ShipAddress).string().not_null())
                    .col(ColumnDef::new(Orders::ShipCity).string().not_null())
                    .col(ColumnDef::new(Orders::ShipState).string().not_null())
                    .col(ColumnDef::new(Orders::ShipZipCode).string().not_null())
                    .col(
                        ColumnDef::new(Orders::OrderNote)
                            .string_len(500)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Orders::Subtotal).big_integer().not_null())
                    .col(ColumnDef::new(Orders::Shipping).big_integer().not_null())
                    .col(ColumnDef::new(Orders::Tax).big_integer().not_null())
                    .col(ColumnDef::new(Orders::Total).big_integer().not_null())
                    .col(ColumnDef::new(Orders::PaymentMethod).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Orders::PaymentReference)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Orders::TransactionId).string().null())
                    .col(ColumnDef::new(Orders::PaymentStatus).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Orders::PaidAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Orders::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Orders::TrackingNumber).string().null())
                    .col(
                        ColumnDef::new(Orders::EstimatedDelivery)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Orders::DeliveredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Orders::CancellationReason).string().null())
                    .col(
                        ColumnDef::new(Orders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Orders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_user_created")
                    .table(Orders::Table)
                    .col(Orders::UserId)
                    .col(Orders::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_status_created")
                    .table(Orders::Table)
                    .col(Orders::Status)
                    .col(Orders::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(OrderItems::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                    .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                    .col(ColumnDef::new(OrderItems::Name).string().not_null())
                    .col(ColumnDef::new(OrderItems::Price).big_integer().not_null())
                    .col(
                        ColumnDef::new(OrderItems::Quantity)
                            .integer()
                            .not_null()
                            .check(Expr::col(OrderItems::Quantity).gte(1)),
                    )
                    .col(ColumnDef::new(OrderItems::Image).string().null())
                    .col(ColumnDef::new(OrderItems::Position).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_items_order_id")
                            .from(OrderItems::Table, OrderItems::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderNotes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(OrderNotes::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(OrderNotes::OrderId).uuid().not_null())
                    .col(ColumnDef::new(OrderNotes::Message).text().not_null())
                    .col(ColumnDef::new(OrderNotes::AuthorId).uuid().not_null())
                    .col(
                        ColumnDef::new(OrderNotes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_notes_order_id")
                            .from(OrderNotes::Table, OrderNotes::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderNotes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrderItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Orders {
    Table,
    Id,
    OrderNumber,
    UserId,
    ShipFullName,
    ShipEmail,
    ShipPhone,
    ShipAddress,
    ShipCity,
    ShipState,
    ShipZipCode,
    OrderNote,
    Subtotal,
    Shipping,
    Tax,
    Total,
    PaymentMethod,
    PaymentReference,
    TransactionId,
    PaymentStatus,
    PaidAt,
    Status,
    TrackingNumber,
    EstimatedDelivery,
    DeliveredAt,
    CancellationReason,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum OrderItems {
    Table,
    Id,
    OrderId,
    ProductId,
    Name,
    Price,
    Quantity,
    Image,
    Position,
}

#[derive(DeriveIden)]
pub enum OrderNotes {
    Table,
    Id,
    OrderId,
    Message,
    AuthorId,
    CreatedAt,
}
