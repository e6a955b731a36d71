use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_registry_tables::Migration),
            Box::new(m20250101_000002_create_inventory_tables::Migration),
            Box::new(m20250101_000003_create_lifecycle_tables::Migration),
        ]
    }
}

#[derive(DeriveIden)]
pub(crate) enum RoleAssignments {
    Table,
    Identity,
    Role,
    RoleId,
    AssignedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Vendors {
    Table,
    Id,
    Identity,
    Name,
    Location,
    ContactInfo,
    MaterialTypes,
    RegisteredAt,
    IsActive,
}

#[derive(DeriveIden)]
pub(crate) enum VendorPerformance {
    Table,
    VendorId,
    TotalOrders,
    CompletedOrders,
    TotalQuantitySupplied,
    LastActivityAt,
    Rating,
    IsVerified,
}

#[derive(DeriveIden)]
pub(crate) enum Manufacturers {
    Table,
}

#[derive(DeriveIden)]
pub(crate) enum Distributors {
    Table,
}

#[derive(DeriveIden)]
pub(crate) enum Retailers {
    Table,
}

/// Columns shared by the manufacturer, distributor and retailer registries.
#[derive(DeriveIden)]
pub(crate) enum Participant {
    Id,
    Identity,
    Name,
    Location,
    RegisteredAt,
}

#[derive(DeriveIden)]
pub(crate) enum Materials {
    Table,
    Id,
    Name,
    Category,
    Unit,
    PricePerUnit,
    VendorId,
    TotalQuantity,
    AvailableQuantity,
    AddedAt,
    IsActive,
}

#[derive(DeriveIden)]
pub(crate) enum SupplyHistory {
    Table,
    Id,
    MaterialId,
    VendorId,
    ProductId,
    Quantity,
    PricePerUnit,
    TotalAmount,
    Kind,
    Actor,
    SuppliedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Products {
    Table,
    Id,
    Name,
    Description,
    TargetQuantity,
    ManufacturerId,
    DistributorId,
    RetailerId,
    Stage,
    CreatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum ProductMaterialUsages {
    Table,
    Id,
    ProductId,
    MaterialId,
    QuantityUsed,
    AssignedAt,
}

#[derive(DeriveIden)]
pub(crate) enum ProductTimelines {
    Table,
    ProductId,
    CreatedAt,
    MaterialsAssignedAt,
    ManufacturingStartedAt,
    DistributionStartedAt,
    RetailReceivedAt,
    SoldAt,
}

fn participant_table(table: impl IntoTableRef) -> TableCreateStatement {
    Table::create()
        .table(table)
        .if_not_exists()
        .col(
            ColumnDef::new(Participant::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new(Participant::Identity)
                .string()
                .not_null()
                .unique_key(),
        )
        .col(ColumnDef::new(Participant::Name).string().not_null())
        .col(ColumnDef::new(Participant::Location).string().not_null())
        .col(
            ColumnDef::new(Participant::RegisteredAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .to_owned()
}

mod m20250101_000001_create_registry_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_registry_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RoleAssignments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RoleAssignments::Identity)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(RoleAssignments::Role)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(RoleAssignments::RoleId).integer().not_null())
                        .col(
                            ColumnDef::new(RoleAssignments::AssignedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Vendors::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Vendors::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Vendors::Identity)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Vendors::Name).string().not_null())
                        .col(ColumnDef::new(Vendors::Location).string().not_null())
                        .col(ColumnDef::new(Vendors::ContactInfo).string().not_null())
                        .col(ColumnDef::new(Vendors::MaterialTypes).string().not_null())
                        .col(
                            ColumnDef::new(Vendors::RegisteredAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Vendors::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(VendorPerformance::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(VendorPerformance::VendorId)
                                .integer()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(VendorPerformance::TotalOrders)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(VendorPerformance::CompletedOrders)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(VendorPerformance::TotalQuantitySupplied)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(VendorPerformance::LastActivityAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(VendorPerformance::Rating)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(VendorPerformance::IsVerified)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_vendor_performance_vendor")
                                .from(VendorPerformance::Table, VendorPerformance::VendorId)
                                .to(Vendors::Table, Vendors::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(participant_table(Manufacturers::Table))
                .await?;
            manager
                .create_table(participant_table(Distributors::Table))
                .await?;
            manager
                .create_table(participant_table(Retailers::Table))
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Retailers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Distributors::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Manufacturers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(VendorPerformance::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Vendors::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RoleAssignments::Table).to_owned())
                .await
        }
    }
}

mod m20250101_000002_create_inventory_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_inventory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Materials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Materials::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Materials::Name).string().not_null())
                        .col(ColumnDef::new(Materials::Category).string().not_null())
                        .col(ColumnDef::new(Materials::Unit).string().not_null())
                        .col(
                            ColumnDef::new(Materials::PricePerUnit)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Materials::VendorId).integer().not_null())
                        .col(
                            ColumnDef::new(Materials::TotalQuantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::AvailableQuantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::AddedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_materials_vendor")
                                .from(Materials::Table, Materials::VendorId)
                                .to(Vendors::Table, Vendors::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_materials_vendor_id")
                        .table(Materials::Table)
                        .col(Materials::VendorId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SupplyHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SupplyHistory::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(SupplyHistory::MaterialId).integer().not_null())
                        .col(ColumnDef::new(SupplyHistory::VendorId).integer().not_null())
                        .col(
                            ColumnDef::new(SupplyHistory::ProductId)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SupplyHistory::Quantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplyHistory::PricePerUnit)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplyHistory::TotalAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupplyHistory::Kind).string_len(16).not_null())
                        .col(ColumnDef::new(SupplyHistory::Actor).string().not_null())
                        .col(
                            ColumnDef::new(SupplyHistory::SuppliedAt)
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
                        .name("idx_supply_history_material_id")
                        .table(SupplyHistory::Table)
                        .col(SupplyHistory::MaterialId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SupplyHistory::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Materials::Table).to_owned())
                .await
        }
    }
}

mod m20250101_000003_create_lifecycle_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_lifecycle_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).string().not_null())
                        .col(
                            ColumnDef::new(Products::TargetQuantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::ManufacturerId)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::DistributorId)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::RetailerId)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::Stage)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductMaterialUsages::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductMaterialUsages::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ProductMaterialUsages::ProductId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductMaterialUsages::MaterialId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductMaterialUsages::QuantityUsed)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductMaterialUsages::AssignedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_usages_product")
                                .from(ProductMaterialUsages::Table, ProductMaterialUsages::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_usages_material")
                                .from(
                                    ProductMaterialUsages::Table,
                                    ProductMaterialUsages::MaterialId,
                                )
                                .to(Materials::Table, Materials::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_usages_product_material")
                        .table(ProductMaterialUsages::Table)
                        .col(ProductMaterialUsages::ProductId)
                        .col(ProductMaterialUsages::MaterialId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductTimelines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductTimelines::ProductId)
                                .integer()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ProductTimelines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductTimelines::MaterialsAssignedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductTimelines::ManufacturingStartedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductTimelines::DistributionStartedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductTimelines::RetailReceivedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductTimelines::SoldAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_timelines_product")
                                .from(ProductTimelines::Table, ProductTimelines::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductTimelines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductMaterialUsages::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }
}
