use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use serde::Serialize;
use supplychain_ledger::{
    auth::Identity,
    config::{self, AppConfig},
    db::{self, DbConfig, LedgerStore},
    entities::{material, product, supply_history::SupplyKind},
    events::{self, EventSender},
    services::{
        audit::HistoryFilter,
        inventory::MaterialDetails,
        lifecycle::{stage_label, NewProduct},
        registry::{ParticipantRegistration, VendorRegistration},
        LedgerServices,
    },
};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(context.store.conn()).await?;
            println!("Migrations applied");
        }
        Commands::Role { identity } => {
            let identity = Identity::parse(&identity)?;
            let role = context.services.registry.resolve_role(&identity).await?;
            if cli.json {
                print_json(&role)?;
            } else {
                println!("{} -> {}", identity, role.role_name());
            }
        }
        Commands::Vendor(command) => {
            handle_vendor_command(&context, command, caller(&cli.caller), cli.json).await?
        }
        Commands::Participant(command) => {
            handle_participant_command(&context, command, caller(&cli.caller), cli.json).await?
        }
        Commands::Material(command) => {
            handle_material_command(&context, command, caller(&cli.caller), cli.json).await?
        }
        Commands::Product(command) => {
            handle_product_command(&context, command, caller(&cli.caller), cli.json).await?
        }
        Commands::History(args) => {
            let rows = context
                .services
                .audit
                .supply_history(HistoryFilter {
                    material_id: args.material_id,
                    vendor_id: args.vendor_id,
                    product_id: args.product_id,
                    kind: args.kind.map(SupplyKind::from),
                })
                .await?;
            if cli.json {
                print_json(&rows)?;
            } else {
                for row in &rows {
                    println!(
                        "#{} {} material {} vendor {} product {} qty {} @ {} by {} at {}",
                        row.id,
                        row.kind,
                        row.material_id,
                        row.vendor_id,
                        row.product_id,
                        row.quantity,
                        row.price_per_unit,
                        row.actor,
                        row.supplied_at
                    );
                }
            }
        }
        Commands::Conservation => {
            let violations = context.services.audit.verify_conservation().await?;
            if cli.json {
                print_json(&violations)?;
            } else if violations.is_empty() {
                println!("Inventory is conserved for every material");
            } else {
                println!("Conservation violated for materials: {:?}", violations);
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "ledger-cli",
    about = "Operator CLI for the supply-chain ledger",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[arg(long, global = true, help = "Identity issuing the command")]
    caller: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Show the role an identity holds
    Role { identity: String },
    #[command(subcommand)]
    Vendor(VendorCommands),
    #[command(subcommand)]
    Participant(ParticipantCommands),
    #[command(subcommand)]
    Material(MaterialCommands),
    #[command(subcommand)]
    Product(ProductCommands),
    /// List supply history rows
    History(HistoryArgs),
    /// Check inventory conservation against the history log
    Conservation,
}

#[derive(Subcommand)]
enum VendorCommands {
    Register(VendorRegisterArgs),
    List,
    Get { id: i32 },
    Deactivate { id: i32 },
    Verify { id: i32 },
    Rate { id: i32, rating: i32 },
    Performance { id: i32 },
}

#[derive(Args)]
struct VendorRegisterArgs {
    #[arg(long)]
    identity: String,
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    location: String,
    #[arg(long, default_value = "")]
    contact_info: String,
    #[arg(long, default_value = "")]
    material_types: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum ParticipantKind {
    Manufacturer,
    Distributor,
    Retailer,
}

#[derive(Subcommand)]
enum ParticipantCommands {
    Register {
        kind: ParticipantKind,
        #[arg(long)]
        identity: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        location: String,
    },
    List { kind: ParticipantKind },
}

#[derive(Subcommand)]
enum MaterialCommands {
    /// List new stock; vendors always list for themselves
    Add(MaterialAddArgs),
    Restock {
        id: i32,
        #[arg(long)]
        quantity: i64,
        #[arg(long)]
        price: Decimal,
    },
    Return {
        id: i32,
        #[arg(long)]
        quantity: i64,
    },
    Deactivate { id: i32 },
    Get { id: i32 },
    List {
        #[arg(long)]
        vendor_id: Option<i32>,
    },
}

#[derive(Args)]
struct MaterialAddArgs {
    #[arg(long)]
    vendor_id: Option<i32>,
    #[arg(long)]
    name: String,
    #[arg(long)]
    category: String,
    #[arg(long)]
    unit: String,
    #[arg(long)]
    quantity: i64,
    #[arg(long)]
    price: Decimal,
}

#[derive(Clone, Copy, ValueEnum)]
enum Step {
    Manufacture,
    Distribute,
    Receive,
    Sell,
}

#[derive(Subcommand)]
enum ProductCommands {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        target_quantity: i64,
    },
    Assign {
        product_id: i32,
        material_id: i32,
        quantity: i64,
    },
    Advance { product_id: i32, step: Step },
    Get { id: i32 },
    List,
    Materials { id: i32 },
    Timeline { id: i32 },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Received,
    Used,
    Returned,
}

impl From<KindArg> for SupplyKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Received => SupplyKind::Received,
            KindArg::Used => SupplyKind::Used,
            KindArg::Returned => SupplyKind::Returned,
        }
    }
}

#[derive(Args)]
struct HistoryArgs {
    #[arg(long)]
    material_id: Option<i32>,
    #[arg(long)]
    vendor_id: Option<i32>,
    #[arg(long)]
    product_id: Option<i32>,
    #[arg(long, value_enum)]
    kind: Option<KindArg>,
}

struct CliContext {
    store: LedgerStore,
    services: LedgerServices,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config: AppConfig = config::load_config().context("failed to load configuration")?;
        config::init_tracing(&config.log_level, config.log_json);

        let pool = db::establish_connection_with_config(&DbConfig::from(&config))
            .await
            .context("failed to connect to database")?;
        if config.auto_migrate {
            db::run_migrations(&pool).await?;
        }
        let store = LedgerStore::new(Arc::new(pool));

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        tokio::spawn(events::process_events(event_rx));
        let owner = Identity::parse(&config.owner_identity)?;

        let services =
            LedgerServices::new(store.clone(), Arc::new(EventSender::new(event_tx)), owner);

        Ok(Self { store, services })
    }
}

fn caller(raw: &Option<String>) -> Result<Identity> {
    let raw = raw
        .as_deref()
        .ok_or_else(|| anyhow!("--caller is required for this command"))?;
    Ok(Identity::parse(raw)?)
}

async fn handle_vendor_command(
    context: &CliContext,
    command: VendorCommands,
    caller: Result<Identity>,
    json: bool,
) -> Result<()> {
    let services = &context.services;
    match command {
        VendorCommands::Register(args) => {
            let id = services
                .registry
                .register_vendor(
                    &caller?,
                    VendorRegistration {
                        identity: args.identity,
                        name: args.name,
                        location: args.location,
                        contact_info: args.contact_info,
                        material_types: args.material_types,
                    },
                )
                .await?;
            print_created("vendor", id, json)?;
        }
        VendorCommands::List => {
            let vendors = services.registry.list_vendors().await?;
            if json {
                print_json(&vendors)?;
            } else {
                for v in &vendors {
                    println!(
                        "- Vendor {} • {} • {} • {}",
                        v.id,
                        v.name,
                        v.identity,
                        if v.is_active { "active" } else { "inactive" }
                    );
                }
            }
        }
        VendorCommands::Get { id } => print_json(&services.registry.get_vendor(id).await?)?,
        VendorCommands::Deactivate { id } => {
            services.registry.deactivate_vendor(&caller?, id).await?;
            println!("Vendor {} deactivated", id);
        }
        VendorCommands::Verify { id } => {
            services.vendor_performance.verify_vendor(&caller?, id).await?;
            println!("Vendor {} verified", id);
        }
        VendorCommands::Rate { id, rating } => {
            services
                .vendor_performance
                .rate_vendor(&caller?, id, rating)
                .await?;
            println!("Vendor {} rated {:.1} stars", id, rating as f32 / 10.0);
        }
        VendorCommands::Performance { id } => {
            let performance = services.vendor_performance.vendor_performance(id).await?;
            if json {
                print_json(&performance)?;
            } else {
                println!(
                    "Vendor {} • orders {} ({} completed) • supplied {} • rating {:.1} • {}",
                    performance.vendor_id,
                    performance.total_orders,
                    performance.completed_orders,
                    performance.total_quantity_supplied,
                    performance.stars(),
                    if performance.is_verified {
                        "verified"
                    } else {
                        "unverified"
                    }
                );
            }
        }
    }
    Ok(())
}

async fn handle_participant_command(
    context: &CliContext,
    command: ParticipantCommands,
    caller: Result<Identity>,
    json: bool,
) -> Result<()> {
    let registry = &context.services.registry;
    match command {
        ParticipantCommands::Register {
            kind,
            identity,
            name,
            location,
        } => {
            let caller = caller?;
            let input = ParticipantRegistration {
                identity,
                name,
                location,
            };
            let (label, id) = match kind {
                ParticipantKind::Manufacturer => (
                    "manufacturer",
                    registry.register_manufacturer(&caller, input).await?,
                ),
                ParticipantKind::Distributor => (
                    "distributor",
                    registry.register_distributor(&caller, input).await?,
                ),
                ParticipantKind::Retailer => {
                    ("retailer", registry.register_retailer(&caller, input).await?)
                }
            };
            print_created(label, id, json)?;
        }
        ParticipantCommands::List { kind } => match kind {
            ParticipantKind::Manufacturer => print_json(&registry.list_manufacturers().await?)?,
            ParticipantKind::Distributor => print_json(&registry.list_distributors().await?)?,
            ParticipantKind::Retailer => print_json(&registry.list_retailers().await?)?,
        },
    }
    Ok(())
}

async fn handle_material_command(
    context: &CliContext,
    command: MaterialCommands,
    caller: Result<Identity>,
    json: bool,
) -> Result<()> {
    let inventory = &context.services.inventory;
    match command {
        MaterialCommands::Add(args) => {
            let caller = caller?;
            let details = MaterialDetails {
                name: args.name,
                category: args.category,
                unit: args.unit,
                quantity: args.quantity,
                price_per_unit: args.price,
            };
            let id = match args.vendor_id {
                Some(vendor_id) => inventory.add_material(&caller, vendor_id, details).await?,
                None => inventory.vendor_add_material(&caller, details).await?,
            };
            print_created("material", id, json)?;
        }
        MaterialCommands::Restock {
            id,
            quantity,
            price,
        } => {
            let material = inventory
                .restock_material(&caller?, id, quantity, price)
                .await?;
            render_materials(&[material], json)?;
        }
        MaterialCommands::Return { id, quantity } => {
            let material = inventory.return_material(&caller?, id, quantity).await?;
            render_materials(&[material], json)?;
        }
        MaterialCommands::Deactivate { id } => {
            inventory.deactivate_material(&caller?, id).await?;
            println!("Material {} deactivated", id);
        }
        MaterialCommands::Get { id } => {
            render_materials(&[inventory.get_material(id).await?], json)?
        }
        MaterialCommands::List { vendor_id } => {
            let materials = match vendor_id {
                Some(vendor_id) => inventory.materials_by_vendor(vendor_id).await?,
                None => inventory.list_materials().await?,
            };
            render_materials(&materials, json)?;
        }
    }
    Ok(())
}

async fn handle_product_command(
    context: &CliContext,
    command: ProductCommands,
    caller: Result<Identity>,
    json: bool,
) -> Result<()> {
    let lifecycle = &context.services.lifecycle;
    match command {
        ProductCommands::Create {
            name,
            description,
            target_quantity,
        } => {
            let id = lifecycle
                .create_product(
                    &caller?,
                    NewProduct {
                        name,
                        description,
                        target_quantity,
                    },
                )
                .await?;
            print_created("product", id, json)?;
        }
        ProductCommands::Assign {
            product_id,
            material_id,
            quantity,
        } => {
            let usage = lifecycle
                .assign_material(&caller?, product_id, material_id, quantity)
                .await?;
            if json {
                print_json(&usage)?;
            } else {
                println!(
                    "Product {} now uses {} of material {}",
                    usage.product_id, usage.quantity_used, usage.material_id
                );
            }
        }
        ProductCommands::Advance { product_id, step } => {
            let caller = caller?;
            let product = match step {
                Step::Manufacture => lifecycle.start_manufacturing(&caller, product_id).await?,
                Step::Distribute => lifecycle.start_distribution(&caller, product_id).await?,
                Step::Receive => lifecycle.receive_at_retail(&caller, product_id).await?,
                Step::Sell => lifecycle.mark_as_sold(&caller, product_id).await?,
            };
            render_products(&[product], json)?;
        }
        ProductCommands::Get { id } => render_products(&[lifecycle.get_product(id).await?], json)?,
        ProductCommands::List => render_products(&lifecycle.list_products().await?, json)?,
        ProductCommands::Materials { id } => {
            print_json(&lifecycle.get_product_materials(id).await?)?
        }
        ProductCommands::Timeline { id } => {
            print_json(&lifecycle.get_product_timeline(id).await?)?
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_created(kind: &str, id: i32, json: bool) -> Result<()> {
    if json {
        print_json(&serde_json::json!({ "kind": kind, "id": id }))
    } else {
        println!("Created {} {}", kind, id);
        Ok(())
    }
}

fn render_materials(materials: &[material::Model], json: bool) -> Result<()> {
    if json {
        return print_json(&materials);
    }
    for m in materials {
        println!(
            "- Material {} • {} ({}) • vendor {} • {}/{} {} available • {} per {}{}",
            m.id,
            m.name,
            m.category,
            m.vendor_id,
            m.available_quantity,
            m.total_quantity,
            m.unit,
            m.price_per_unit,
            m.unit,
            if m.is_active { "" } else { " • inactive" }
        );
    }
    Ok(())
}

fn render_products(products: &[product::Model], json: bool) -> Result<()> {
    if json {
        return print_json(&products);
    }
    for p in products {
        println!(
            "- Product {} • {} • stage {} ({}) • manufacturer {} • distributor {} • retailer {}",
            p.id,
            p.name,
            p.stage.code(),
            stage_label(p.stage.code()),
            p.manufacturer_id,
            p.distributor_id,
            p.retailer_id
        );
    }
    Ok(())
}
