use anyhow::Context;
use jsonwebtoken::{EncodingKey, Header, encode};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use storefront_api::{
    db::{OrmConn, create_orm_conn, run_migrations},
    dto::auth::Claims,
    entity::products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
    middleware::auth::Role,
};
use uuid::Uuid;

const DEMO_VENDOR: &str = "Ferris Goods";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    let vendor_id = Uuid::new_v4();
    seed_products(&orm, vendor_id).await?;

    // Identities live elsewhere; print development tokens when a secret is configured.
    if let Ok(secret) = std::env::var("JWT_SECRET") {
        for role in [Role::Admin, Role::Vendor, Role::User] {
            let sub = if role == Role::Vendor {
                vendor_id
            } else {
                Uuid::new_v4()
            };
            println!("{role:?} token: {}", dev_token(&secret, sub, role)?);
        }
    }

    println!("Seed completed.");
    Ok(())
}

fn dev_token(secret: &str, sub: Uuid, role: Role) -> anyhow::Result<String> {
    let exp = (chrono::Utc::now() + chrono::Duration::days(1)).timestamp() as usize;
    let claims = Claims {
        sub: sub.to_string(),
        role,
        exp,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

async fn seed_products(orm: &OrmConn, vendor_id: Uuid) -> anyhow::Result<()> {
    let products = vec![
        ("Axum Hoodie", "Warm hoodie for Rustaceans", "apparel", 55_00, 50),
        ("Ferris Mug", "Coffee tastes better with Ferris", "kitchen", 12_00, 100),
        ("Rust Sticker Pack", "Decorate your laptop", "accessories", 5_00, 200),
        ("E-book: Async Rust", "Learn async Rust patterns", "books", 25_00, 75),
        ("Crab Plush", "Limited run", "toys", 30_00, 3),
    ];

    for (name, desc, category, price, stock) in products {
        let exists = Products::find()
            .filter(ProdCol::Name.eq(name))
            .count(orm)
            .await?
            > 0;
        if exists {
            continue;
        }

        ProductActive {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(desc.to_string()),
            price: Set(price),
            stock: Set(stock),
            category: Set(category.to_string()),
            vendor_id: Set(vendor_id),
            vendor_name: Set(DEMO_VENDOR.to_string()),
            images: Set(serde_json::json!([])),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
