use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use flowershop_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_account(&pool, "admin@flowershop.ru", "admin123", "admin").await?;
    let user_id = ensure_account(&pool, "user@flowershop.ru", "user123", "user").await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_account(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let (first_name, last_name) = match role {
        "admin" => ("Админ", "Цветов"),
        _ => ("Мария", "Иванова"),
    };

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, first_name, last_name, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(first_name)
    .bind(last_name)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(id)
}

struct SeedProduct {
    name: &'static str,
    description: &'static str,
    price: i64,
    discount_price: Option<i64>,
    category: &'static str,
    in_stock: i32,
    is_new: bool,
    is_budget: bool,
    tags: &'static [&'static str],
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = [
        SeedProduct {
            name: "Букет «Алые розы»",
            description: "25 алых роз с эвкалиптом",
            price: 450000,
            discount_price: Some(390000),
            category: "Розы",
            in_stock: 15,
            is_new: false,
            is_budget: false,
            tags: &["розы", "классика"],
        },
        SeedProduct {
            name: "Сборный букет «Весна»",
            description: "Тюльпаны, ирисы и зелень",
            price: 280000,
            discount_price: None,
            category: "Сборные букеты",
            in_stock: 20,
            is_new: true,
            is_budget: false,
            tags: &["весна", "тюльпаны"],
        },
        SeedProduct {
            name: "Композиция «Нежность» в коробке",
            description: "Пионовидные розы и гипсофила в шляпной коробке",
            price: 520000,
            discount_price: None,
            category: "Композиции",
            in_stock: 8,
            is_new: true,
            is_budget: false,
            tags: &["коробка", "подарок"],
        },
        SeedProduct {
            name: "Фикус в кашпо",
            description: "Неприхотливое комнатное растение",
            price: 150000,
            discount_price: None,
            category: "Комнатные растения",
            in_stock: 12,
            is_new: false,
            is_budget: true,
            tags: &["растения"],
        },
        SeedProduct {
            name: "Комбо «Букет + конфеты»",
            description: "Сборный букет и коробка конфет",
            price: 380000,
            discount_price: Some(350000),
            category: "Комбо",
            in_stock: 10,
            is_new: false,
            is_budget: false,
            tags: &["комбо", "сладости"],
        },
        SeedProduct {
            name: "Мишка плюшевый",
            description: "Мягкая игрушка 30 см",
            price: 90000,
            discount_price: None,
            category: "Игрушки",
            in_stock: 25,
            is_new: false,
            is_budget: true,
            tags: &["игрушки"],
        },
    ];

    for p in products {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE name = $1")
            .bind(p.name)
            .fetch_optional(pool)
            .await?;
        if exists.is_some() {
            continue;
        }

        sqlx::query(
            r#"
            INSERT INTO products
                (id, name, description, price, discount_price, category,
                 images, in_stock, is_new, is_budget, tags)
            VALUES ($1, $2, $3, $4, $5, $6, '[]'::jsonb, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(p.name)
        .bind(p.description)
        .bind(p.price)
        .bind(p.discount_price)
        .bind(p.category)
        .bind(p.in_stock)
        .bind(p.is_new)
        .bind(p.is_budget)
        .bind(serde_json::json!(p.tags))
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
