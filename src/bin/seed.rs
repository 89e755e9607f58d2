use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};

use pk_shop_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        admins::{ActiveModel as AdminActive, Column as AdminCol, Entity as Admins},
        categories::{ActiveModel as CategoryActive, Column as CategoryCol, Entity as Categories},
    },
    services::auth_service::hash_password,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    seed_categories(&orm).await?;
    seed_admin(&orm, "admin@ssbags.com", "admin123").await?;

    println!("Seed completed");
    Ok(())
}

async fn seed_categories(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let categories = [
        ("Handbags", "Fashionable handbags for all occasions"),
        ("Backpacks", "Durable backpacks for work and travel"),
        ("Wallets", "Stylish wallets for men and women"),
        ("Travel Bags", "Spacious bags for your travel needs"),
        ("Crossbody Bags", "Convenient crossbody bags for daily use"),
        ("Laptop Bags", "Protective bags for your laptops"),
        ("Duffel Bags", "Large duffel bags for gym and travel"),
        ("Clutch Bags", "Elegant clutch bags for special events"),
        ("Tote Bags", "Versatile tote bags for shopping and work"),
        ("Messenger Bags", "Professional messenger bags"),
        ("Sling Bags", "Compact sling bags for casual use"),
        ("Briefcases", "Professional briefcases for business"),
        ("School Bags", "Durable bags for students"),
        ("Sports Bags", "Specialized bags for sports activities"),
    ];

    for (name, description) in categories {
        let active = CategoryActive {
            id: NotSet,
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            status: Set("active".into()),
            created_at: NotSet,
        };
        Categories::insert(active)
            .on_conflict(
                OnConflict::column(CategoryCol::Name)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(orm)
            .await?;
    }

    println!("Seeded categories");
    Ok(())
}

async fn seed_admin(orm: &DatabaseConnection, email: &str, password: &str) -> anyhow::Result<()> {
    let password_hash = hash_password(password)?;

    let active = AdminActive {
        id: NotSet,
        name: Set("Admin".into()),
        email: Set(email.to_string()),
        password_hash: Set(password_hash),
        role: Set("admin".into()),
        created_at: NotSet,
    };
    Admins::insert(active)
        .on_conflict(OnConflict::column(AdminCol::Email).do_nothing().to_owned())
        .exec_without_returning(orm)
        .await?;

    println!("Ensured admin {email}");
    Ok(())
}
