use pk_shop_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    dto::{
        auth::{LoginRequest, RegisterRequest},
        orders::{CreateOrderRequest, OrderItemRequest, UpdateOrderStatusRequest},
        products::ProductPayload,
    },
    entity::{
        categories::ActiveModel as CategoryActive,
        orders::{Column as OrderCol, Entity as Orders},
        products::Entity as Products,
        users::{Column as UserCol, Entity as Users},
    },
    middleware::auth::AuthUser,
    services::{auth_service, catalog_service, order_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

// Integration tests need a running Postgres; they skip themselves when no
// database is configured.
async fn test_state() -> anyhow::Result<Option<AppState>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests."
                );
                return Ok(None);
            }
        };

    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    let upload_dir = std::env::temp_dir()
        .join(format!("pkshop-test-{}", Uuid::new_v4().simple()))
        .to_string_lossy()
        .into_owned();

    let config = AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        upload_dir,
        frontend_url: "http://localhost:3000".into(),
        dev_mode: true,
    };

    Ok(Some(AppState { orm, config }))
}

fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

async fn create_category(state: &AppState) -> anyhow::Result<i32> {
    let category = CategoryActive {
        id: NotSet,
        name: Set(format!("Test Category {}", Uuid::new_v4().simple())),
        description: Set(Some("category for tests".into())),
        status: Set("active".into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(category.id)
}

async fn register_test_user(state: &AppState, email: &str) -> anyhow::Result<AuthUser> {
    let resp = auth_service::register_user(
        state,
        RegisterRequest {
            name: "Test User".into(),
            email: email.to_string(),
            password: "user123".into(),
            phone: Some("0300-0000000".into()),
        },
    )
    .await?;
    let user = resp.data.unwrap();
    Ok(AuthUser {
        id: user.id,
        role: "user".into(),
    })
}

async fn create_test_product(
    state: &AppState,
    category_id: i32,
    price: i64,
    stock: i32,
) -> anyhow::Result<i32> {
    let admin = AuthUser {
        id: 0,
        role: "admin".into(),
    };
    let resp = catalog_service::create_product(
        state,
        &admin,
        ProductPayload {
            name: format!("Test Widget {}", Uuid::new_v4().simple()),
            description: "A product for testing".into(),
            price,
            stock,
            category_id,
            color: None,
            material: None,
            size: None,
        },
    )
    .await?;
    Ok(resp.data.unwrap().id)
}

// End to end: register, login, create a product (stock 5, price 10.00),
// order qty 3, then verify stock, history and the snapshot price.
#[tokio::test]
async fn register_login_order_and_history_flow() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let email = unique_email("flow");
    let user = register_test_user(&state, &email).await?;

    let login = auth_service::login_user(
        &state,
        LoginRequest {
            email: email.clone(),
            password: "user123".into(),
        },
    )
    .await?;
    let login = login.data.unwrap();
    assert!(!login.token.is_empty());
    assert_eq!(login.user.email, email);

    let category_id = create_category(&state).await?;
    let product_id = create_test_product(&state, category_id, 1000, 5).await?;

    let placed = order_service::place_order(
        &state,
        &user,
        CreateOrderRequest {
            items: vec![OrderItemRequest {
                product_id,
                quantity: 3,
            }],
            total_amount: 3000,
            status: None,
        },
    )
    .await?;
    let order_id = placed.data.unwrap().order_id;

    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(product.stock, 2);

    let history = order_service::list_user_orders(&state, &user, user.id)
        .await?;
    let orders = history.data.unwrap().orders;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order.id, order_id);
    assert_eq!(orders[0].order.total_amount, 3000);
    assert_eq!(orders[0].order.status, "pending");
    assert_eq!(orders[0].items.len(), 1);
    // Snapshot price, not whatever the product costs later.
    assert_eq!(orders[0].items[0].price, 1000);
    assert_eq!(orders[0].items[0].quantity, 3);

    let admin = AuthUser {
        id: 0,
        role: "admin".into(),
    };
    let updated = order_service::update_order_status(
        &state,
        &admin,
        order_id,
        UpdateOrderStatusRequest {
            status: "confirmed".into(),
        },
    )
    .await?;
    assert_eq!(updated.data.unwrap().status, "confirmed");

    Ok(())
}

// Atomicity: when any item exceeds stock, nothing is persisted.
#[tokio::test]
async fn insufficient_stock_rolls_back() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let user = register_test_user(&state, &unique_email("rollback")).await?;
    let category_id = create_category(&state).await?;
    let in_stock = create_test_product(&state, category_id, 500, 10).await?;
    let scarce = create_test_product(&state, category_id, 500, 2).await?;

    let result = order_service::place_order(
        &state,
        &user,
        CreateOrderRequest {
            items: vec![
                OrderItemRequest {
                    product_id: in_stock,
                    quantity: 1,
                },
                OrderItemRequest {
                    product_id: scarce,
                    quantity: 5,
                },
            ],
            total_amount: 3000,
            status: None,
        },
    )
    .await;

    let err = result.err().expect("order should have been rejected");
    let message = err.to_string();
    assert!(message.contains(&format!("Insufficient stock for product {scarce}")));
    assert!(message.contains("Available: 2, Requested: 5"));

    // Neither product moved, and no order row exists for this user.
    let p1 = Products::find_by_id(in_stock).one(&state.orm).await?.unwrap();
    let p2 = Products::find_by_id(scarce).one(&state.orm).await?.unwrap();
    assert_eq!(p1.stock, 10);
    assert_eq!(p2.stock, 2);

    let order_count = Orders::find()
        .filter(OrderCol::UserId.eq(user.id))
        .count(&state.orm)
        .await?;
    assert_eq!(order_count, 0);

    Ok(())
}

// Two simultaneous orders for the last unit: at most one may succeed and
// stock must never go negative.
#[tokio::test]
async fn concurrent_orders_on_last_unit() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let user_a = register_test_user(&state, &unique_email("race-a")).await?;
    let user_b = register_test_user(&state, &unique_email("race-b")).await?;
    let category_id = create_category(&state).await?;
    let product_id = create_test_product(&state, category_id, 1000, 1).await?;

    let request = || CreateOrderRequest {
        items: vec![OrderItemRequest {
            product_id,
            quantity: 1,
        }],
        total_amount: 1000,
        status: None,
    };

    let state_a = state.clone();
    let state_b = state.clone();
    let (req_a, req_b) = (request(), request());
    let task_a = tokio::spawn(async move {
        order_service::place_order(&state_a, &user_a, req_a).await.is_ok()
    });
    let task_b = tokio::spawn(async move {
        order_service::place_order(&state_b, &user_b, req_b).await.is_ok()
    });

    let (ok_a, ok_b) = (task_a.await?, task_b.await?);
    let successes = usize::from(ok_a) + usize::from(ok_b);
    assert_eq!(successes, 1, "exactly one of two competing orders may win");

    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(product.stock, 0);

    Ok(())
}

#[tokio::test]
async fn duplicate_email_rejected() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let email = unique_email("dup");
    register_test_user(&state, &email).await?;

    let second = auth_service::register_user(
        &state,
        RegisterRequest {
            name: "Someone Else".into(),
            email: email.clone(),
            password: "other456".into(),
            phone: None,
        },
    )
    .await;
    assert!(second.is_err());

    let count = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .count(&state.orm)
        .await?;
    assert_eq!(count, 1);

    // Stored credential is a hash, never the plaintext.
    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?
        .unwrap();
    assert_ne!(user.password_hash, "user123");

    Ok(())
}

// Round-trip: a fresh product lists with an empty images array;
// after one upload it lists with exactly one URL and the file exists on disk.
#[tokio::test]
async fn product_images_round_trip() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let admin = AuthUser {
        id: 0,
        role: "admin".into(),
    };
    let category_id = create_category(&state).await?;
    let product_id = create_test_product(&state, category_id, 2500, 3).await?;

    let listed = catalog_service::list_products(&state).await?;
    let items = listed.data.unwrap().items;
    let product = items.iter().find(|p| p.id == product_id).unwrap();
    assert!(product.images.is_empty());

    let uploaded = catalog_service::upload_images(
        &state,
        &admin,
        product_id,
        vec![catalog_service::UploadedFile {
            filename: Some("photo.png".into()),
            content_type: Some("image/png".into()),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        }],
    )
    .await?;
    let urls = uploaded.data.unwrap().image_urls;
    assert_eq!(urls.len(), 1);

    let filename = urls[0].trim_start_matches("/uploads/");
    let on_disk = std::path::Path::new(&state.config.upload_dir).join(filename);
    assert!(on_disk.exists());

    let listed = catalog_service::list_products(&state).await?;
    let items = listed.data.unwrap().items;
    let product = items.iter().find(|p| p.id == product_id).unwrap();
    assert_eq!(product.images, urls);
    assert_eq!(product.image_count, 1);

    // Sixth file in one call is rejected outright.
    let too_many: Vec<_> = (0..6)
        .map(|i| catalog_service::UploadedFile {
            filename: Some(format!("photo{i}.png")),
            content_type: Some("image/png".into()),
            bytes: vec![0u8; 16],
        })
        .collect();
    let rejected = catalog_service::upload_images(&state, &admin, product_id, too_many).await;
    assert!(rejected.is_err());

    Ok(())
}

// Ordering for a requester with no user row is a 404 that names the user,
// not the product or the order.
#[tokio::test]
async fn order_for_unknown_user_names_the_user() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let ghost = AuthUser {
        id: -1,
        role: "user".into(),
    };
    let result = order_service::place_order(
        &state,
        &ghost,
        CreateOrderRequest {
            items: vec![OrderItemRequest {
                product_id: 1,
                quantity: 1,
            }],
            total_amount: 100,
            status: None,
        },
    )
    .await;

    let err = result.err().expect("order for unknown user should fail");
    assert_eq!(err.to_string(), "User not found");

    Ok(())
}

// When an image row insert fails, the files already written for that batch
// are removed instead of being stranded in the upload directory.
#[tokio::test]
async fn failed_image_insert_leaves_no_files_behind() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let admin = AuthUser {
        id: 0,
        role: "admin".into(),
    };
    let category_id = create_category(&state).await?;
    let product_id = create_test_product(&state, category_id, 900, 1).await?;
    catalog_service::delete_product(&state, &admin, product_id).await?;

    tokio::fs::create_dir_all(&state.config.upload_dir).await?;

    // The deleted product id violates the foreign key on the first insert,
    // after its file has already hit the disk.
    let files = vec![catalog_service::UploadedFile {
        filename: Some("photo.png".into()),
        content_type: Some("image/png".into()),
        bytes: vec![0u8; 32],
    }];
    let result =
        catalog_service::store_images(&state.orm, &state.config.upload_dir, product_id, &files)
            .await;
    assert!(result.is_err());

    let mut entries = std::fs::read_dir(&state.config.upload_dir)?;
    assert!(entries.next().is_none(), "upload dir should be empty");

    Ok(())
}
