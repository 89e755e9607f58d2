use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::{
        categories::CategoryList,
        products::{ImageUploadResponse, ProductImageList, ProductList, ProductPayload},
    },
    entity::{
        categories::{Column as CategoryCol, Entity as Categories},
        product_images::{
            ActiveModel as ImageActive, Column as ImageCol, Entity as ProductImages,
            Model as ImageModel,
        },
        products::{
            ActiveModel as ProductActive, Column as ProdCol, Entity as Products,
            Model as ProductModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, Product, ProductImage},
    response::ApiResponse,
    state::AppState,
};

pub const MAX_FILES_PER_UPLOAD: usize = 5;
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

/// One part of a multipart image upload, already read off the wire.
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub async fn list_products(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    let products = Products::find()
        .filter(ProdCol::Stock.gt(0))
        .order_by_desc(ProdCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let mut images = load_image_urls(state, products.iter().map(|p| p.id).collect()).await?;

    let items: Vec<Product> = products
        .into_iter()
        .map(|p| {
            let urls = images.remove(&p.id).unwrap_or_default();
            product_from_entity(p, urls)
        })
        .collect();

    let total = items.len() as u64;
    Ok(ApiResponse::list("Products", ProductList { items }, total))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: ProductPayload,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    validate_product_payload(&payload)?;
    let category = resolve_category(state, payload.category_id).await?;

    let product = ProductActive {
        id: NotSet,
        name: Set(payload.name),
        description: Set(payload.description),
        price: Set(payload.price),
        stock: Set(payload.stock),
        category: Set(category.name),
        category_id: Set(payload.category_id),
        color: Set(payload.color),
        material: Set(payload.material),
        size: Set(payload.size),
        image_count: Set(0),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product, Vec::new()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: i32,
    payload: ProductPayload,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    validate_product_payload(&payload)?;

    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound("Product not found".into())),
    };

    let category = resolve_category(state, payload.category_id).await?;

    let mut active: ProductActive = existing.into();
    active.name = Set(payload.name);
    active.description = Set(payload.description);
    active.price = Set(payload.price);
    active.stock = Set(payload.stock);
    active.category = Set(category.name);
    active.category_id = Set(payload.category_id);
    active.color = Set(payload.color);
    active.material = Set(payload.material);
    active.size = Set(payload.size);
    let product = active.update(&state.orm).await?;

    let mut images = load_image_urls(state, vec![product.id]).await?;
    let urls = images.remove(&product.id).unwrap_or_default();

    Ok(ApiResponse::success(
        "Product updated",
        product_from_entity(product, urls),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: i32,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let result = Products::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Product not found".into()));
    }

    Ok(ApiResponse::success("Product deleted", serde_json::json!({})))
}

/// Store uploaded image files and attach a row per file to the product.
/// All files are validated before anything is written.
pub async fn upload_images(
    state: &AppState,
    user: &AuthUser,
    product_id: i32,
    files: Vec<UploadedFile>,
) -> AppResult<ApiResponse<ImageUploadResponse>> {
    ensure_admin(user)?;

    let product = Products::find_by_id(product_id).one(&state.orm).await?;
    if product.is_none() {
        return Err(AppError::NotFound("Product not found".into()));
    }

    if files.is_empty() {
        return Err(AppError::BadRequest("No files supplied".into()));
    }
    if files.len() > MAX_FILES_PER_UPLOAD {
        return Err(AppError::BadRequest(
            "Maximum 5 images allowed per upload".into(),
        ));
    }
    for (i, file) in files.iter().enumerate() {
        if file.bytes.len() > MAX_FILE_SIZE {
            return Err(AppError::BadRequest(format!(
                "File {} is too large. Maximum size is 5MB.",
                i + 1
            )));
        }
        let is_image = file
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(AppError::BadRequest(format!("File {} is not an image", i + 1)));
        }
    }

    tokio::fs::create_dir_all(&state.config.upload_dir)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let txn = state.orm.begin().await?;
    let image_urls = store_images(&txn, &state.config.upload_dir, product_id, &files).await?;

    if let Err(err) = txn.commit().await {
        discard_files(&state.config.upload_dir, &image_urls).await;
        return Err(err.into());
    }

    Ok(ApiResponse::success(
        format!("{} images uploaded successfully", image_urls.len()),
        ImageUploadResponse { image_urls },
    ))
}

/// Write each file to `upload_dir` and insert a row per file. A failure
/// part-way through unlinks every file written so far, so a rolled-back
/// insert never strands files on disk.
pub async fn store_images<C: ConnectionTrait>(
    conn: &C,
    upload_dir: &str,
    product_id: i32,
    files: &[UploadedFile],
) -> AppResult<Vec<String>> {
    let mut image_urls = Vec::with_capacity(files.len());

    for (i, file) in files.iter().enumerate() {
        let filename = upload_filename(file.filename.as_deref());
        let filepath = Path::new(upload_dir).join(&filename);

        if let Err(err) = tokio::fs::write(&filepath, &file.bytes).await {
            discard_files(upload_dir, &image_urls).await;
            return Err(AppError::Internal(err.into()));
        }

        let image_url = format!("/uploads/{filename}");
        image_urls.push(image_url.clone());

        let inserted = ImageActive {
            id: NotSet,
            product_id: Set(product_id),
            image_url: Set(image_url),
            is_primary: Set(i == 0),
            sort_order: Set(i as i32),
            created_at: NotSet,
        }
        .insert(conn)
        .await;

        if let Err(err) = inserted {
            discard_files(upload_dir, &image_urls).await;
            return Err(err.into());
        }
    }

    if let Err(err) = refresh_image_count(conn, product_id).await {
        discard_files(upload_dir, &image_urls).await;
        return Err(err);
    }

    Ok(image_urls)
}

/// Best-effort unlink of stored uploads by their public URLs.
async fn discard_files(upload_dir: &str, image_urls: &[String]) {
    for url in image_urls {
        let filename = url.trim_start_matches("/uploads/");
        let filepath = Path::new(upload_dir).join(filename);
        if let Err(err) = tokio::fs::remove_file(&filepath).await {
            tracing::warn!(error = %err, file = %filepath.display(), "orphan upload not removed");
        }
    }
}

pub async fn list_images(
    state: &AppState,
    product_id: i32,
) -> AppResult<ApiResponse<ProductImageList>> {
    let images: Vec<ProductImage> = ProductImages::find()
        .filter(ImageCol::ProductId.eq(product_id))
        .order_by_asc(ImageCol::SortOrder)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(image_from_entity)
        .collect();

    let total = images.len() as u64;
    Ok(ApiResponse::list("Images", ProductImageList { images }, total))
}

pub async fn delete_image(
    state: &AppState,
    user: &AuthUser,
    product_id: i32,
    image_id: i32,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let image = ProductImages::find()
        .filter(ImageCol::Id.eq(image_id))
        .filter(ImageCol::ProductId.eq(product_id))
        .one(&state.orm)
        .await?;
    let image = match image {
        Some(img) => img,
        None => return Err(AppError::NotFound("Image not found".into())),
    };

    // A missing file on disk is tolerated; a missing row above is not.
    let filename = image.image_url.trim_start_matches("/uploads/");
    let filepath = Path::new(&state.config.upload_dir).join(filename);
    match tokio::fs::remove_file(&filepath).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(AppError::Internal(e.into())),
    }

    let txn = state.orm.begin().await?;
    ProductImages::delete_by_id(image.id).exec(&txn).await?;
    refresh_image_count(&txn, product_id).await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Image deleted successfully",
        serde_json::json!({}),
    ))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let categories: Vec<Category> = Categories::find()
        .filter(CategoryCol::Status.eq("active"))
        .order_by_asc(CategoryCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|c| Category {
            id: c.id,
            name: c.name,
            description: c.description,
            status: c.status,
        })
        .collect();

    let total = categories.len() as u64;
    Ok(ApiResponse::list("Categories", CategoryList { categories }, total))
}

fn validate_product_payload(payload: &ProductPayload) -> Result<(), AppError> {
    if payload.price < 0 {
        return Err(AppError::BadRequest("Price cannot be negative".into()));
    }
    if payload.stock < 0 {
        return Err(AppError::BadRequest("Stock cannot be negative".into()));
    }
    Ok(())
}

async fn resolve_category(
    state: &AppState,
    category_id: i32,
) -> AppResult<crate::entity::categories::Model> {
    let category = Categories::find_by_id(category_id).one(&state.orm).await?;
    match category {
        Some(c) => Ok(c),
        None => Err(AppError::BadRequest("Category does not exist".into())),
    }
}

async fn refresh_image_count<C: ConnectionTrait>(conn: &C, product_id: i32) -> AppResult<()> {
    let count = ProductImages::find()
        .filter(ImageCol::ProductId.eq(product_id))
        .count(conn)
        .await? as i32;

    Products::update_many()
        .col_expr(ProdCol::ImageCount, Expr::value(count))
        .filter(ProdCol::Id.eq(product_id))
        .exec(conn)
        .await?;

    Ok(())
}

/// Random hex name, keeping the original extension when there is one.
fn upload_filename(original: Option<&str>) -> String {
    let ext = original
        .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext))
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .unwrap_or("bin");
    format!("{}.{}", Uuid::new_v4().simple(), ext)
}

async fn load_image_urls(
    state: &AppState,
    product_ids: Vec<i32>,
) -> AppResult<HashMap<i32, Vec<String>>> {
    let mut grouped: HashMap<i32, Vec<String>> = HashMap::new();
    if product_ids.is_empty() {
        return Ok(grouped);
    }

    let rows = ProductImages::find()
        .filter(ImageCol::ProductId.is_in(product_ids))
        .order_by_asc(ImageCol::SortOrder)
        .all(&state.orm)
        .await?;

    for row in rows {
        grouped.entry(row.product_id).or_default().push(row.image_url);
    }

    Ok(grouped)
}

fn product_from_entity(model: ProductModel, images: Vec<String>) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        stock: model.stock,
        category: model.category,
        category_id: model.category_id,
        color: model.color,
        material: model.material,
        size: model.size,
        image_count: model.image_count,
        images,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn image_from_entity(model: ImageModel) -> ProductImage {
    ProductImage {
        id: model.id,
        product_id: model.product_id,
        image_url: model.image_url,
        is_primary: model.is_primary,
        sort_order: model.sort_order,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_filename_keeps_extension() {
        let name = upload_filename(Some("photo.JPG"));
        assert!(name.ends_with(".JPG"));
        assert_eq!(name.len(), 32 + 1 + 3);
    }

    #[test]
    fn upload_filename_defaults_without_extension() {
        assert!(upload_filename(Some("noext")).ends_with(".bin"));
        assert!(upload_filename(None).ends_with(".bin"));
        assert!(upload_filename(Some("trailingdot.")).ends_with(".bin"));
    }

    #[test]
    fn upload_filenames_are_unique() {
        assert_ne!(upload_filename(Some("a.png")), upload_filename(Some("a.png")));
    }
}
