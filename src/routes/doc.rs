use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{CountStats, CustomerList, CustomerStatusRequest, OrderStats, ReportResponse, ReportRow},
        auth::{AdminLoginRequest, AdminLoginResponse, LoginRequest, LoginResponse, RegisterRequest},
        categories::CategoryList,
        orders::{
            AdminOrder, AdminOrderList, CreateOrderRequest, OrderHistory, OrderItemRequest,
            OrderPlaced, OrderWithItems, UpdateOrderStatusRequest,
        },
        products::{ImageUploadResponse, ProductImageList, ProductList, ProductPayload},
    },
    models::{Category, Customer, Order, OrderItemView, Product, ProductImage, UserPublic},
    response::{ApiResponse, Meta},
    routes::{admin, auth, categories, health, orders, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        products::list_products,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::upload_images,
        products::list_images,
        products::delete_image,
        categories::list_categories,
        orders::create_order,
        orders::user_orders,
        orders::all_orders,
        orders::update_order_status,
        admin::login,
        admin::user_stats,
        admin::product_stats,
        admin::order_stats,
        admin::customers,
        admin::update_customer,
        admin::reports
    ),
    components(
        schemas(
            UserPublic,
            Category,
            Product,
            ProductImage,
            Order,
            OrderItemView,
            Customer,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            AdminLoginRequest,
            AdminLoginResponse,
            ProductPayload,
            ProductList,
            ProductImageList,
            ImageUploadResponse,
            CategoryList,
            OrderItemRequest,
            CreateOrderRequest,
            OrderPlaced,
            OrderWithItems,
            OrderHistory,
            AdminOrder,
            AdminOrderList,
            UpdateOrderStatusRequest,
            CountStats,
            OrderStats,
            CustomerList,
            CustomerStatusRequest,
            ReportRow,
            ReportResponse,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderHistory>,
            ApiResponse<AdminOrderList>,
            ApiResponse<ReportResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "User registration and login"),
        (name = "Products", description = "Product and image endpoints"),
        (name = "Categories", description = "Category endpoints"),
        (name = "Orders", description = "Order placement and history"),
        (name = "Admin", description = "Admin login, stats and reports"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
