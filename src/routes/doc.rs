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
        admin::{
            OrdersStatistics, OrdersTotalSum, PeriodBucket, RangeStats, StatusBucket,
            UpdateOrderStatusRequest,
        },
        auth::{AuthResponse, LoginRequest, RegisterRequest},
        cart::{AddToCartRequest, CartItemView, CartView, UpdateCartItemRequest},
        favorites::{FavoriteProductList, FavoriteRequest, FavoriteState},
        orders::{CreateOrderRequest, OrderItemRequest, OrderList, OrderSummary, OrderWithItems},
        products::{CategoryList, CreateProductRequest, ProductList, UpdateProductRequest},
        uploads::{CleanupReport, ImageInfo, UploadedImage, UploadedImageList},
        users::{
            CreateUserRequest, CurrentUserProfile, ProfileStatistics, TopBuyer, TopBuyersList,
            UpdateUserRequest, UserList, UserWithStats, UsersStatistics,
        },
    },
    models::{Cart, CartItem, Favorite, Order, OrderItem, Product, User},
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, favorites, health, orders, products, upload, users},
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
        auth::profile,
        products::list_products,
        products::list_categories,
        products::search_products,
        products::popular_products,
        products::new_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        favorites::list_favorites,
        favorites::add_favorite,
        favorites::toggle_favorite,
        favorites::check_favorite,
        favorites::remove_favorite,
        orders::list_orders,
        orders::create_order,
        orders::get_order,
        orders::cancel_order,
        orders::reorder,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::orders_total_sum,
        admin::orders_statistics,
        admin::sum_by_period,
        users::list_users,
        users::users_statistics,
        users::top_buyers,
        users::current_user,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        upload::upload_images,
        upload::list_images,
        upload::image_info,
        upload::delete_image,
        upload::cleanup,
    ),
    components(
        schemas(
            User,
            Product,
            Cart,
            CartItem,
            Favorite,
            Order,
            OrderItem,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CategoryList,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartItemView,
            CartView,
            FavoriteRequest,
            FavoriteProductList,
            FavoriteState,
            OrderItemRequest,
            CreateOrderRequest,
            OrderSummary,
            OrderList,
            OrderWithItems,
            UpdateOrderStatusRequest,
            OrdersTotalSum,
            StatusBucket,
            RangeStats,
            OrdersStatistics,
            PeriodBucket,
            CreateUserRequest,
            UpdateUserRequest,
            UserWithStats,
            UserList,
            UsersStatistics,
            TopBuyer,
            TopBuyersList,
            ProfileStatistics,
            CurrentUserProfile,
            UploadedImage,
            UploadedImageList,
            ImageInfo,
            CleanupReport,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<UserList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Favorites", description = "Favorite endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Admin", description = "Order administration"),
        (name = "Users", description = "User back office"),
        (name = "Upload", description = "Product image uploads"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
