//! In-memory stand-in for the Robostore REST backend.
//!
//! Implements the endpoints the storefront calls with the same paths, status
//! codes and body shapes as the real service. Tokens are unsigned JWTs whose
//! payload the storefront can decode; the backend itself only checks them
//! against the set it has issued.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use url::Url;

use robostore_core::{
    CartItem, CartItemId, MovementType, Order, OrderId, OrderItem, OrderItemId, OrderStatus,
    OrderUserSummary, Price, Product, ProductId, Role, StockMovement, StockMovementId, Timestamp,
    User, UserId,
};

pub const ADMIN_EMAIL: &str = "admin@robostore.io";
pub const ADMIN_PASSWORD: &str = "admin123";
pub const CUSTOMER_EMAIL: &str = "ada@robots.io";
pub const CUSTOMER_PASSWORD: &str = "secret1";

/// Seeded product ids.
pub const SERVO: &str = "servo-mg996r";
pub const LIDAR: &str = "lidar-a1";
pub const CHASSIS: &str = "chassis-4wd";
pub const RETIRED: &str = "nxt-brick";

type Rejection = (StatusCode, Json<Value>);
type Reply = Result<Json<Value>, Rejection>;
type Shared = Arc<Mutex<Store>>;

fn reject(status: StatusCode, detail: &str) -> Rejection {
    (status, Json(json!({ "detail": detail })))
}

fn lock(store: &Shared) -> MutexGuard<'_, Store> {
    store.lock().expect("fake backend state poisoned")
}

struct Account {
    user: User,
    password: String,
}

struct Store {
    accounts: Vec<Account>,
    products: Vec<Product>,
    carts: HashMap<UserId, Vec<CartItem>>,
    orders: Vec<Order>,
    movements: Vec<StockMovement>,
    tokens: HashMap<String, UserId>,
    next_id: i64,
    token_ttl_secs: i64,
    catalog_down: bool,
    calls: Vec<String>,
}

impl Store {
    fn seeded() -> Self {
        let mut store = Self {
            accounts: Vec::new(),
            products: Vec::new(),
            carts: HashMap::new(),
            orders: Vec::new(),
            movements: Vec::new(),
            tokens: HashMap::new(),
            next_id: 100,
            token_ttl_secs: 3600,
            catalog_down: false,
            calls: Vec::new(),
        };
        store.add_account(1, "admin", ADMIN_EMAIL, ADMIN_PASSWORD, Role::Admin);
        store.add_account(2, "ada", CUSTOMER_EMAIL, CUSTOMER_PASSWORD, Role::Consumer);

        store.add_product(SERVO, "MG996R Servo", 2_990, "actuators", 25, true);
        store.add_product(LIDAR, "RPLidar A1", 49_900, "sensors", 3, true);
        store.add_product(CHASSIS, "4WD Chassis Kit", 15_000, "chassis", 12, true);
        store.add_product(RETIRED, "NXT Brick", 9_900, "controllers", 0, false);
        store
    }

    fn add_account(&mut self, id: i64, username: &str, email: &str, password: &str, role: Role) {
        self.accounts.push(Account {
            user: User {
                id: UserId::new(id),
                username: username.to_string(),
                email: email.to_string(),
                role,
                created_at: Some(Timestamp::now()),
                avatar_url: None,
            },
            password: password.to_string(),
        });
    }

    fn add_product(&mut self, id: &str, name: &str, cents: i64, category: &str, stock: i64, active: bool) {
        self.products.push(Product {
            id: ProductId::new(id),
            name: name.to_string(),
            price: Price::from_cents(cents),
            category: category.to_string(),
            description: Some(format!("{name} for hobby robots")),
            image_url: None,
            stock_quantity: stock,
            is_active: active,
            created_at: Some(Timestamp::now()),
            updated_at: None,
        });
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, id: UserId) -> Option<&User> {
        self.accounts
            .iter()
            .map(|account| &account.user)
            .find(|user| user.id == id)
    }

    fn product_mut(&mut self, id: &str) -> Option<&mut Product> {
        self.products.iter_mut().find(|p| p.id.as_str() == id)
    }

    fn issue_token(&mut self, user: &User) -> String {
        let exp = chrono::Utc::now().timestamp() + self.token_ttl_secs;
        let claims = json!({
            "sub": user.id.to_string(),
            "exp": exp,
            "role": user.role.as_str(),
            "email": user.email,
            "username": user.username,
            "jti": self.next_id(),
        });
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let token = format!("{header}.{payload}.unsigned");
        self.tokens.insert(token.clone(), user.id);
        token
    }

    fn auth_response(&mut self, user: User) -> Value {
        let token = self.issue_token(&user);
        json!({ "access_token": token, "token_type": "bearer", "user": user })
    }

    /// The user behind the request's bearer token.
    fn caller(&self, headers: &HeaderMap) -> Result<User, Rejection> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Not authenticated"))?;
        self.tokens
            .get(token)
            .and_then(|id| self.user(*id))
            .cloned()
            .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
    }

    fn admin(&self, headers: &HeaderMap) -> Result<User, Rejection> {
        let user = self.caller(headers)?;
        if user.is_admin() {
            Ok(user)
        } else {
            Err(reject(StatusCode::FORBIDDEN, "Not enough permissions"))
        }
    }

    fn record_movement(&mut self, product_id: &ProductId, delta: i64, reason: &str, reference: Option<String>, by: Option<UserId>) {
        let id = self.next_id();
        self.movements.push(StockMovement {
            id: StockMovementId::new(id),
            product_id: product_id.clone(),
            movement_type: MovementType::for_delta(delta),
            quantity: delta.abs(),
            reason: Some(reason.to_string()),
            reference_id: reference,
            created_by: by,
            created_at: Some(Timestamp::now()),
        });
    }
}

/// One page of `items` in the backend's listing envelope.
fn paginate<T: Serialize>(key: &str, items: &[T], page: u32, per_page: u32) -> Value {
    let per_page = per_page.clamp(1, 100) as usize;
    let page = page.max(1) as usize;
    let slice: Vec<&T> = items.iter().skip((page - 1) * per_page).take(per_page).collect();

    let mut body = Map::new();
    body.insert(key.to_string(), json!(slice));
    body.insert("total".to_string(), json!(items.len()));
    body.insert("pages".to_string(), json!(items.len().div_ceil(per_page)));
    body.insert("current_page".to_string(), json!(page));
    Value::Object(body)
}

const fn first_page() -> u32 {
    1
}

const fn ten() -> u32 {
    10
}

const fn yes() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default = "ten")]
    per_page: u32,
    #[serde(default = "yes")]
    active_only: bool,
    category: Option<String>,
    status: Option<String>,
}

// =============================================================================
// Handle
// =============================================================================

/// A running fake backend.
#[derive(Clone)]
pub struct FakeBackend {
    store: Shared,
    url: Url,
}

impl FakeBackend {
    /// Seed the store and serve it on an ephemeral port.
    pub async fn spawn() -> Self {
        let store: Shared = Arc::new(Mutex::new(Store::seeded()));
        let router = router(Arc::clone(&store));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Fake backend has no address");
        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("Fake backend stopped");
        });

        let url = Url::parse(&format!("http://{addr}")).expect("Invalid fake backend URL");
        Self { store, url }
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Lifetime of tokens issued from now on.
    pub fn set_token_ttl(&self, secs: i64) {
        lock(&self.store).token_ttl_secs = secs;
    }

    /// Make single-product lookups answer 503.
    pub fn set_catalog_down(&self, down: bool) {
        lock(&self.store).catalog_down = down;
    }

    /// Forget every issued token, as if they had expired server-side.
    pub fn revoke_tokens(&self) {
        lock(&self.store).tokens.clear();
    }

    /// `METHOD /path` of every request received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.store).calls.clone()
    }

    /// Server-side cart of the account with `email`.
    #[must_use]
    pub fn cart_of(&self, email: &str) -> Vec<CartItem> {
        let store = lock(&self.store);
        store
            .accounts
            .iter()
            .find(|account| account.user.email == email)
            .and_then(|account| store.carts.get(&account.user.id))
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        lock(&self.store).orders.clone()
    }

    #[must_use]
    pub fn stock_of(&self, id: &str) -> Option<i64> {
        lock(&self.store)
            .products
            .iter()
            .find(|p| p.id.as_str() == id)
            .map(|p| p.stock_quantity)
    }

    #[must_use]
    pub fn role_of(&self, email: &str) -> Option<Role> {
        lock(&self.store)
            .accounts
            .iter()
            .find(|account| account.user.email == email)
            .map(|account| account.user.role)
    }

    /// Place an order for `email` directly, bypassing the storefront.
    pub fn seed_order(&self, email: &str, product_id: &str, quantity: u32) -> OrderId {
        let mut guard = lock(&self.store);
        let store = &mut *guard;
        let user = store
            .accounts
            .iter()
            .find(|account| account.user.email == email)
            .map(|account| account.user.clone())
            .expect("Unknown account");
        let product = store
            .products
            .iter()
            .find(|p| p.id.as_str() == product_id)
            .cloned()
            .expect("Unknown product");

        let id = OrderId::new(store.next_id());
        let item_id = store.next_id();
        store.orders.push(Order {
            id,
            user_id: Some(user.id),
            total_amount: product.price * quantity,
            status: OrderStatus::Pending,
            shipping_address: Some("1 Engine Rd, London, N1".to_string()),
            phone: None,
            created_at: Some(Timestamp::now()),
            updated_at: None,
            items: vec![OrderItem {
                id: OrderItemId::new(item_id),
                product_id: product.id,
                product_name: product.name,
                product_price: product.price,
                quantity,
            }],
            user: None,
        });
        id
    }
}

async fn record_call(State(store): State<Shared>, request: Request, next: Next) -> Response {
    let call = format!("{} {}", request.method(), request.uri().path());
    lock(&store).calls.push(call);
    next.run(request).await
}

fn router(store: Shared) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/users/profile", put(update_profile))
        .route("/api/products/", get(list_products).post(create_product))
        .route("/api/products/low-stock", get(low_stock))
        .route("/api/products/{id}", get(get_product))
        .route("/api/products/{id}/stock", put(adjust_stock))
        .route("/api/products/{id}/stock/movements", get(stock_movements))
        .route("/api/cart/", get(get_cart))
        .route("/api/cart/add", post(add_to_cart))
        .route("/api/cart/update/{id}", put(update_cart_item))
        .route("/api/cart/remove/{id}", delete(remove_cart_item))
        .route("/api/cart/clear", delete(clear_cart))
        .route("/api/orders/", get(list_orders).post(create_order))
        .route("/api/orders/stats", get(order_stats))
        .route("/api/orders/{id}/status", put(update_order_status))
        .route("/api/admin/stats", get(admin_stats))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/{id}/role", put(update_user_role))
        .layer(from_fn_with_state(Arc::clone(&store), record_call))
        .with_state(store)
}

// =============================================================================
// Auth & profile
// =============================================================================

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn login(State(store): State<Shared>, Json(body): Json<Credentials>) -> Reply {
    let mut store = lock(&store);
    let user = store
        .accounts
        .iter()
        .find(|account| account.user.email == body.email && account.password == body.password)
        .map(|account| account.user.clone())
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Invalid email or password"))?;
    Ok(Json(store.auth_response(user)))
}

#[derive(Deserialize)]
struct Registration {
    username: String,
    email: String,
    password: String,
}

async fn register(State(store): State<Shared>, Json(body): Json<Registration>) -> Reply {
    let mut store = lock(&store);
    if store.accounts.iter().any(|a| a.user.email == body.email) {
        return Err(reject(StatusCode::BAD_REQUEST, "Email already registered"));
    }
    if store.accounts.iter().any(|a| a.user.username == body.username) {
        return Err(reject(StatusCode::BAD_REQUEST, "Username already taken"));
    }
    let id = store.next_id();
    store.add_account(id, &body.username, &body.email, &body.password, Role::Consumer);
    let user = store.accounts.last().map(|a| a.user.clone()).expect("account just added");
    Ok(Json(store.auth_response(user)))
}

#[derive(Deserialize)]
struct ProfileBody {
    username: String,
    email: String,
    current_password: Option<String>,
    new_password: Option<String>,
}

async fn update_profile(State(store): State<Shared>, headers: HeaderMap, Json(body): Json<ProfileBody>) -> Reply {
    let mut store = lock(&store);
    let caller = store.caller(&headers)?;
    if store
        .accounts
        .iter()
        .any(|a| a.user.id != caller.id && a.user.email == body.email)
    {
        return Err(reject(StatusCode::BAD_REQUEST, "Email already registered"));
    }

    let account = store
        .accounts
        .iter_mut()
        .find(|a| a.user.id == caller.id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "User not found"))?;
    if let Some(new_password) = body.new_password {
        if body.current_password.as_deref() != Some(account.password.as_str()) {
            return Err(reject(StatusCode::BAD_REQUEST, "Current password is incorrect"));
        }
        account.password = new_password;
    }
    account.user.username = body.username;
    account.user.email = body.email;
    Ok(Json(json!({ "message": "Profile updated", "user": account.user })))
}

// =============================================================================
// Products & stock
// =============================================================================

async fn list_products(State(store): State<Shared>, Query(query): Query<ListQuery>) -> Reply {
    let store = lock(&store);
    let products: Vec<&Product> = store
        .products
        .iter()
        .filter(|p| !query.active_only || p.is_active)
        .filter(|p| query.category.as_deref().is_none_or(|c| p.category == c))
        .collect();
    Ok(Json(paginate("products", &products, query.page, query.per_page)))
}

async fn get_product(State(store): State<Shared>, Path(id): Path<String>) -> Reply {
    let store = lock(&store);
    if store.catalog_down {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "detail": "Catalog temporarily unavailable" })),
        ));
    }
    store
        .products
        .iter()
        .find(|p| p.id.as_str() == id)
        .map(|product| Json(json!({ "product": product })))
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(json!({ "error": "Product not found" }))))
}

#[derive(Deserialize)]
struct ThresholdQuery {
    #[serde(default = "default_threshold")]
    threshold: i64,
}

const fn default_threshold() -> i64 {
    10
}

async fn low_stock(State(store): State<Shared>, headers: HeaderMap, Query(query): Query<ThresholdQuery>) -> Reply {
    let store = lock(&store);
    store.admin(&headers)?;
    let products: Vec<&Product> = store
        .products
        .iter()
        .filter(|p| p.is_active && p.is_low_stock(query.threshold))
        .collect();
    Ok(Json(json!({
        "products": products,
        "threshold": query.threshold,
        "count": products.len(),
    })))
}

#[derive(Deserialize)]
struct NewProductBody {
    id: String,
    name: String,
    description: String,
    price: Price,
    category: String,
    image_url: String,
    stock_quantity: i64,
    is_active: bool,
}

async fn create_product(State(store): State<Shared>, headers: HeaderMap, Json(body): Json<NewProductBody>) -> Reply {
    let mut store = lock(&store);
    let admin = store.admin(&headers)?;
    if store.products.iter().any(|p| p.id.as_str() == body.id) {
        return Err(reject(StatusCode::BAD_REQUEST, "Product ID already exists"));
    }
    let product = Product {
        id: ProductId::new(body.id),
        name: body.name,
        price: body.price,
        category: body.category,
        description: Some(body.description),
        image_url: Some(body.image_url),
        stock_quantity: body.stock_quantity,
        is_active: body.is_active,
        created_at: Some(Timestamp::now()),
        updated_at: None,
    };
    if product.stock_quantity > 0 {
        store.record_movement(&product.id, product.stock_quantity, "initial_stock", None, Some(admin.id));
    }
    store.products.push(product.clone());
    Ok(Json(json!({ "message": "Product created", "product": product })))
}

#[derive(Deserialize)]
struct StockBody {
    quantity: i64,
    reason: String,
}

async fn adjust_stock(
    State(store): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StockBody>,
) -> Reply {
    let mut store = lock(&store);
    let admin = store.admin(&headers)?;
    let product = store
        .product_mut(&id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Product not found"))?;
    let old_stock = product.stock_quantity;
    let new_stock = old_stock + body.quantity;
    if new_stock < 0 {
        return Err(reject(StatusCode::BAD_REQUEST, "Insufficient stock"));
    }
    product.stock_quantity = new_stock;
    let product_id = product.id.clone();
    store.record_movement(&product_id, body.quantity, &body.reason, None, Some(admin.id));

    Ok(Json(json!({
        "message": "Stock updated successfully",
        "old_stock": old_stock,
        "new_stock": new_stock,
        "change": body.quantity,
    })))
}

async fn stock_movements(
    State(store): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Reply {
    let store = lock(&store);
    store.admin(&headers)?;
    if !store.products.iter().any(|p| p.id.as_str() == id) {
        return Err(reject(StatusCode::NOT_FOUND, "Product not found"));
    }
    let movements: Vec<&StockMovement> = store
        .movements
        .iter()
        .rev()
        .filter(|m| m.product_id.as_str() == id)
        .collect();
    Ok(Json(paginate("movements", &movements, query.page, 20)))
}

// =============================================================================
// Cart
// =============================================================================

fn cart_body(items: &[CartItem]) -> Value {
    let total_items: u32 = items.iter().map(|item| item.quantity).sum();
    let total_amount: Price = items.iter().map(CartItem::line_total).sum();
    json!({ "cart_items": items, "total_items": total_items, "total_amount": total_amount })
}

async fn get_cart(State(store): State<Shared>, headers: HeaderMap) -> Reply {
    let store = lock(&store);
    let user = store.caller(&headers)?;
    let items = store.carts.get(&user.id).cloned().unwrap_or_default();
    Ok(Json(cart_body(&items)))
}

#[derive(Deserialize)]
struct AddBody {
    product_id: String,
    product_name: String,
    product_price: Price,
    quantity: u32,
}

async fn add_to_cart(State(store): State<Shared>, headers: HeaderMap, Json(body): Json<AddBody>) -> Reply {
    let mut guard = lock(&store);
    let store = &mut *guard;
    let user = store.caller(&headers)?;
    let stock = store
        .products
        .iter()
        .find(|p| p.id.as_str() == body.product_id && p.is_active)
        .map(|p| p.stock_quantity)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Product not found"))?;

    let item_id = store.next_id();
    let cart = store.carts.entry(user.id).or_default();
    let in_cart = cart
        .iter()
        .find(|item| item.product_id.as_str() == body.product_id)
        .map_or(0, |item| item.quantity);
    if i64::from(in_cart + body.quantity) > stock {
        return Err(reject(StatusCode::BAD_REQUEST, "Not enough stock available"));
    }

    if let Some(item) = cart
        .iter_mut()
        .find(|item| item.product_id.as_str() == body.product_id)
    {
        item.quantity += body.quantity;
    } else {
        cart.push(CartItem {
            id: CartItemId::new(item_id),
            product_id: ProductId::new(body.product_id),
            product_name: body.product_name,
            product_price: body.product_price,
            quantity: body.quantity,
            added_at: Some(Timestamp::now()),
            user_id: Some(user.id),
        });
    }
    Ok(Json(json!({ "message": "Item added to cart" })))
}

#[derive(Deserialize)]
struct QuantityBody {
    quantity: u32,
}

async fn update_cart_item(
    State(store): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<QuantityBody>,
) -> Reply {
    let mut store = lock(&store);
    let user = store.caller(&headers)?;
    if body.quantity == 0 {
        return Err(reject(StatusCode::BAD_REQUEST, "Quantity must be greater than 0"));
    }
    let item = store
        .carts
        .get_mut(&user.id)
        .and_then(|cart| cart.iter_mut().find(|item| item.id.as_i64() == id))
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Cart item not found"))?;
    item.quantity = body.quantity;
    Ok(Json(json!({ "message": "Cart item updated successfully" })))
}

async fn remove_cart_item(State(store): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    let mut store = lock(&store);
    let user = store.caller(&headers)?;
    let cart = store.carts.entry(user.id).or_default();
    let before = cart.len();
    cart.retain(|item| item.id.as_i64() != id);
    if cart.len() == before {
        return Err(reject(StatusCode::NOT_FOUND, "Cart item not found"));
    }
    Ok(Json(json!({ "message": "Item removed from cart" })))
}

async fn clear_cart(State(store): State<Shared>, headers: HeaderMap) -> Reply {
    let mut store = lock(&store);
    let user = store.caller(&headers)?;
    store.carts.remove(&user.id);
    Ok(Json(json!({ "message": "Cart cleared" })))
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Deserialize)]
struct NewOrderBody {
    shipping_address: Option<String>,
    phone: Option<String>,
}

async fn create_order(State(store): State<Shared>, headers: HeaderMap, Json(body): Json<NewOrderBody>) -> Reply {
    let mut guard = lock(&store);
    let store = &mut *guard;
    let user = store.caller(&headers)?;
    let items = store.carts.get(&user.id).cloned().unwrap_or_default();
    if items.is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "Cart is empty"));
    }
    for item in &items {
        let available = store
            .products
            .iter()
            .find(|p| p.id == item.product_id)
            .map_or(0, |p| p.stock_quantity);
        if available < i64::from(item.quantity) {
            let message = format!("Insufficient stock for {}", item.product_name);
            return Err(reject(StatusCode::BAD_REQUEST, &message));
        }
    }

    let id = OrderId::new(store.next_id());
    let mut order_items = Vec::new();
    for item in &items {
        if let Some(product) = store.product_mut(item.product_id.as_str()) {
            product.stock_quantity -= i64::from(item.quantity);
        }
        store.record_movement(
            &item.product_id,
            -i64::from(item.quantity),
            "sale",
            Some(format!("order_{id}")),
            Some(user.id),
        );
        order_items.push(OrderItem {
            id: OrderItemId::new(store.next_id()),
            product_id: item.product_id.clone(),
            product_name: item.product_name.clone(),
            product_price: item.product_price,
            quantity: item.quantity,
        });
    }

    let order = Order {
        id,
        user_id: Some(user.id),
        total_amount: items.iter().map(CartItem::line_total).sum(),
        status: OrderStatus::Pending,
        shipping_address: body.shipping_address,
        phone: body.phone,
        created_at: Some(Timestamp::now()),
        updated_at: None,
        items: order_items,
        user: None,
    };
    store.orders.push(order.clone());
    store.carts.remove(&user.id);
    Ok(Json(json!(order)))
}

async fn list_orders(State(store): State<Shared>, headers: HeaderMap, Query(query): Query<ListQuery>) -> Reply {
    let store = lock(&store);
    let caller = store.caller(&headers)?;
    let status = query.status.as_deref().and_then(|s| s.parse::<OrderStatus>().ok());

    let orders: Vec<Order> = store
        .orders
        .iter()
        .rev()
        .filter(|order| caller.is_admin() || order.user_id == Some(caller.id))
        .filter(|order| status.is_none_or(|status| order.status == status))
        .map(|order| {
            let mut order = order.clone();
            if caller.is_admin() {
                order.user = order.user_id.and_then(|id| store.user(id)).map(|user| OrderUserSummary {
                    id: Some(user.id),
                    username: user.username.clone(),
                    email: user.email.clone(),
                });
            }
            order
        })
        .collect();
    Ok(Json(paginate("orders", &orders, query.page, query.per_page)))
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
}

async fn update_order_status(
    State(store): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> Reply {
    let mut store = lock(&store);
    store.admin(&headers)?;
    let status = body
        .status
        .parse::<OrderStatus>()
        .map_err(|_| reject(StatusCode::BAD_REQUEST, "Invalid status"))?;
    let order = store
        .orders
        .iter_mut()
        .find(|order| order.id.as_i64() == id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Order not found"))?;
    order.status = status;
    order.updated_at = Some(Timestamp::now());
    Ok(Json(json!({ "message": "Order status updated successfully" })))
}

async fn order_stats(State(store): State<Shared>, headers: HeaderMap) -> Reply {
    let store = lock(&store);
    store.admin(&headers)?;
    let mut status_counts: HashMap<&str, u64> = HashMap::new();
    for order in &store.orders {
        *status_counts.entry(order.status.as_str()).or_default() += 1;
    }
    let revenue = |keep: fn(&OrderStatus) -> bool| -> Price {
        store
            .orders
            .iter()
            .filter(|order| keep(&order.status))
            .map(|order| order.total_amount)
            .sum()
    };
    let recent: Vec<&Order> = store.orders.iter().rev().take(5).collect();
    Ok(Json(json!({
        "status_counts": status_counts,
        "total_revenue": revenue(OrderStatus::is_revenue),
        "pending_revenue": revenue(|status| *status == OrderStatus::Pending),
        "recent_orders": recent,
    })))
}

// =============================================================================
// Admin
// =============================================================================

async fn admin_stats(State(store): State<Shared>, headers: HeaderMap) -> Reply {
    let store = lock(&store);
    store.admin(&headers)?;
    let total_revenue: Price = store
        .orders
        .iter()
        .filter(|order| order.status.is_revenue())
        .map(|order| order.total_amount)
        .sum();
    Ok(Json(json!({
        "total_users": store.accounts.len(),
        "total_orders": store.orders.len(),
        "pending_orders": store.orders.iter().filter(|o| o.status == OrderStatus::Pending).count(),
        "total_revenue": total_revenue,
    })))
}

async fn list_users(State(store): State<Shared>, headers: HeaderMap, Query(query): Query<ListQuery>) -> Reply {
    let store = lock(&store);
    store.admin(&headers)?;
    let users: Vec<&User> = store.accounts.iter().map(|account| &account.user).collect();
    Ok(Json(paginate("users", &users, query.page, query.per_page)))
}

#[derive(Deserialize)]
struct RoleBody {
    role: String,
}

async fn update_user_role(
    State(store): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<RoleBody>,
) -> Reply {
    let mut store = lock(&store);
    store.admin(&headers)?;
    let role = body
        .role
        .parse::<Role>()
        .map_err(|_| reject(StatusCode::BAD_REQUEST, "Invalid role. Must be 'admin' or 'consumer'"))?;
    let account = store
        .accounts
        .iter_mut()
        .find(|account| account.user.id.as_i64() == id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "User not found"))?;
    account.user.role = role;
    Ok(Json(json!({ "message": "User role updated successfully" })))
}
