use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::catalog::{InMemoryCatalog, ProductCatalog};
use crate::config::CartConfig;
use crate::errors::CartError;
use crate::events::{Event, EventSender};
use crate::gateway::CartGateway;
use crate::models::{Cart, CartStatus};
use crate::notifications::{InMemoryNotifier, Notification, Notifier};
use crate::storage::{generate_guest_id, CartStore, FileStore, MemoryStore};

/// Authentication state of the session, as reported by the (external)
/// auth service. The reconciler never refreshes tokens or validates
/// credentials itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    Guest,
    Authenticated { user_id: String },
}

/// Per-operation pending flags, readable without touching the cart
/// lock. UI layers use these to disable the matching affordance while
/// an operation of that class is in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperationFlags {
    pub adding: bool,
    pub removing: bool,
    pub updating: bool,
    pub clearing: bool,
}

#[derive(Default)]
struct Flags {
    adding: AtomicBool,
    removing: AtomicBool,
    updating: AtomicBool,
    clearing: AtomicBool,
}

/// Clears its flag when the operation completes, whichever way it ends.
struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct SessionState {
    cart: Cart,
    authenticated: bool,
}

/// Single source of truth for the cart during a session.
///
/// The `CartReconciler` mediates between guest-local and
/// authenticated-remote modes:
/// - guest mutations resolve against the product catalog, mutate the
///   in-memory cart, and recompute the cached totals from the item
///   sequence before persisting;
/// - authenticated mutations go to the remote gateway and the server's
///   returned cart replaces local state verbatim.
///
/// Mutations are serialized through one internal lock per session, so a
/// later operation can never read a stale pre-mutation snapshot and a
/// slow earlier response can never overwrite a faster later one. A
/// failed mutation leaves the prior cart (and its persisted snapshot)
/// untouched, logs the cause, and surfaces a kind-distinguishing user
/// notification.
///
/// # Examples
///
/// ```ignore
/// let reconciler = CartReconciler::builder(config)
///     .gateway(gateway)
///     .catalog(catalog)
///     .build()?;
///
/// reconciler.initialize(AuthState::Guest).await?;
/// let cart = reconciler.add_to_cart("prod-42", 2).await?;
/// assert_eq!(cart.total_items, 2);
/// ```
pub struct CartReconciler {
    state: Mutex<SessionState>,
    /// Bumped on logout; remote responses issued under an older epoch
    /// are discarded instead of applied to the new guest session.
    epoch: AtomicU64,
    gateway: Arc<dyn CartGateway>,
    store: Arc<dyn CartStore>,
    catalog: Arc<dyn ProductCatalog>,
    notifier: Arc<dyn Notifier>,
    events: Option<EventSender>,
    flags: Flags,
    guest_token_len: usize,
}

impl CartReconciler {
    pub fn builder(config: CartConfig) -> CartReconcilerBuilder {
        CartReconcilerBuilder::new(config)
    }

    /// Cold start for a session.
    ///
    /// - stored cart + guest session: the stored cart is adopted as-is;
    /// - stored or missing cart + authenticated session: the server
    ///   cart is fetched and adopted; on failure the session falls back
    ///   to a usable empty cart and the user is notified;
    /// - nothing stored + guest session: a fresh guest cart is created
    ///   and persisted, reusing the stored guest identity when present.
    #[instrument(skip(self))]
    pub async fn initialize(&self, auth: AuthState) -> Result<Cart, CartError> {
        let mut state = self.state.lock().await;
        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "failed to read stored cart; cold-starting");
                None
            }
        };

        match auth {
            AuthState::Guest => {
                state.authenticated = false;
                match stored {
                    Some(cart) => {
                        info!(cart_id = %cart.id, items = cart.items.len(), "restored stored cart");
                        state.cart = cart;
                    }
                    None => {
                        let guest_id = self.guest_identity();
                        state.cart = Cart::guest(guest_id.as_str());
                        self.persist(&state.cart);
                        info!(cart_id = %guest_id, "created new guest cart");
                        self.emit(Event::CartCreated(guest_id)).await;
                    }
                }
            }
            AuthState::Authenticated { user_id } => {
                state.authenticated = true;
                match self.gateway.get_cart().await {
                    Ok(cart) => {
                        info!(cart_id = %cart.id, items = cart.items.len(), "fetched server cart");
                        self.apply_remote(&mut state, cart);
                        self.emit(Event::CartReplaced(state.cart.id.clone())).await;
                    }
                    Err(e) => {
                        let err = CartError::from(e);
                        error!(error = %err, "failed to fetch server cart on startup");
                        self.notifier.notify(Notification::failure(
                            err.notification_kind(),
                            "We couldn't load your cart. Please try again.",
                        ));
                        // Empty model keeps the UI alive until a retry.
                        let mut cart = Cart::guest(format!("pending_{}", user_id));
                        cart.user_id = user_id;
                        state.cart = cart;
                    }
                }
            }
        }

        self.emit(Event::SessionStarted {
            cart_id: state.cart.id.clone(),
            authenticated: state.authenticated,
        })
        .await;
        Ok(state.cart.clone())
    }

    /// Adds one unit of `product_id` to the cart.
    pub async fn add(&self, product_id: &str) -> Result<Cart, CartError> {
        self.add_to_cart(product_id, 1).await
    }

    /// Adds `quantity` of `product_id` to the cart.
    ///
    /// Guest mode resolves the product against the catalog, bumps the
    /// existing line or appends a new one, recomputes totals, and
    /// persists. Authenticated mode sends the mutation to the gateway
    /// and adopts the server's cart verbatim.
    ///
    /// # Returns
    ///
    /// * `Ok(Cart)` - the post-mutation cart snapshot
    /// * `Err(CartError::ProductNotFound)` - unknown product id
    /// * `Err(CartError::InvalidQuantity)` - zero or rejected quantity
    /// * `Err(CartError)` - gateway failure; cart unchanged
    #[instrument(skip(self))]
    pub async fn add_to_cart(&self, product_id: &str, quantity: u32) -> Result<Cart, CartError> {
        if product_id.is_empty() {
            return self.failed(
                CartError::InvalidOperation("product id must not be empty".to_string()),
                "add_to_cart",
            );
        }
        if quantity == 0 {
            return self.failed(
                CartError::InvalidQuantity("quantity must be at least 1".to_string()),
                "add_to_cart",
            );
        }

        let _pending = FlagGuard::raise(&self.flags.adding);
        let epoch = self.epoch.load(Ordering::SeqCst);
        let mut state = self.state.lock().await;

        if state.authenticated {
            match self.gateway.add_to_cart(product_id, quantity).await {
                Ok(cart) => {
                    if self.session_ended(epoch) {
                        return self.discarded("add_to_cart");
                    }
                    let was_present = state.cart.item(product_id).is_some();
                    self.apply_remote(&mut state, cart);
                    let name = self.line_name(&state.cart, product_id);
                    let message = if was_present {
                        format!("Updated {} quantity in your cart", name)
                    } else {
                        format!("Added {} to your cart", name)
                    };
                    self.notifier.notify(Notification::success(message));
                    self.emit(Event::CartItemAdded {
                        cart_id: state.cart.id.clone(),
                        product_id: product_id.to_string(),
                        quantity,
                    })
                    .await;
                    info!(product_id, quantity, "added item via gateway");
                    Ok(state.cart.clone())
                }
                Err(e) => self.failed(e.into(), "add_to_cart"),
            }
        } else {
            let Some(product) = self.catalog.product_by_id(product_id) else {
                return self.failed(
                    CartError::ProductNotFound(product_id.to_string()),
                    "add_to_cart",
                );
            };
            let name = product.name.clone();
            let new_line = state.cart.upsert_item(product, quantity);
            self.persist(&state.cart);
            let message = if new_line {
                format!("Added {} to your cart", name)
            } else {
                format!("Updated {} quantity in your cart", name)
            };
            self.notifier.notify(Notification::success(message));
            self.emit(Event::CartItemAdded {
                cart_id: state.cart.id.clone(),
                product_id: product_id.to_string(),
                quantity,
            })
            .await;
            info!(product_id, quantity, new_line, "added item locally");
            Ok(state.cart.clone())
        }
    }

    /// Removes the line for `product_id` from the cart.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, product_id: &str) -> Result<Cart, CartError> {
        if product_id.is_empty() {
            return self.failed(
                CartError::InvalidOperation("product id must not be empty".to_string()),
                "remove_item",
            );
        }

        let _pending = FlagGuard::raise(&self.flags.removing);
        let epoch = self.epoch.load(Ordering::SeqCst);
        let mut state = self.state.lock().await;
        let name = self.line_name(&state.cart, product_id);

        if state.authenticated {
            match self.gateway.remove_from_cart(product_id).await {
                Ok(cart) => {
                    if self.session_ended(epoch) {
                        return self.discarded("remove_item");
                    }
                    self.apply_remote(&mut state, cart);
                    self.notify_removed(&name);
                    self.emit(Event::CartItemRemoved {
                        cart_id: state.cart.id.clone(),
                        product_id: product_id.to_string(),
                    })
                    .await;
                    Ok(state.cart.clone())
                }
                Err(e) => self.failed(e.into(), "remove_item"),
            }
        } else {
            if !state.cart.remove_item(product_id) {
                return self.failed(
                    CartError::ProductNotFound(product_id.to_string()),
                    "remove_item",
                );
            }
            self.persist(&state.cart);
            self.notify_removed(&name);
            self.emit(Event::CartItemRemoved {
                cart_id: state.cart.id.clone(),
                product_id: product_id.to_string(),
            })
            .await;
            Ok(state.cart.clone())
        }
    }

    /// Sets the quantity of the line for `product_id`.
    ///
    /// A quantity of zero removes the line, in both modes.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        product_id: &str,
        quantity: u32,
    ) -> Result<Cart, CartError> {
        if product_id.is_empty() {
            return self.failed(
                CartError::InvalidOperation("product id must not be empty".to_string()),
                "update_quantity",
            );
        }

        let _pending = FlagGuard::raise(&self.flags.updating);
        let epoch = self.epoch.load(Ordering::SeqCst);
        let mut state = self.state.lock().await;
        let name = self.line_name(&state.cart, product_id);

        if state.authenticated {
            let result = if quantity == 0 {
                self.gateway.remove_from_cart(product_id).await
            } else {
                self.gateway.update_quantity(product_id, quantity).await
            };
            match result {
                Ok(cart) => {
                    if self.session_ended(epoch) {
                        return self.discarded("update_quantity");
                    }
                    self.apply_remote(&mut state, cart);
                    self.notify_quantity(&name, quantity);
                    self.emit_quantity_event(&state.cart.id, product_id, quantity)
                        .await;
                    Ok(state.cart.clone())
                }
                Err(e) => self.failed(e.into(), "update_quantity"),
            }
        } else {
            if !state.cart.set_quantity(product_id, quantity) {
                return self.failed(
                    CartError::ProductNotFound(product_id.to_string()),
                    "update_quantity",
                );
            }
            self.persist(&state.cart);
            self.notify_quantity(&name, quantity);
            self.emit_quantity_event(&state.cart.id, product_id, quantity)
                .await;
            Ok(state.cart.clone())
        }
    }

    /// Empties the cart. Idempotent: clearing an already-empty cart
    /// succeeds and reports the same empty result.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<Cart, CartError> {
        let _pending = FlagGuard::raise(&self.flags.clearing);
        let epoch = self.epoch.load(Ordering::SeqCst);
        let mut state = self.state.lock().await;

        if state.authenticated {
            match self.gateway.clear_cart().await {
                Ok(mut cart) => {
                    if self.session_ended(epoch) {
                        return self.discarded("clear_cart");
                    }
                    // Stale cached totals on an empty cart are never
                    // acceptable, whatever the server sent.
                    if cart.items.is_empty() {
                        cart.recompute_totals();
                    }
                    self.apply_remote(&mut state, cart);
                    self.notify_cleared();
                    self.emit(Event::CartCleared(state.cart.id.clone())).await;
                    Ok(state.cart.clone())
                }
                Err(e) => self.failed(e.into(), "clear_cart"),
            }
        } else {
            state.cart.clear_items();
            self.persist(&state.cart);
            self.notify_cleared();
            self.emit(Event::CartCleared(state.cart.id.clone())).await;
            Ok(state.cart.clone())
        }
    }

    /// Transitions the session from guest to authenticated.
    ///
    /// The server cart is fetched and the guest cart's lines are merged
    /// into it by replaying each through the gateway (quantity-sum
    /// semantics: a product present on both sides ends up with the sum
    /// of both quantities). Lines that fail to replay are reported and
    /// skipped; the login itself still completes. On fetch failure the
    /// session stays guest and the guest cart is kept.
    #[instrument(skip(self))]
    pub async fn login(&self, user_id: &str) -> Result<Cart, CartError> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if state.authenticated {
            return self.failed(
                CartError::InvalidOperation("session is already authenticated".to_string()),
                "login",
            );
        }

        let guest_cart_id = state.cart.id.clone();
        let guest_items = state.cart.items.clone();

        let mut server_cart = match self.gateway.get_cart().await {
            Ok(cart) => cart,
            Err(e) => return self.failed(e.into(), "login"),
        };

        let mut migrated = 0usize;
        for item in &guest_items {
            match self
                .gateway
                .add_to_cart(&item.product_id, item.quantity)
                .await
            {
                Ok(cart) => {
                    server_cart = cart;
                    migrated += 1;
                }
                Err(e) => {
                    let err = CartError::from(e);
                    warn!(product_id = %item.product_id, error = %err, "failed to migrate guest line");
                    self.notifier.notify(Notification::failure(
                        err.notification_kind(),
                        format!("Couldn't move {} into your account cart", item.product.name),
                    ));
                }
            }
        }

        if self.session_ended(epoch) {
            return self.discarded("login");
        }

        state.authenticated = true;
        if server_cart.user_id.is_empty() {
            server_cart.user_id = user_id.to_string();
        }
        state.cart = server_cart;
        self.persist(&state.cart);

        self.emit(Event::GuestCartMigrated {
            guest_cart_id,
            user_cart_id: state.cart.id.clone(),
            migrated_lines: migrated,
        })
        .await;
        let message = if migrated > 0 {
            format!("Signed in. Moved {} item(s) into your cart", migrated)
        } else {
            "Signed in".to_string()
        };
        self.notifier.notify(Notification::success(message));
        info!(user_id, migrated, "guest session promoted");
        Ok(state.cart.clone())
    }

    /// Ends the authenticated session: any still-pending remote
    /// response is invalidated, local storage is wiped, and a fresh
    /// guest cart takes over. The server copy's lifecycle belongs to
    /// the remote service.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<Cart, CartError> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;

        self.emit(Event::SessionEnded {
            cart_id: state.cart.id.clone(),
        })
        .await;

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear stored cart on logout");
        }

        let guest_id = generate_guest_id(self.guest_token_len);
        if let Err(e) = self.store.save_guest_id(&guest_id) {
            warn!(error = %e, "failed to persist guest identity");
        }
        state.cart = Cart::guest(guest_id.as_str());
        state.authenticated = false;
        self.persist(&state.cart);

        info!(cart_id = %guest_id, "session ended, new guest cart installed");
        self.emit(Event::CartCreated(guest_id)).await;
        Ok(state.cart.clone())
    }

    /// Current cart snapshot.
    pub async fn snapshot(&self) -> Cart {
        self.state.lock().await.cart.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.authenticated
    }

    /// Current per-operation pending flags.
    pub fn flags(&self) -> OperationFlags {
        OperationFlags {
            adding: self.flags.adding.load(Ordering::SeqCst),
            removing: self.flags.removing.load(Ordering::SeqCst),
            updating: self.flags.updating.load(Ordering::SeqCst),
            clearing: self.flags.clearing.load(Ordering::SeqCst),
        }
    }

    fn guest_identity(&self) -> String {
        match self.store.load_guest_id() {
            Ok(Some(id)) => id,
            Ok(None) => {
                let id = generate_guest_id(self.guest_token_len);
                if let Err(e) = self.store.save_guest_id(&id) {
                    warn!(error = %e, "failed to persist guest identity");
                }
                id
            }
            Err(e) => {
                warn!(error = %e, "failed to read guest identity; generating ephemeral one");
                generate_guest_id(self.guest_token_len)
            }
        }
    }

    /// Server responses are authoritative: applied verbatim, then
    /// written through to storage.
    fn apply_remote(&self, state: &mut SessionState, cart: Cart) {
        state.cart = cart;
        if state.cart.status != CartStatus::Active {
            warn!(cart_id = %state.cart.id, status = ?state.cart.status, "adopted non-active cart");
        }
        self.persist(&state.cart);
    }

    fn persist(&self, cart: &Cart) {
        if let Err(e) = self.store.save(Some(cart)) {
            warn!(error = %e, "failed to persist cart; in-memory state remains authoritative");
        }
    }

    fn session_ended(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) != epoch
    }

    fn discarded<T>(&self, operation: &str) -> Result<T, CartError> {
        info!(operation, "discarding remote response issued before logout");
        Err(CartError::InvalidOperation(
            "session ended before the operation completed".to_string(),
        ))
    }

    fn failed<T>(&self, err: CartError, operation: &str) -> Result<T, CartError> {
        error!(error = %err, operation, "cart operation failed");
        self.notifier
            .notify(Notification::failure(err.notification_kind(), user_message(&err)));
        Err(err)
    }

    fn line_name(&self, cart: &Cart, product_id: &str) -> String {
        cart.item(product_id)
            .map(|i| i.product.name.clone())
            .unwrap_or_else(|| product_id.to_string())
    }

    fn notify_removed(&self, name: &str) {
        self.notifier
            .notify(Notification::success(format!("Removed {} from your cart", name)));
    }

    fn notify_quantity(&self, name: &str, quantity: u32) {
        let message = if quantity == 0 {
            format!("Removed {} from your cart", name)
        } else {
            format!("Set {} quantity to {}", name, quantity)
        };
        self.notifier.notify(Notification::success(message));
    }

    fn notify_cleared(&self) {
        self.notifier
            .notify(Notification::success("Your cart is now empty"));
    }

    async fn emit_quantity_event(&self, cart_id: &str, product_id: &str, quantity: u32) {
        let event = if quantity == 0 {
            Event::CartItemRemoved {
                cart_id: cart_id.to_string(),
                product_id: product_id.to_string(),
            }
        } else {
            Event::CartItemUpdated {
                cart_id: cart_id.to_string(),
                product_id: product_id.to_string(),
                quantity,
            }
        };
        self.emit(event).await;
    }

    async fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.send_or_log(event).await;
        }
    }
}

fn user_message(err: &CartError) -> String {
    match err {
        CartError::ProductNotFound(id) => format!("Product {} is not available", id),
        CartError::InvalidQuantity(msg) => format!("Invalid quantity: {}", msg),
        CartError::Unauthorized(_) => "Please sign in again to update your cart".to_string(),
        _ => "Something went wrong updating your cart. Please try again.".to_string(),
    }
}

/// Builder for `CartReconciler`. The gateway is required; the store
/// defaults to the configured directory (or memory when none is set),
/// the catalog to an empty one, and the notifier to an in-memory
/// buffer.
pub struct CartReconcilerBuilder {
    config: CartConfig,
    gateway: Option<Arc<dyn CartGateway>>,
    store: Option<Arc<dyn CartStore>>,
    catalog: Option<Arc<dyn ProductCatalog>>,
    notifier: Option<Arc<dyn Notifier>>,
    events: Option<EventSender>,
}

impl CartReconcilerBuilder {
    pub fn new(config: CartConfig) -> Self {
        Self {
            config,
            gateway: None,
            store: None,
            catalog: None,
            notifier: None,
            events: None,
        }
    }

    pub fn gateway(mut self, gateway: Arc<dyn CartGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn store(mut self, store: Arc<dyn CartStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn ProductCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Result<CartReconciler, CartError> {
        let gateway = self
            .gateway
            .ok_or_else(|| CartError::Config("a cart gateway is required".to_string()))?;

        let store: Arc<dyn CartStore> = match self.store {
            Some(store) => store,
            None => match &self.config.storage_dir {
                Some(dir) => Arc::new(FileStore::open(dir)?),
                None => Arc::new(MemoryStore::new()),
            },
        };

        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(InMemoryCatalog::new()));
        let notifier = self.notifier.unwrap_or_else(|| {
            Arc::new(InMemoryNotifier::new(self.config.notification_capacity as usize))
        });

        Ok(CartReconciler {
            state: Mutex::new(SessionState {
                cart: Cart::guest(generate_guest_id(self.config.guest_token_len as usize)),
                authenticated: false,
            }),
            epoch: AtomicU64::new(0),
            gateway,
            store,
            catalog,
            notifier,
            events: self.events,
            flags: Flags::default(),
            guest_token_len: self.config.guest_token_len as usize,
        })
    }
}
