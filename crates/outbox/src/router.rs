use std::collections::HashMap;

/// Routing key used for event types with no explicit route.
pub const DEFAULT_ROUTING_KEY: &str = "order.events";

/// Maps an event type name to the broker routing key it is published on.
///
/// Unknown event types fall back to a default key instead of failing, so a
/// newly added event is still delivered before it gets its own route.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    routes: HashMap<String, String>,
    default_key: String,
}

impl MessageRouter {
    /// Creates a router with no explicit routes and the given fallback key.
    pub fn new(default_key: impl Into<String>) -> Self {
        Self {
            routes: HashMap::new(),
            default_key: default_key.into(),
        }
    }

    /// Builds a router from `(event_type, routing_key)` pairs.
    pub fn from_routes<I, E, K>(routes: I) -> Self
    where
        I: IntoIterator<Item = (E, K)>,
        E: Into<String>,
        K: Into<String>,
    {
        routes
            .into_iter()
            .fold(Self::default(), |router, (event_type, key)| {
                router.route(event_type, key)
            })
    }

    /// Adds or replaces the route for one event type.
    pub fn route(mut self, event_type: impl Into<String>, routing_key: impl Into<String>) -> Self {
        self.routes.insert(event_type.into(), routing_key.into());
        self
    }

    /// Replaces the fallback key.
    pub fn with_default(mut self, default_key: impl Into<String>) -> Self {
        self.default_key = default_key.into();
        self
    }

    /// Resolves the routing key for an event type.
    pub fn resolve(&self, event_type: &str) -> &str {
        self.routes
            .get(event_type)
            .map(String::as_str)
            .unwrap_or(&self.default_key)
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    pub fn is_routed(&self, event_type: &str) -> bool {
        self.routes.contains_key(event_type)
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTING_KEY)
    }
}
