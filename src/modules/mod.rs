pub mod auth;
pub mod authors;
pub mod books;
pub mod lending;

use std::sync::Arc;

use libris_identity::{PasswordHasher, TokenHandler};
use libris_kernel::settings::Settings;
use libris_kernel::ModuleRegistry;
use libris_store::MemoryStore;

/// Shared collaborators handed to every module at construction time.
#[derive(Clone)]
pub struct AppDeps {
    pub store: Arc<MemoryStore>,
    pub tokens: Arc<TokenHandler>,
    pub passwords: Arc<PasswordHasher>,
}

impl AppDeps {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            tokens: Arc::new(TokenHandler::new(
                settings.auth.token_secret.as_bytes(),
                settings.auth.token_expiry_hours,
            )),
            passwords: Arc::new(PasswordHasher::new()),
        }
    }
}

/// Register all application modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, deps: &AppDeps) {
    registry.register(auth::create_module(deps));
    registry.register(authors::create_module(deps));
    registry.register(books::create_module(deps));
    registry.register(lending::create_module(deps));
}
