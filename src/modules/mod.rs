pub mod books;

use std::sync::Arc;

use bookshelf_kernel::settings::BooksSettings;
use bookshelf_kernel::ModuleRegistry;

use books::store::BookStore;

/// Register all feature modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, store: Arc<dyn BookStore>, books: &BooksSettings) {
    registry.register_custom(books::create_module(store, books));
}
