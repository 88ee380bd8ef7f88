//! Category service.
//!
//! Owns the list of product categories and serves it over HTTP:
//!
//! | Method | Path                   | Body / Response                  |
//! |--------|------------------------|----------------------------------|
//! | GET    | `/api/categories`      | `[{"id": 1, "name": "Books"}]`   |
//! | POST   | `/api/categories`      | `{"name": "Books"}` → created    |
//! | GET    | `/api/categories/:id`  | one category, 404 if unknown     |
//! | GET    | `/health/live`         | liveness probe                   |

pub mod config;
pub mod model;
pub mod repository;
pub mod routes;

pub use config::Settings;
pub use model::{Category, NewCategory};
pub use repository::{CategoryRepository, RepositoryError};
pub use routes::router;
