/*!
# Product Catalog Admin

A small single-administrator back office for a product catalog, built in Rust.

## Overview

The catalog itself lives in an ordinary xlsx spreadsheet, so the people who
own the data can keep opening it in Excel while this service edits it. The
server loads the spreadsheet into memory on startup, serves it over a JSON
API, and rewrites the file after every change. A bundled front-end (plain
HTML/JS served statically) drives the API.

There is exactly one account: the administrator configured through the
environment. Logging in yields a signed token, delivered both as an
http-only cookie and in the response body, and every mutating route checks
it.

## Modules

- **product**: Product model and the create/patch payloads
- **store**: The xlsx persistence layer (column mapping, atomic rewrite)
- **registry**: In-memory catalog with validation and write-through saves
- **login**: Password hashing, token issue/verify, the auth middleware
- **app**: Routing, CORS and the static front-end fallback
- **config**: Environment-driven configuration
- **error**: Error taxonomy and its mapping onto HTTP statuses

## REST API Endpoints

- `POST /api/login` - Exchange credentials for a session token
- `GET /api/check-auth` - Report the authenticated username
- `GET /api/products` - List the catalog (public unless `PROTECT_LISTING`)
- `POST /api/products` - Create a product (auth)
- `PUT /api/products/{barcode}` - Patch a product (auth)
- `DELETE /api/products/{barcode}` - Remove a product (auth)

Anything else falls through to the static front-end, with unknown paths
rewritten to `index.html` so client-side routing works.

## Batch Import

The `import-products` binary seeds the catalog from a supplier export whose
columns sit at different offsets than the catalog's own layout.
*/

// Re-export all modules so they appear in the documentation
pub mod app;
pub mod config;
pub mod error;
pub mod login;
pub mod product;
pub mod registry;
pub mod store;

/// Re-export the core types to make them easier to use
pub use error::{AppError, StoreError};
pub use product::{NewProduct, Product, ProductPatch};
pub use registry::ProductRegistry;
pub use store::SpreadsheetStore;
