//! # CLI Module
//!
//! Command-line front end for checking schema documents and replaying recorded
//! requests through the binder.
//!
//! ## Commands
//!
//! ### `check`
//!
//! Load a schema document and report every construction issue:
//!
//! ```bash
//! brrtbind check --schema models.yaml
//! ```
//!
//! Exits with status 1 when the document does not build.
//!
//! ### `bind`
//!
//! Bind a recorded request against one model and print the bound object, or the full
//! validation error list:
//!
//! ```bash
//! brrtbind bind --schema models.yaml --model CreateItem --request fixture.json
//! ```
//!
//! A fixture is a JSON object:
//!
//! ```json
//! {
//!   "method": "POST",
//!   "target": "/items/7?q=a&q=b",
//!   "path_params": { "item_id": "7" },
//!   "headers": [["content-type", "application/json"], ["x-token", "secret"]],
//!   "body": { "name": "Foo", "price": 50.2 }
//! }
//! ```
//!
//! `body` is sent as JSON; `body_text` sends a raw string instead (for form bodies).
//! `--set-only` prints only the explicitly supplied fields.

mod commands;


pub use commands::{run, run_cli, Cli, Commands, RequestFixture};
