//! # Playerwatch Gateway
//!
//! HTTP trigger for pipeline runs.
//!
//! | Method | Path          | Result                                   |
//! |--------|---------------|------------------------------------------|
//! | GET    | `/health`     | `{"status":"ok", ...}`                   |
//! | POST   | `/api/v1/run` | `RunResponse` JSON, status = `statusCode` |

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
