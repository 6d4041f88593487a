//! Server Module
//!
//! Initialization and configuration of the Axum HTTP server.
//!
//! - **`state`** - `AppState` and `FromRef` implementations
//! - **`config`** - layered configuration loading (defaults, file, env)
//! - **`init`** - app creation
//!
//! # Initialization Flow
//!
//! 1. **Configuration Loading**: `config::load_config`
//! 2. **State Creation**: item store and telemetry service
//! 3. **Router Creation**: routes and middleware
//!
//! # Example
//!
//! ```rust,no_run
//! use itemtrail::backend::server::{config::load_config, create_app};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (app, telemetry) = create_app(load_config())?;
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! telemetry.shutdown().await;
//! # Ok(())
//! # }
//! ```

/// Application state management
pub mod state;

/// Server configuration loading
pub mod config;

/// Server initialization
pub mod init;

pub use init::create_app;
pub use state::AppState;
