//! Mailer Domain
//!
//! Templates, recipients, SMTP profiles and scheduled sends, plus the
//! dispatcher that renders and delivers them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐     ┌──────────────────────────────┐
//! │   Service   │     │ Dispatcher                   │
//! │ (CRUD)      │     │  recipients → templates →    │
//! │             │     │  transport → email log       │
//! └──────┬──────┘     └──────┬───────────────────────┘
//!        │                   │
//! ┌──────▼───────────────────▼──┐
//! │ Repository (MailerStore)    │  ← trait + in-memory/Postgres
//! └──────┬──────────────────────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Entities, DTOs, enums
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use domain_mailer::{
//!     Dispatcher, FailurePolicy, InMemoryMailerStore, MailerService, SmtpTransportFactory,
//!     handlers,
//! };
//!
//! let store = Arc::new(InMemoryMailerStore::new());
//! let service = MailerService::new(store.clone());
//! let dispatcher = Dispatcher::new(
//!     store,
//!     Arc::new(SmtpTransportFactory),
//!     FailurePolicy::Continue,
//! );
//!
//! let router = handlers::router(service, dispatcher);
//! ```

pub mod dispatch;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod recipients;
pub mod repository;
pub mod service;
pub mod templates;
pub mod transport;

// Re-export commonly used types
pub use dispatch::{
    DefaultTransport, Delivery, DispatchReport, DispatchSummary, Dispatcher, FailurePolicy,
    MessageLevel, NO_DEFAULT_PROFILE, OperatorMessage, RecipientResult, SendOutcome, SendStatus,
};
pub use error::{ErrorResponse, MailerError, MailerResult};
pub use memory::InMemoryMailerStore;
pub use models::{
    Cluster, ConnectionSecurity, CreateCluster, CreateEmailTemplate, CreateEmailUser,
    CreateScheduledEmail, CreateSmtpProfile, Email, EmailStatus, EmailTemplate, EmailUser,
    RecipientTarget, ScheduledEmail, SmtpProfile,
};
pub use postgres::PgMailerStore;
pub use repository::MailerStore;
pub use service::MailerService;
pub use templates::TemplateRenderer;
pub use transport::{
    MailTransport, OutgoingEmail, SentEmail, SmtpTransportFactory, TransportFactory,
};
