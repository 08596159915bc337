//! Outbound collaborators of the pipeline.
//!
//! - [`fetcher::HttpFetcher`] pulls the player roster from the reporting API.
//! - [`mailer::Mailer`] renders a store report and sends it over SMTP.

pub mod fetcher;
pub mod mailer;
pub mod template;

pub use fetcher::HttpFetcher;
pub use mailer::Mailer;
pub use template::{Template, TemplateLoader};
