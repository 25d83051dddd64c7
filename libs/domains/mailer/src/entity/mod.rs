//! Sea-ORM entities, one module per table.

pub mod cluster;
pub mod cluster_user;
pub mod email;
pub mod email_template;
pub mod email_user;
pub mod scheduled_email;
pub mod smtp_profile;
