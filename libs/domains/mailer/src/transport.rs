//! Outbound SMTP transport and default-profile resolution.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, error, info};

use crate::error::MailerResult;
use crate::models::{ConnectionSecurity, SmtpProfile};
use crate::repository::SmtpProfileRepository;

/// One rendered message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Result of a successful transmission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentEmail {
    /// Server-provided message id, when the server returns one
    pub message_id: Option<String>,
}

/// A live connection capable of delivering messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> MailerResult<SentEmail>;

    /// Transport name for logging.
    fn name(&self) -> &'static str;
}

/// Builds a transport from an SMTP profile.
#[cfg_attr(test, mockall::automock)]
pub trait TransportFactory: Send + Sync {
    fn connect(&self, profile: &SmtpProfile) -> MailerResult<Box<dyn MailTransport>>;
}

/// lettre-backed SMTP transport.
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
    port: u16,
}

impl SmtpTransport {
    /// `use_ssl` selects implicit TLS, `use_tls` STARTTLS, neither plaintext.
    /// Credentials are applied when the profile has a username.
    pub fn from_profile(profile: &SmtpProfile) -> MailerResult<Self> {
        let security = profile.security();
        let mut builder = match security {
            ConnectionSecurity::Ssl => AsyncSmtpTransport::<Tokio1Executor>::relay(&profile.host)?,
            ConnectionSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&profile.host)?
            }
            ConnectionSecurity::Plain => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&profile.host)
            }
        }
        .port(profile.port);

        if !profile.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                profile.username.clone(),
                profile.password.clone(),
            ));
        }

        debug!(
            host = %profile.host,
            port = profile.port,
            security = %security,
            "Built SMTP transport"
        );

        Ok(Self {
            transport: builder.build(),
            host: profile.host.clone(),
            port: profile.port,
        })
    }

    fn build_message(email: &OutgoingEmail) -> MailerResult<Message> {
        let from: Mailbox = email.from.parse()?;
        let to: Mailbox = email.to.parse()?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())?;

        Ok(message)
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&self, email: &OutgoingEmail) -> MailerResult<SentEmail> {
        debug!(
            to = %email.to,
            subject = %email.subject,
            host = %self.host,
            port = self.port,
            "Sending email via SMTP"
        );

        let message = Self::build_message(email)?;

        let response = self.transport.send(message).await.map_err(|e| {
            error!(to = %email.to, error = %e, "Failed to send email via SMTP");
            e
        })?;

        let message_id = response.message().next().map(|s| s.to_string());

        info!(to = %email.to, message_id = ?message_id, "Email sent via SMTP");

        Ok(SentEmail { message_id })
    }

    fn name(&self) -> &'static str {
        "SMTP"
    }
}

/// Factory producing [`SmtpTransport`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpTransportFactory;

impl TransportFactory for SmtpTransportFactory {
    fn connect(&self, profile: &SmtpProfile) -> MailerResult<Box<dyn MailTransport>> {
        Ok(Box::new(SmtpTransport::from_profile(profile)?))
    }
}

/// The default profile together with a transport built from it.
pub struct ResolvedTransport {
    pub profile: SmtpProfile,
    pub transport: Box<dyn MailTransport>,
}

impl ResolvedTransport {
    /// Sender address used for every message of the run.
    pub fn sender(&self) -> &str {
        &self.profile.username
    }
}

/// Look up the default SMTP profile and build its transport.
///
/// A missing default profile is `Ok(None)`.
pub async fn resolve_default_transport<S, F>(
    store: &S,
    factory: &F,
) -> MailerResult<Option<ResolvedTransport>>
where
    S: SmtpProfileRepository + ?Sized,
    F: TransportFactory + ?Sized,
{
    let Some(profile) = store.find_default_smtp_profile().await? else {
        return Ok(None);
    };

    let transport = factory.connect(&profile)?;
    info!(
        smtp_profile_id = %profile.id,
        profile = %profile,
        transport = transport.name(),
        "Resolved default SMTP transport"
    );

    Ok(Some(ResolvedTransport { profile, transport }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MailerError;
    use crate::memory::InMemoryMailerStore;
    use crate::models::CreateSmtpProfile;
    use crate::repository::MockSmtpProfileRepository;

    fn profile_input(name: &str, is_default: bool) -> CreateSmtpProfile {
        CreateSmtpProfile {
            name: name.to_string(),
            host: "localhost".to_string(),
            port: 1025,
            username: "news@example.com".to_string(),
            password: "secret".to_string(),
            use_tls: false,
            use_ssl: false,
            is_default,
        }
    }

    #[tokio::test]
    async fn test_builds_transport_for_every_security_mode() {
        for (use_tls, use_ssl) in [(false, false), (true, false), (false, true)] {
            let mut profile = SmtpProfile::new(profile_input("relay", true));
            profile.use_tls = use_tls;
            profile.use_ssl = use_ssl;
            assert!(SmtpTransport::from_profile(&profile).is_ok());
        }
    }

    #[test]
    fn test_invalid_recipient_is_transport_error() {
        let err = SmtpTransport::build_message(&OutgoingEmail {
            from: "news@example.com".into(),
            to: "not-an-address".into(),
            subject: "Hi".into(),
            html_body: "<p>Hi</p>".into(),
        })
        .unwrap_err();
        assert!(matches!(err, MailerError::Transport(_)));
    }

    #[tokio::test]
    async fn test_resolve_returns_none_without_default_profile() {
        let store = InMemoryMailerStore::new();
        store
            .create_smtp_profile(profile_input("backup", false))
            .await
            .unwrap();

        let mut factory = MockTransportFactory::new();
        factory.expect_connect().never();

        let resolved = resolve_default_transport(&store, &factory).await.unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_resolve_propagates_store_errors() {
        let mut store = MockSmtpProfileRepository::new();
        store
            .expect_find_default_smtp_profile()
            .times(1)
            .returning(|| Err(MailerError::Database("connection reset".into())));

        let mut factory = MockTransportFactory::new();
        factory.expect_connect().never();

        let result = resolve_default_transport(&store, &factory).await;
        assert!(matches!(result, Err(MailerError::Database(_))));
    }

    #[tokio::test]
    async fn test_resolve_connects_default_profile() {
        let store = InMemoryMailerStore::new();
        store
            .create_smtp_profile(profile_input("backup", false))
            .await
            .unwrap();
        let default = store
            .create_smtp_profile(profile_input("primary", true))
            .await
            .unwrap();

        let mut factory = MockTransportFactory::new();
        let expected_id = default.id;
        factory
            .expect_connect()
            .withf(move |p| p.id == expected_id)
            .times(1)
            .returning(|_| {
                let mut transport = MockMailTransport::new();
                transport.expect_name().return_const("mock");
                Ok(Box::new(transport))
            });

        let resolved = resolve_default_transport(&store, &factory)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.profile.id, default.id);
        assert_eq!(resolved.sender(), "news@example.com");
    }
}
