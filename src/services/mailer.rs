// ============================================================================
// SERVICE : EMAILS SORTANTS
// ============================================================================
//
// Description:
//   File d'attente bornée entre les requêtes HTTP et l'envoi réel.
//   Les services appellent enqueue() et n'attendent jamais la livraison :
//   un échec d'envoi n'annule pas une inscription déjà enregistrée.
//
// Points d'attention:
//   - enqueue() ne bloque pas et ne renvoie pas d'erreur (file pleine ou
//     fermée => log + message abandonné)
//   - LogTransport : transport par défaut, écrit le message dans les logs
//
// ============================================================================

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

impl OutboundEmail {
    pub fn activation(to: &str, activation_url: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Activate your account".to_string(),
            html_body: format!(
                "<p>Welcome aboard!</p>\
                 <p>Please confirm your email address to activate your account:</p>\
                 <p><a href=\"{url}\">{url}</a></p>\
                 <p>If you did not create an account, you can ignore this email.</p>",
                url = activation_url
            ),
        }
    }

    pub fn password_reset(to: &str, reset_url: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Reset your password".to_string(),
            html_body: format!(
                "<p>We received a request to reset your password.</p>\
                 <p><a href=\"{url}\">{url}</a></p>\
                 <p>The link stops working once your password has been changed.</p>",
                url = reset_url
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Unavailable(String),

    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Livraison effective d'un email (SMTP, API tierce, logs...)
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError>;
}

/// Transport sans infrastructure : le message part dans les logs
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "outbound email (log transport)");
        debug!(body = %email.html_body, "outbound email body");
        Ok(())
    }
}

#[derive(Clone)]
pub struct Mailer {
    sender: Sender<OutboundEmail>,
}

impl Mailer {
    pub fn channel(capacity: usize) -> (Self, Receiver<OutboundEmail>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Fire-and-forget
    pub fn enqueue(&self, email: OutboundEmail) {
        match self.sender.try_send(email) {
            Ok(()) => {}
            Err(TrySendError::Full(email)) => {
                warn!(to = %email.to, subject = %email.subject, "mail queue full, message dropped");
            }
            Err(TrySendError::Closed(email)) => {
                error!(to = %email.to, subject = %email.subject, "mail worker stopped, message dropped");
            }
        }
    }
}

/// Vide la file dans le transport jusqu'à la fermeture de tous les Mailer
pub fn spawn_mail_worker(
    mut receiver: Receiver<OutboundEmail>,
    transport: Arc<dyn MailTransport>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(email) = receiver.recv().await {
            if let Err(e) = transport.send(&email).await {
                error!(to = %email.to, subject = %email.subject, error = %e, "failed to deliver email");
            }
        }
        info!("mail worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<OutboundEmail>>,
        fail: bool,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Unavailable("smtp down".to_string()));
            }
            self.sent.lock().await.push(email.clone());
            Ok(())
        }
    }

    #[test]
    fn test_activation_email_contains_url() {
        let email = OutboundEmail::activation("a@example.com", "https://x.test/activate/NDI/abc/");
        assert_eq!(email.to, "a@example.com");
        assert!(email.html_body.contains("https://x.test/activate/NDI/abc/"));
    }

    #[tokio::test]
    async fn test_enqueue_never_fails_when_full() {
        let (mailer, mut rx) = Mailer::channel(1);
        mailer.enqueue(OutboundEmail::activation("a@example.com", "u1"));
        mailer.enqueue(OutboundEmail::activation("b@example.com", "u2"));

        assert_eq!(rx.recv().await.unwrap().to, "a@example.com");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_enqueue_after_worker_stopped() {
        let (mailer, rx) = Mailer::channel(4);
        drop(rx);
        mailer.enqueue(OutboundEmail::password_reset("a@example.com", "u"));
    }

    #[tokio::test]
    async fn test_worker_delivers_and_survives_failures() {
        let transport = Arc::new(RecordingTransport::default());
        let (mailer, rx) = Mailer::channel(8);
        let worker = spawn_mail_worker(rx, transport.clone());

        mailer.enqueue(OutboundEmail::activation("a@example.com", "u1"));
        mailer.enqueue(OutboundEmail::password_reset("b@example.com", "u2"));
        drop(mailer);
        worker.await.unwrap();

        let sent = transport.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].subject, "Reset your password");

        let failing = Arc::new(RecordingTransport { fail: true, ..Default::default() });
        let (mailer, rx) = Mailer::channel(8);
        let worker = spawn_mail_worker(rx, failing);
        mailer.enqueue(OutboundEmail::activation("c@example.com", "u3"));
        drop(mailer);
        worker.await.unwrap();
    }
}
