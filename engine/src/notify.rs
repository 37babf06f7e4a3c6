//! Report delivery.
//!
//! The orchestrator hands a subject and body to a [`Notifier`] and does not
//! care about the transport. Delivery failures are returned to the caller as
//! [`NotifyError`], which the orchestrator only logs.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Local;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while delivering a report.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("No addressees configured")]
    NoRecipients,

    #[error("Could not resolve mail server '{server}'")]
    UnresolvedServer { server: String },

    #[error("Failed to connect to mail server '{server}': {source}")]
    Connect { server: String, source: io::Error },

    #[error("Mail server rejected {command}: {reply}")]
    Rejected { command: String, reply: String },

    #[error("Malformed reply from mail server: {reply}")]
    MalformedReply { reply: String },

    #[error("Mail server connection failed: {0}")]
    Io(#[from] io::Error),
}

/// Delivers a finished report.
pub trait Notifier {
    fn deliver(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Logs reports instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn deliver(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(%subject, "report not sent (notifications disabled)\n{}", body);
        Ok(())
    }
}

const DEFAULT_SMTP_PORT: u16 = 25;

/// Plain, unauthenticated SMTP delivery to a relay on the local network.
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    server: String,
    sender: String,
    recipients: Vec<String>,
    timeout: Duration,
}

impl SmtpNotifier {
    /// `server` is a host name or IP address with an optional port, e.g.
    /// `mail.example.org`, `10.0.0.5:2525`, `::1` or `[::1]:2525`. Port 25 is
    /// assumed when absent.
    pub fn new(
        server: impl Into<String>,
        sender: impl Into<String>,
        recipients: Vec<String>,
    ) -> Self {
        SmtpNotifier {
            server: server.into(),
            sender: sender.into(),
            recipients,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Server address in `host:port` form.
    fn target(&self) -> String {
        let server = self.server.trim();
        if server.parse::<SocketAddr>().is_ok() {
            return server.to_string();
        }
        let bare = server.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return SocketAddr::new(ip, DEFAULT_SMTP_PORT).to_string();
        }
        match server.rsplit_once(':') {
            Some((_, port)) if port.parse::<u16>().is_ok() => server.to_string(),
            _ => format!("{}:{}", server, DEFAULT_SMTP_PORT),
        }
    }

    fn connect(&self) -> Result<TcpStream, NotifyError> {
        let addr = self
            .target()
            .to_socket_addrs()
            .map_err(|e| NotifyError::Connect {
                server: self.server.clone(),
                source: e,
            })?
            .next()
            .ok_or_else(|| NotifyError::UnresolvedServer {
                server: self.server.clone(),
            })?;

        let stream = TcpStream::connect_timeout(&addr, self.timeout).map_err(|e| {
            NotifyError::Connect {
                server: self.server.clone(),
                source: e,
            }
        })?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        Ok(stream)
    }

    fn message(&self, subject: &str, body: &str) -> String {
        let mut message = format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\nMIME-Version: 1.0\r\n\
             Content-Type: text/plain; charset=utf-8\r\nContent-Transfer-Encoding: 8bit\r\n\r\n",
            self.sender,
            self.recipients.join(", "),
            encode_header(subject),
            Local::now().to_rfc2822(),
        );
        for line in body.lines() {
            if line.starts_with('.') {
                message.push('.');
            }
            message.push_str(line);
            message.push_str("\r\n");
        }
        message.push_str(".\r\n");
        message
    }
}

/// RFC 2047 encoded-word for header values that are not plain ASCII.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?B?{}?=", STANDARD.encode(value))
    }
}

impl Notifier for SmtpNotifier {
    fn deliver(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        if self.recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let stream = self.connect()?;
        let mut session = SmtpSession {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
        };

        session.read_reply("greeting", &[220])?;
        session.command("HELO localhost", &[250])?;
        session.command(&format!("MAIL FROM:<{}>", self.sender), &[250])?;
        for recipient in &self.recipients {
            session.command(&format!("RCPT TO:<{}>", recipient), &[250, 251])?;
        }
        session.command("DATA", &[354])?;
        session.writer.write_all(self.message(subject, body).as_bytes())?;
        session.read_reply("message", &[250])?;
        session.command("QUIT", &[221])?;

        info!(%subject, recipients = self.recipients.len(), "report sent");
        Ok(())
    }
}

struct SmtpSession {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl SmtpSession {
    fn command(&mut self, command: &str, accepted: &[u16]) -> Result<(), NotifyError> {
        debug!(command, "smtp >");
        self.writer.write_all(command.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        self.read_reply(command, accepted)
    }

    /// Read one possibly multi-line reply and check its code.
    fn read_reply(&mut self, what: &str, accepted: &[u16]) -> Result<(), NotifyError> {
        let mut reply = String::new();
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(NotifyError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by mail server",
                )));
            }
            reply.push_str(&line);
            // "250-..." continues a reply, "250 ..." ends it
            if line.as_bytes().get(3) != Some(&b'-') {
                break;
            }
        }
        let reply = reply.trim_end().to_string();
        debug!(reply = %reply, "smtp <");

        let code: u16 = reply
            .get(..3)
            .and_then(|c| c.parse().ok())
            .ok_or_else(|| NotifyError::MalformedReply {
                reply: reply.clone(),
            })?;

        if accepted.contains(&code) {
            Ok(())
        } else {
            Err(NotifyError::Rejected {
                command: what.to_string(),
                reply,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Minimal SMTP relay that accepts one session and returns every line it
    /// received. RCPT for addresses starting with "reject" gets a 550.
    fn spawn_relay() -> (String, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get address").to_string();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("Failed to accept");
            let mut reader = BufReader::new(stream.try_clone().expect("Failed to clone stream"));
            let mut writer = stream;
            let mut received = Vec::new();
            writer.write_all(b"220 relay ready\r\n").expect("write");

            let mut in_data = false;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).expect("read") == 0 {
                    break;
                }
                let line = line.trim_end_matches("\r\n").to_string();
                received.push(line.clone());

                if in_data {
                    if line == "." {
                        in_data = false;
                        writer.write_all(b"250 queued\r\n").expect("write");
                    }
                    continue;
                }

                let reply: &[u8] = if line.starts_with("HELO") {
                    b"250-relay\r\n250 at your service\r\n"
                } else if line.starts_with("RCPT TO:<reject") {
                    b"550 no such user\r\n"
                } else if line.starts_with("MAIL") || line.starts_with("RCPT") {
                    b"250 ok\r\n"
                } else if line == "DATA" {
                    in_data = true;
                    b"354 end with <CRLF>.<CRLF>\r\n"
                } else if line == "QUIT" {
                    writer.write_all(b"221 bye\r\n").expect("write");
                    break;
                } else {
                    b"500 unknown\r\n"
                };
                writer.write_all(reply).expect("write");
            }
            received
        });

        (addr, handle)
    }

    #[test]
    fn test_smtp_dialogue_and_dot_stuffing() {
        let (addr, relay) = spawn_relay();
        let notifier = SmtpNotifier::new(
            addr,
            "archiver@example.org",
            vec!["a@example.org".to_string(), "b@example.org".to_string()],
        )
        .with_timeout(Duration::from_secs(5));

        notifier
            .deliver(
                "Data transfer completed for run: RUN",
                "Data summary:\n.hidden line\nend",
            )
            .expect("delivery should succeed");

        let received = relay.join().expect("relay thread panicked");
        assert_eq!(received[0], "HELO localhost");
        assert_eq!(received[1], "MAIL FROM:<archiver@example.org>");
        assert_eq!(received.iter().filter(|l| l.starts_with("RCPT TO:")).count(), 2);
        assert!(received.contains(&"Subject: Data transfer completed for run: RUN".to_string()));
        assert!(received.contains(&"..hidden line".to_string()));
        assert_eq!(received.last().map(String::as_str), Some("QUIT"));
    }

    #[test]
    fn test_smtp_rejected_recipient_is_an_error() {
        let (addr, relay) = spawn_relay();
        let notifier = SmtpNotifier::new(
            addr,
            "archiver@example.org",
            vec!["reject@example.org".to_string()],
        )
        .with_timeout(Duration::from_secs(5));

        let result = notifier.deliver("subject", "body");
        assert!(matches!(result, Err(NotifyError::Rejected { .. })));

        // The session was dropped with the error, so the relay sees EOF
        let received = relay.join().expect("relay thread panicked");
        assert!(!received.iter().any(|l| l == "DATA"));
    }

    #[test]
    fn test_smtp_without_recipients() {
        let notifier = SmtpNotifier::new("127.0.0.1:1", "archiver@example.org", Vec::new());
        assert!(matches!(
            notifier.deliver("subject", "body"),
            Err(NotifyError::NoRecipients)
        ));
    }

    #[test]
    fn test_non_ascii_subject_is_encoded() {
        assert_eq!(encode_header("Data transfer completed"), "Data transfer completed");
        assert_eq!(encode_header("Lauf Müller"), "=?utf-8?B?TGF1ZiBNw7xsbGVy?=");

        let notifier = SmtpNotifier::new("relay", "archiver@example.org", vec!["a@x".to_string()]);
        let message = notifier.message("Data transfer completed for run: Müller", "body");
        assert!(!message.contains("Müller"));
        assert!(message.contains("Subject: =?utf-8?B?"));
    }

    #[test]
    fn test_server_target_handles_ports_and_ipv6() {
        let target = |server: &str| SmtpNotifier::new(server, "a@x", Vec::new()).target();
        assert_eq!(target("mail.example.org"), "mail.example.org:25");
        assert_eq!(target("mail.example.org:2525"), "mail.example.org:2525");
        assert_eq!(target("10.0.0.5"), "10.0.0.5:25");
        assert_eq!(target("::1"), "[::1]:25");
        assert_eq!(target("[::1]"), "[::1]:25");
        assert_eq!(target("[::1]:2525"), "[::1]:2525");
    }

    #[test]
    fn test_tracing_notifier_always_succeeds() {
        assert!(TracingNotifier.deliver("subject", "body").is_ok());
    }
}
