//! Minimal inbound SMTP receiver.
//!
//! Accepts mail for one domain only, without authentication or TLS, and hands
//! each completed message to [`MailIntake`]. Recipients outside the domain are
//! refused at `RCPT` so no body is ever transferred for them.
//!
//! [`SmtpSession`] is the protocol state machine and does no I/O;
//! [`run_session`] drives it over any async byte stream.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{Instrument, debug, info, warn};

use crate::domain::address::EmailAddress;
use crate::usecase::intake::MailIntake;

/// RFC 5321 §4.5.3.1.4 (command line, including CRLF).
pub const MAX_COMMAND_LINE: usize = 512;
/// RFC 5321 §4.5.3.1.6 (text line, including CRLF).
pub const MAX_TEXT_LINE: usize = 1000;

#[derive(Debug, Clone)]
pub struct SmtpLimits {
    pub max_message_bytes: usize,
    pub max_recipients: usize,
    pub idle_timeout: Duration,
}

impl Default for SmtpLimits {
    fn default() -> Self {
        Self {
            max_message_bytes: 1024 * 1024,
            max_recipients: 100,
            idle_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            lines: vec![text.into()],
        }
    }

    pub fn multiline(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Wire form, `250-first\r\n250 last\r\n`.
    pub fn render(&self) -> String {
        let last = self.lines.len().saturating_sub(1);
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            let sep = if i == last { ' ' } else { '-' };
            out.push_str(&format!("{}{}{}\r\n", self.code, sep, line));
        }
        out
    }
}

/// What the driver must do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Reply(Reply),
    /// Send the reply, then read the message body.
    BeginData(Reply),
    /// Send the reply and hang up.
    Close(Reply),
}

/// How reading a DATA section ended.
#[derive(Debug, PartialEq, Eq)]
pub enum DataOutcome {
    Complete(Vec<u8>),
    TooLarge,
    LineTooLong,
}

/// A message accepted for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub reverse_path: String,
    pub recipients: Vec<EmailAddress>,
    pub data: Vec<u8>,
}

pub struct SmtpSession {
    domain: String,
    limits: SmtpLimits,
    greeted: bool,
    reverse_path: Option<String>,
    recipients: Vec<EmailAddress>,
}

impl SmtpSession {
    pub fn new(domain: impl Into<String>, limits: SmtpLimits) -> Self {
        Self {
            domain: domain.into(),
            limits,
            greeted: false,
            reverse_path: None,
            recipients: Vec::new(),
        }
    }

    pub fn greeting(&self) -> Reply {
        Reply::new(220, format!("{} ESMTP ready", self.domain))
    }

    fn reset_transaction(&mut self) {
        self.reverse_path = None;
        self.recipients.clear();
    }

    /// Handle one command line (without the trailing CRLF).
    pub fn command(&mut self, line: &str) -> Action {
        let line = line.trim();
        let (verb, arg) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(verb, arg)| (verb, arg.trim_start()));
        match verb.to_ascii_uppercase().as_str() {
            "HELO" => self.helo(arg, false),
            "EHLO" => self.helo(arg, true),
            "MAIL" => Action::Reply(self.mail(arg)),
            "RCPT" => Action::Reply(self.rcpt(arg)),
            "DATA" => self.data(),
            "RSET" => {
                self.reset_transaction();
                Action::Reply(Reply::new(250, "2.0.0 OK"))
            }
            "NOOP" => Action::Reply(Reply::new(250, "2.0.0 OK")),
            "VRFY" => Action::Reply(Reply::new(252, "2.5.0 cannot VRFY user")),
            "QUIT" => Action::Close(Reply::new(
                221,
                format!("2.0.0 {} closing connection", self.domain),
            )),
            "AUTH" | "STARTTLS" => {
                Action::Reply(Reply::new(502, "5.5.1 command not implemented"))
            }
            "" => Action::Reply(Reply::new(500, "5.5.2 syntax error")),
            _ => Action::Reply(Reply::new(500, "5.5.2 command not recognized")),
        }
    }

    fn helo(&mut self, arg: &str, extended: bool) -> Action {
        if arg.is_empty() {
            return Action::Reply(Reply::new(501, "5.5.4 domain or address required"));
        }
        self.greeted = true;
        self.reset_transaction();
        let reply = if extended {
            Reply::multiline(
                250,
                vec![
                    self.domain.clone(),
                    format!("SIZE {}", self.limits.max_message_bytes),
                    "8BITMIME".to_owned(),
                ],
            )
        } else {
            Reply::new(250, self.domain.clone())
        };
        Action::Reply(reply)
    }

    fn mail(&mut self, arg: &str) -> Reply {
        if !self.greeted {
            return Reply::new(503, "5.5.1 send HELO/EHLO first");
        }
        if self.reverse_path.is_some() {
            return Reply::new(503, "5.5.1 nested MAIL command");
        }
        let Some((path, params)) = parse_path(arg, "FROM:") else {
            return Reply::new(501, "5.5.4 syntax: MAIL FROM:<address>");
        };
        let declared_size = params
            .split_ascii_whitespace()
            .filter_map(|p| p.split_once('='))
            .find(|(k, _)| k.eq_ignore_ascii_case("SIZE"))
            .and_then(|(_, v)| v.parse::<usize>().ok());
        if declared_size.is_some_and(|n| n > self.limits.max_message_bytes) {
            return Reply::new(552, "5.3.4 message size exceeds fixed limit");
        }
        self.reverse_path = Some(path.to_owned());
        Reply::new(250, "2.1.0 OK")
    }

    fn rcpt(&mut self, arg: &str) -> Reply {
        if self.reverse_path.is_none() {
            return Reply::new(503, "5.5.1 need MAIL before RCPT");
        }
        let Some((path, _)) = parse_path(arg, "TO:") else {
            return Reply::new(501, "5.5.4 syntax: RCPT TO:<address>");
        };
        let Ok(recipient) = EmailAddress::parse(path) else {
            return Reply::new(501, "5.1.3 bad recipient address syntax");
        };
        if !recipient.in_domain(&self.domain) {
            info!(recipient = %recipient, "recipient rejected: foreign domain");
            return Reply::new(
                550,
                format!("5.7.1 relaying denied: {} is not accepted here", recipient.domain()),
            );
        }
        if self.recipients.len() >= self.limits.max_recipients {
            return Reply::new(452, "4.5.3 too many recipients");
        }
        self.recipients.push(recipient);
        Reply::new(250, "2.1.5 OK")
    }

    fn data(&mut self) -> Action {
        if self.reverse_path.is_none() {
            return Action::Reply(Reply::new(503, "5.5.1 need MAIL command"));
        }
        if self.recipients.is_empty() {
            return Action::Reply(Reply::new(503, "5.5.1 no valid recipients"));
        }
        Action::BeginData(Reply::new(354, "End data with <CR><LF>.<CR><LF>"))
    }

    /// Close the current transaction. Returns the reply and, when the message
    /// was accepted, its envelope.
    pub fn finish_data(&mut self, outcome: DataOutcome) -> (Reply, Option<Envelope>) {
        let reverse_path = self.reverse_path.take().unwrap_or_default();
        let recipients = std::mem::take(&mut self.recipients);
        match outcome {
            DataOutcome::Complete(data) => (
                Reply::new(250, "2.0.0 OK: message accepted"),
                Some(Envelope {
                    reverse_path,
                    recipients,
                    data,
                }),
            ),
            DataOutcome::TooLarge => (
                Reply::new(
                    552,
                    format!(
                        "5.3.4 message exceeds {} bytes",
                        self.limits.max_message_bytes
                    ),
                ),
                None,
            ),
            DataOutcome::LineTooLong => (Reply::new(500, "5.5.6 line too long"), None),
        }
    }
}

/// Split `FROM:<path> PARAMS` into the bare path and the parameter string.
/// The null reverse path `<>` yields an empty path.
fn parse_path<'a>(arg: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let head = arg.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let rest = arg[prefix.len()..].trim_start();
    let (path, params) = if let Some(inner) = rest.strip_prefix('<') {
        let end = inner.find('>')?;
        (&inner[..end], &inner[end + 1..])
    } else {
        rest.split_once(' ').unwrap_or((rest, ""))
    };
    // Drop an obsolete source route: <@a,@b:user@example.com>
    let path = path.rsplit_once(':').map_or(path, |(_, mailbox)| mailbox);
    Some((path.trim(), params.trim()))
}

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Line,
    TooLong,
    Eof,
}

/// Read up to and including `\n` into `buf`. A line longer than `limit` is
/// consumed but not kept. A partial line at EOF counts as EOF.
async fn read_line_limited<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut too_long = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(LineRead::Eof);
        }
        let (used, done) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };
        if !too_long {
            if buf.len() + used > limit {
                too_long = true;
                buf.clear();
            } else {
                buf.extend_from_slice(&available[..used]);
            }
        }
        reader.consume(used);
        if done {
            return Ok(if too_long {
                LineRead::TooLong
            } else {
                LineRead::Line
            });
        }
    }
}

/// Read a dot-terminated message body. `None` means the peer went away.
async fn read_data<R>(reader: &mut R, limits: &SmtpLimits) -> io::Result<Option<DataOutcome>>
where
    R: AsyncBufRead + Unpin,
{
    let mut data = Vec::new();
    let mut line = Vec::new();
    let mut too_large = false;
    let mut line_too_long = false;
    loop {
        match read_line_limited(reader, &mut line, MAX_TEXT_LINE).await? {
            LineRead::Eof => return Ok(None),
            LineRead::TooLong => {
                line_too_long = true;
                continue;
            }
            LineRead::Line => {}
        }
        if line == b".\r\n" || line == b".\n" {
            break;
        }
        let content = line.strip_prefix(b".").unwrap_or(&line);
        if data.len() + content.len() > limits.max_message_bytes {
            too_large = true;
        }
        if !too_large {
            data.extend_from_slice(content);
        }
    }
    Ok(Some(if line_too_long {
        DataOutcome::LineTooLong
    } else if too_large {
        DataOutcome::TooLarge
    } else {
        DataOutcome::Complete(data)
    }))
}

async fn write_reply<W>(writer: &mut W, reply: &Reply) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(reply.render().as_bytes()).await?;
    writer.flush().await
}

/// Everything a session needs besides its stream.
pub struct SmtpContext {
    pub domain: String,
    pub limits: SmtpLimits,
    pub intake: MailIntake,
}

/// Drive one SMTP conversation to completion over `stream`.
pub async fn run_session<S>(stream: S, ctx: Arc<SmtpContext>) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut session = SmtpSession::new(ctx.domain.clone(), ctx.limits.clone());
    let mut line = Vec::new();

    write_reply(&mut writer, &session.greeting()).await?;

    loop {
        let read = timeout(
            ctx.limits.idle_timeout,
            read_line_limited(&mut reader, &mut line, MAX_COMMAND_LINE),
        )
        .await;
        let read = match read {
            Ok(read) => read?,
            Err(_) => {
                let reply = Reply::new(421, format!("4.4.2 {} idle timeout", ctx.domain));
                write_reply(&mut writer, &reply).await?;
                break;
            }
        };
        match read {
            LineRead::Eof => break,
            LineRead::TooLong => {
                write_reply(&mut writer, &Reply::new(500, "5.5.2 line too long")).await?;
                continue;
            }
            LineRead::Line => {}
        }

        let text = String::from_utf8_lossy(&line);
        match session.command(&text) {
            Action::Reply(reply) => write_reply(&mut writer, &reply).await?,
            Action::Close(reply) => {
                write_reply(&mut writer, &reply).await?;
                break;
            }
            Action::BeginData(reply) => {
                write_reply(&mut writer, &reply).await?;
                let body = read_data(&mut reader, &ctx.limits);
                let Ok(outcome) = timeout(ctx.limits.idle_timeout, body).await else {
                    let reply = Reply::new(421, format!("4.4.2 {} idle timeout", ctx.domain));
                    write_reply(&mut writer, &reply).await?;
                    break;
                };
                let Some(outcome) = outcome? else {
                    break;
                };
                let (reply, envelope) = session.finish_data(outcome);
                write_reply(&mut writer, &reply).await?;
                if let Some(envelope) = envelope {
                    debug!(
                        reverse_path = %envelope.reverse_path,
                        recipients = envelope.recipients.len(),
                        size = envelope.data.len(),
                        "message received"
                    );
                    // Intake only spawns the outbound reply, it never waits on it.
                    ctx.intake.receive(&envelope.data);
                }
            }
        }
    }

    writer.shutdown().await.ok();
    Ok(())
}

/// Accept connections forever, one task per session.
pub async fn serve(listener: TcpListener, ctx: Arc<SmtpContext>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "smtp accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        let ctx = Arc::clone(&ctx);
        tokio::spawn(
            async move {
                if let Err(e) = run_session(stream, ctx).await {
                    debug!(error = %e, "smtp session ended with error");
                }
            }
            .instrument(session_span(peer)),
        );
    }
}

fn session_span(peer: SocketAddr) -> tracing::Span {
    tracing::info_span!("smtp", peer = %peer)
}
