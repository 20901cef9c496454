//! Blocking IMAP-over-TLS session.
//!
//! A deliberately small client: LOGIN, SELECT, SEARCH, FETCH RFC822,
//! CLOSE, LOGOUT — exactly the capability set the poller consumes. All
//! calls block; the runner drives them through `spawn_blocking`.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rustls::{ClientConnection, StreamOwned};
use tracing::debug;

use super::{MailSession, MailboxError};
use crate::adapter::SearchQuery;
use crate::config::Config;

const IO_TIMEOUT: Duration = Duration::from_secs(30);

type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// A logged-in IMAP session.
pub struct ImapMailbox {
    stream: BufReader<TlsStream>,
    tag: u32,
}

/// Connect, establish TLS and log in.
pub fn connect(config: &Config) -> Result<ImapMailbox, MailboxError> {
    let tcp = TcpStream::connect((config.imap_host.as_str(), config.imap_port))?;
    tcp.set_read_timeout(Some(IO_TIMEOUT))?;
    tcp.set_write_timeout(Some(IO_TIMEOUT))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls::pki_types::ServerName::try_from(config.imap_host.clone())
        .map_err(|e| MailboxError::Tls(e.to_string()))?;
    let conn = ClientConnection::new(tls_config, server_name)
        .map_err(|e| MailboxError::Tls(e.to_string()))?;

    let mut mailbox = ImapMailbox {
        stream: BufReader::new(StreamOwned::new(conn, tcp)),
        tag: 0,
    };

    let greeting = mailbox.read_line()?;
    if !greeting.starts_with("* OK") {
        return Err(MailboxError::Protocol(format!(
            "unexpected greeting: {}",
            greeting.trim_end()
        )));
    }

    mailbox
        .command(&format!(
            "LOGIN \"{}\" \"{}\"",
            config.imap_user, config.imap_password
        ))
        .map_err(|e| match e {
            MailboxError::Protocol(reason) => MailboxError::Auth(reason),
            other => other,
        })?;

    debug!(host = %config.imap_host, user = %config.imap_user, "imap_logged_in");
    Ok(mailbox)
}

impl ImapMailbox {
    fn next_tag(&mut self) -> String {
        self.tag += 1;
        format!("A{}", self.tag)
    }

    fn read_line(&mut self) -> Result<String, MailboxError> {
        let mut buf = Vec::new();
        let n = self.stream.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Err(MailboxError::Protocol("connection closed".to_string()));
        }
        Ok(String::from_utf8_lossy(&buf).to_string())
    }

    fn send(&mut self, tag: &str, cmd: &str) -> Result<(), MailboxError> {
        let full = format!("{} {}\r\n", tag, cmd);
        self.stream.get_mut().write_all(full.as_bytes())?;
        self.stream.get_mut().flush()?;
        Ok(())
    }

    /// Send a command and collect untagged response lines until the tagged
    /// completion; a `NO`/`BAD` completion is a protocol error. The error
    /// text names only the command word, never its arguments.
    fn command(&mut self, cmd: &str) -> Result<Vec<String>, MailboxError> {
        let tag = self.next_tag();
        self.send(&tag, cmd)?;

        let prefix = format!("{} ", tag);
        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            if let Some(status) = line.strip_prefix(&prefix) {
                if status.starts_with("OK") {
                    return Ok(lines);
                }
                let word = cmd.split_whitespace().next().unwrap_or(cmd);
                return Err(MailboxError::Protocol(format!(
                    "{} failed: {}",
                    word,
                    status.trim_end()
                )));
            }
            lines.push(line);
        }
    }
}

impl MailSession for ImapMailbox {
    fn select(&mut self, folder: &str) -> Result<(), MailboxError> {
        self.command(&format!("SELECT \"{}\"", folder))?;
        Ok(())
    }

    fn search(&mut self, query: &SearchQuery) -> Result<Vec<u32>, MailboxError> {
        let lines = self.command(&format!("SEARCH {}", query.to_imap()))?;
        let mut ids = Vec::new();
        for line in &lines {
            if let Some(rest) = line.trim_end().strip_prefix("* SEARCH") {
                ids.extend(rest.split_whitespace().filter_map(|t| t.parse::<u32>().ok()));
            }
        }
        Ok(ids)
    }

    fn fetch(&mut self, seq: u32) -> Result<Vec<u8>, MailboxError> {
        let tag = self.next_tag();
        self.send(&tag, &format!("FETCH {} (RFC822)", seq))?;

        let prefix = format!("{} ", tag);
        let mut body = Vec::new();
        loop {
            let line = self.read_line()?;
            if let Some(status) = line.strip_prefix(&prefix) {
                if status.starts_with("OK") {
                    return Ok(body);
                }
                return Err(MailboxError::Protocol(format!(
                    "FETCH {} failed: {}",
                    seq,
                    status.trim_end()
                )));
            }
            // The message body arrives as an IMAP literal: "... {size}\r\n"
            // followed by exactly `size` raw bytes.
            if let Some(size) = literal_size(&line) {
                let mut buf = vec![0u8; size];
                self.stream.read_exact(&mut buf)?;
                body = buf;
            }
        }
    }

    fn close(&mut self) -> Result<(), MailboxError> {
        self.command("CLOSE")?;
        Ok(())
    }

    fn logout(&mut self) -> Result<(), MailboxError> {
        self.command("LOGOUT")?;
        Ok(())
    }
}

/// Size of the IMAP literal a response line announces, if any.
fn literal_size(line: &str) -> Option<usize> {
    let line = line.trim_end();
    let rest = line.strip_suffix('}')?;
    let open = rest.rfind('{')?;
    rest[open + 1..].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_size_parses_announcement() {
        assert_eq!(literal_size("* 1 FETCH (RFC822 {1234}\r\n"), Some(1234));
        assert_eq!(literal_size("* 12 FETCH (RFC822 {0}\r\n"), Some(0));
    }

    #[test]
    fn test_literal_size_ignores_plain_lines() {
        assert_eq!(literal_size("* 1 FETCH (FLAGS (\\Seen))\r\n"), None);
        assert_eq!(literal_size("A3 OK FETCH completed\r\n"), None);
    }
}
