//! Parsing of the tunnel binary's console output
//!
//! cloudflared prints human-readable log lines such as:
//!
//! ```text
//! 2023-01-30T15:37:11Z INF |  https://random-words.trycloudflare.com  |
//! 2023-01-30T15:37:12Z INF Registered tunnel connection connIndex=0
//! ```
//!
//! [`LogParser`] turns those lines into [`LogEvent`]s and applies them to the
//! session's [`StatusCell`]. One parser exists per process attempt.

use std::sync::Arc;

use tracing::{error, info, trace, warn};
use url::Url;

use super::state::{StatusCell, TunnelStatus};

/// Message set when the provider registers a connection before any URL
pub const MISSING_URL_MESSAGE: &str = "Could not find tunnel url";

/// Phrasings cloudflared versions use to announce a registered connection
pub const DEFAULT_CONNECTION_PHRASES: &[&str] =
    &["Connection registered", "Registered tunnel connection"];

/// Log levels printed by cloudflared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Something recognised in a single output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// A public URL on the provider's domain
    TunnelUrl(String),
    /// The provider registered a tunnel connection
    ConnectionRegistered,
    /// A previously registered connection went away
    ConnectionLost,
}

/// Closed set of accepted "connection registered" phrasings
///
/// All entries are equivalent; matching any of them yields
/// [`LogEvent::ConnectionRegistered`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionPhrases {
    phrases: Vec<String>,
}

impl ConnectionPhrases {
    /// Built-in phrasings plus `extra`
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut phrases = Self::default().phrases;
        for phrase in extra {
            let phrase = phrase.into();
            if !phrase.is_empty() && !phrases.contains(&phrase) {
                phrases.push(phrase);
            }
        }
        Self { phrases }
    }

    /// Whether `line` contains any accepted phrasing
    pub fn matches(&self, line: &str) -> bool {
        self.phrases.iter().any(|phrase| line.contains(phrase.as_str()))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.phrases
    }
}

impl Default for ConnectionPhrases {
    fn default() -> Self {
        Self {
            phrases: DEFAULT_CONNECTION_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// Line patterns shared by every attempt of a session
#[derive(Debug, Clone)]
pub struct LogPatterns {
    /// Public domain whose subdomains are tunnel URLs
    pub domain: String,
    pub phrases: ConnectionPhrases,
}

impl LogPatterns {
    pub fn new(domain: impl Into<String>, phrases: ConnectionPhrases) -> Self {
        Self {
            domain: domain.into(),
            phrases,
        }
    }

    /// Classify a single line
    pub fn classify(&self, line: &str) -> Option<LogEvent> {
        if is_connection_lost(line) {
            return Some(LogEvent::ConnectionLost);
        }
        if let Some(url) = parse_tunnel_url(line, &self.domain) {
            return Some(LogEvent::TunnelUrl(url));
        }
        if self.phrases.matches(line) {
            return Some(LogEvent::ConnectionRegistered);
        }
        None
    }
}

/// Parser bound to one process attempt
///
/// The captured URL lives only as long as the parser; a respawned process
/// gets a fresh parser and has to announce its URL again.
#[derive(Debug)]
pub struct LogParser {
    status: StatusCell,
    patterns: Arc<LogPatterns>,
    captured_url: Option<String>,
}

impl LogParser {
    pub fn new(status: StatusCell, patterns: Arc<LogPatterns>) -> Self {
        Self {
            status,
            patterns,
            captured_url: None,
        }
    }

    /// Feed a chunk of output, processing its lines in order
    pub fn feed(&mut self, chunk: &str) {
        for line in chunk.lines() {
            trace!(target: "cloudflared", "{}", line);
            if let Some(event) = self.patterns.classify(line) {
                self.apply(event);
            }
        }
    }

    /// URL seen so far by this attempt
    pub fn captured_url(&self) -> Option<&str> {
        self.captured_url.as_deref()
    }

    fn apply(&mut self, event: LogEvent) {
        match event {
            LogEvent::TunnelUrl(url) => {
                trace!(%url, "Captured tunnel url");
                self.captured_url = Some(url);
            }
            LogEvent::ConnectionRegistered => match &self.captured_url {
                Some(url) => {
                    info!(%url, "Tunnel connected");
                    self.status
                        .set(TunnelStatus::Connected { url: url.clone() });
                }
                None => {
                    error!("Tunnel registered a connection but printed no url");
                    self.status.set(TunnelStatus::error(MISSING_URL_MESSAGE));
                }
            },
            LogEvent::ConnectionLost => {
                warn!("Tunnel connection lost");
            }
        }
    }
}

/// Parse the log level marker, skipping a leading timestamp
///
/// Accepts "INF message" and "2023-01-30T15:37:11Z INF message".
pub fn parse_log_level(line: &str) -> Option<(LogLevel, &str)> {
    let line = line.trim_start();
    let rest = match line.split_once(char::is_whitespace) {
        Some((first, rest)) if first.starts_with(|c: char| c.is_ascii_digit()) => {
            rest.trim_start()
        }
        _ => line,
    };

    let (marker, message) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let level = match marker {
        "INF" => LogLevel::Info,
        "WRN" => LogLevel::Warn,
        "ERR" => LogLevel::Error,
        "DBG" => LogLevel::Debug,
        _ => return None,
    };

    Some((level, message.trim()))
}

/// Parse a public tunnel URL from a log line
///
/// The line must carry a level marker and the URL host must be a subdomain
/// of `domain`. URL-shaped text on any other host is ignored.
pub fn parse_tunnel_url(line: &str, domain: &str) -> Option<String> {
    let (_, message) = parse_log_level(line)?;

    let mut rest = message;
    while let Some(start) = rest.find("https://") {
        let candidate = &rest[start..];
        // URL ends at whitespace, the box border, or end of line
        let end = candidate
            .find(|c: char| c.is_whitespace() || c == '|')
            .unwrap_or(candidate.len());
        let raw = &candidate[..end];

        if is_provider_url(raw, domain) {
            return Some(raw.to_string());
        }
        rest = &candidate[end..];
    }
    None
}

fn is_provider_url(raw: &str, domain: &str) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    host.strip_suffix(domain)
        .and_then(|sub| sub.strip_suffix('.'))
        .is_some_and(|sub| !sub.is_empty())
}

/// Check if line indicates connection lost
pub fn is_connection_lost(line: &str) -> bool {
    line.contains("Unregistered") || line.contains("connection lost")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "trycloudflare.com";

    fn parser() -> (LogParser, StatusCell) {
        let status = StatusCell::new();
        let patterns = Arc::new(LogPatterns::new(DOMAIN, ConnectionPhrases::default()));
        (LogParser::new(status.clone(), patterns), status)
    }

    #[test]
    fn parse_log_level_info() {
        let (level, msg) = parse_log_level("INF Starting tunnel").unwrap();
        assert_eq!(level, LogLevel::Info);
        assert_eq!(msg, "Starting tunnel");
    }

    #[test]
    fn parse_log_level_after_timestamp() {
        let (level, msg) = parse_log_level("2023-01-30T15:37:11Z ERR Connection failed").unwrap();
        assert_eq!(level, LogLevel::Error);
        assert_eq!(msg, "Connection failed");
    }

    #[test]
    fn parse_log_level_unknown() {
        assert!(parse_log_level("Some random text").is_none());
        assert!(parse_log_level("2023-01-30T15:37:11Z nothing here").is_none());
    }

    #[test]
    fn parse_tunnel_url_from_box() {
        let line = "2023-01-30T15:37:11Z INF |  https://random-words-here.trycloudflare.com            |";
        assert_eq!(
            parse_tunnel_url(line, DOMAIN),
            Some("https://random-words-here.trycloudflare.com".to_string())
        );
    }

    #[test]
    fn parse_tunnel_url_requires_level_marker() {
        let line = "Your quick Tunnel is https://test-tunnel.trycloudflare.com";
        assert!(parse_tunnel_url(line, DOMAIN).is_none());
    }

    #[test]
    fn parse_tunnel_url_rejects_other_hosts() {
        for line in [
            "INF |  https://bad_url.com",
            "INF |  https://example.com",
            "INF |  https://trycloudflare.com",
            "INF |  https://trycloudflare.com.evil.net",
            "INF |  https://eviltrycloudflare.com",
            "INF |  https://evil.net/x.trycloudflare.com",
        ] {
            assert!(parse_tunnel_url(line, DOMAIN).is_none(), "{line}");
        }
    }

    #[test]
    fn parse_tunnel_url_skips_foreign_url_before_provider_url() {
        let line = "INF see https://developers.cloudflare.com then https://a-b.trycloudflare.com";
        assert_eq!(
            parse_tunnel_url(line, DOMAIN),
            Some("https://a-b.trycloudflare.com".to_string())
        );
    }

    #[test]
    fn phrases_are_a_closed_set_with_extras() {
        let phrases = ConnectionPhrases::default();
        assert!(phrases.matches("INF Connection registered connIndex=0"));
        assert!(phrases.matches("INF Registered tunnel connection connIndex=0"));
        assert!(!phrases.matches("INF Tunnel connection curve preferences"));

        let extended = ConnectionPhrases::with_extra(["Tunnel is up"]);
        assert!(extended.matches("INF Tunnel is up"));
        assert_eq!(extended.as_slice().len(), 3);
    }

    #[test]
    fn unregistered_is_connection_lost_not_registered() {
        let patterns = LogPatterns::new(DOMAIN, ConnectionPhrases::default());
        assert_eq!(
            patterns.classify("ERR Unregistered tunnel connection connIndex=0"),
            Some(LogEvent::ConnectionLost)
        );
    }

    #[test]
    fn url_alone_keeps_starting() {
        let (mut parser, status) = parser();
        parser.feed("2023-01-30T15:37:11Z INF |  https://example.trycloudflare.com");
        assert_eq!(parser.captured_url(), Some("https://example.trycloudflare.com"));
        assert_eq!(status.get(), TunnelStatus::Starting);
    }

    #[test]
    fn url_then_connection_connects() {
        let (mut parser, status) = parser();
        parser.feed("2023-01-30T15:37:11Z INF |  https://example.trycloudflare.com");
        parser.feed("2023-01-30T15:37:11Z INF Connection registered");
        assert_eq!(
            status.get(),
            TunnelStatus::Connected {
                url: "https://example.trycloudflare.com".to_string()
            }
        );
    }

    #[test]
    fn multi_line_chunk_is_processed_in_order() {
        let (mut parser, status) = parser();
        parser.feed(
            "INF |  https://example.trycloudflare.com\nINF Registered tunnel connection\n",
        );
        assert_eq!(status.get().url(), Some("https://example.trycloudflare.com"));
    }

    // A URL arriving after the first connection event is too late: the
    // session already failed.
    #[test]
    fn connection_before_url_fails_for_good() {
        let (mut parser, status) = parser();
        parser.feed("INF Connection registered");
        parser.feed("INF |  https://example.trycloudflare.com");
        parser.feed("INF Connection registered");
        assert_eq!(status.get(), TunnelStatus::error(MISSING_URL_MESSAGE));
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        let (mut parser, status) = parser();
        parser.feed("2023-01-30T15:37:11Z INF Starting metrics server");
        parser.feed("garbage");
        parser.feed("");
        assert_eq!(status.get(), TunnelStatus::Starting);
        assert!(parser.captured_url().is_none());
    }
}
