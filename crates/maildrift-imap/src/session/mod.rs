//! Session state and the command/response cycle.
//!
//! A [`Session`] owns the buffered stream, the tag counter, the
//! response-code cache, and the configuration knobs. Exactly one command is
//! in flight at a time: [`Session::run`] serializes the command, drains the
//! reply, bumps the tag, and converts NO/BAD completions into errors while
//! recording the last error string for the accessor.

mod ops;

use std::io::Write;
use std::time::Duration;

use crate::command::{send_command, Command};
use crate::connection::{connect_plain, connect_tls, BufStream, ImapTransport, MailStream};
use crate::folder::FolderRewriter;
use crate::parser::{self, Atom, Collected, Greeting, ParseOptions, ResponseCodeCache};
use crate::trace::TraceSink;
use crate::types::{CompletionStatus, HeaderDecoder, ParseFlags, SessionState};
use crate::{Error, Result};

/// Session construction options.
///
/// The defaults match the common case: UID mode on, greeting expected, no
/// root-folder prefix, unbounded reads.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Credentials for automatic LOGIN after the greeting.
    pub credentials: Option<(String, String)>,
    /// Use UIDs for all message identifiers (id-bearing verbs gain the
    /// `UID` prefix).
    pub uid_mode: bool,
    /// Root folder prefix; empty disables rewriting.
    pub root_folder: String,
    /// Hierarchy separator.
    pub separator: char,
    /// Alternate namespace prefix also accepted as already-prefixed.
    pub alt_root: Option<String>,
    /// Match the prefixes case-insensitively.
    pub case_insensitive: bool,
    /// Consume a server greeting on construction. Turn off when adopting a
    /// stream that is already past its greeting.
    pub expect_greeting: bool,
    /// Raise parse errors on tolerable protocol anomalies.
    pub pedantic: bool,
    /// Read timeout for every wire read.
    pub timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            uid_mode: true,
            root_folder: String::new(),
            separator: '/',
            alt_root: None,
            case_insensitive: false,
            expect_greeting: true,
            pedantic: false,
            timeout: None,
        }
    }
}

impl SessionConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets credentials for automatic LOGIN.
    #[must_use]
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }

    /// Enables or disables UID mode.
    #[must_use]
    pub const fn uid_mode(mut self, on: bool) -> Self {
        self.uid_mode = on;
        self
    }

    /// Configures the root-folder prefix.
    #[must_use]
    pub fn root_folder(mut self, root: impl Into<String>, separator: char) -> Self {
        self.root_folder = root.into();
        self.separator = separator;
        self
    }

    /// Sets the alternate namespace prefix.
    #[must_use]
    pub fn alt_root(mut self, alt: impl Into<String>) -> Self {
        self.alt_root = Some(alt.into());
        self
    }

    /// Matches folder prefixes case-insensitively.
    #[must_use]
    pub const fn case_insensitive(mut self, on: bool) -> Self {
        self.case_insensitive = on;
        self
    }

    /// Controls greeting consumption.
    #[must_use]
    pub const fn expect_greeting(mut self, on: bool) -> Self {
        self.expect_greeting = on;
        self
    }

    /// Enables pedantic parsing.
    #[must_use]
    pub const fn pedantic(mut self, on: bool) -> Self {
        self.pedantic = on;
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A synchronous IMAP session over an injected transport.
pub struct Session<S: ImapTransport> {
    stream: Option<BufStream<S>>,
    state: SessionState,
    tag: u32,
    uid_mode: bool,
    rewriter: FolderRewriter,
    codes: ResponseCodeCache,
    parse_flags: ParseFlags,
    pedantic: bool,
    literal_sink: Option<Box<dyn Write + Send>>,
    decoder: Option<Box<dyn HeaderDecoder>>,
    on_folder_change: Option<Box<dyn FnMut(&str) + Send>>,
    last_error: Option<String>,
    selected: Option<String>,
}

impl Session<MailStream> {
    /// Connects to `host:port` in plaintext and builds a session.
    ///
    /// # Errors
    ///
    /// Connection errors, greeting errors, and LOGIN failures when
    /// credentials are configured.
    pub fn connect(host: &str, port: u16, config: SessionConfig) -> Result<Self> {
        if host.is_empty() {
            return Err(Error::InvalidArgument("host must not be empty".into()));
        }
        Self::new(connect_plain(host, port)?, config)
    }

    /// Connects to `host:port` with TLS and builds a session.
    ///
    /// # Errors
    ///
    /// As [`Session::connect`], plus TLS setup errors.
    pub fn connect_secure(host: &str, port: u16, config: SessionConfig) -> Result<Self> {
        if host.is_empty() {
            return Err(Error::InvalidArgument("host must not be empty".into()));
        }
        Self::new(connect_tls(host, port)?, config)
    }
}

impl<S: ImapTransport> Session<S> {
    /// Builds a session over an already-established stream.
    ///
    /// With `expect_greeting` on, the greeting decides the initial state
    /// (OK → Connected, PREAUTH → Authenticated). Without it, the stream is
    /// assumed to be past authentication already.
    ///
    /// # Errors
    ///
    /// Greeting or auto-LOGIN failures; the stream is dropped on error.
    pub fn new(stream: S, config: SessionConfig) -> Result<Self> {
        let mut buffered = BufStream::new(stream);
        buffered.set_timeout(config.timeout)?;

        let rewriter = FolderRewriter::new(
            config.root_folder.clone(),
            config.separator,
            config.alt_root.clone(),
            config.case_insensitive,
        )?;

        let mut session = Self {
            stream: Some(buffered),
            state: SessionState::Unconnected,
            tag: 1,
            uid_mode: config.uid_mode,
            rewriter,
            codes: ResponseCodeCache::default(),
            parse_flags: ParseFlags::default(),
            pedantic: config.pedantic,
            literal_sink: None,
            decoder: None,
            on_folder_change: None,
            last_error: None,
            selected: None,
        };

        if config.expect_greeting {
            if let Some(stream) = session.stream.as_mut() {
                match parser::read_greeting(stream, &mut session.codes)? {
                    Greeting::Ok(_) => session.state = SessionState::Connected,
                    Greeting::PreAuth(_) => session.state = SessionState::Authenticated,
                }
            }
        } else {
            session.state = SessionState::Authenticated;
        }
        tracing::debug!(state = ?session.state, "session established");

        if let Some((user, password)) = config.credentials {
            if session.state == SessionState::Connected {
                session.login(&user, &password)?;
            }
        }

        Ok(session)
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// The folder currently selected, if any (server-side, prefixed name).
    #[must_use]
    pub fn selected_folder(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// The message of the most recent failure.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether id-bearing verbs run in UID mode.
    #[must_use]
    pub const fn uid_mode(&self) -> bool {
        self.uid_mode
    }

    /// Switches UID mode.
    pub fn set_uid_mode(&mut self, on: bool) {
        self.uid_mode = on;
    }

    /// Replaces the parse-mode flags.
    pub fn set_parse_flags(&mut self, flags: ParseFlags) {
        self.parse_flags = flags;
    }

    /// Current parse-mode flags.
    #[must_use]
    pub const fn parse_flags(&self) -> ParseFlags {
        self.parse_flags
    }

    /// Switches pedantic parsing.
    pub fn set_pedantic(&mut self, on: bool) {
        self.pedantic = on;
    }

    /// Installs a wire trace sink.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        if let Some(stream) = self.stream.as_mut() {
            stream.set_trace(sink);
        }
    }

    /// Routes response literals into `sink` instead of memory.
    pub fn set_literal_sink(&mut self, sink: Box<dyn Write + Send>) {
        self.literal_sink = Some(sink);
    }

    /// Returns literals to in-memory accumulation.
    pub fn clear_literal_sink(&mut self) {
        self.literal_sink = None;
    }

    /// Installs the header-word decoder used when
    /// [`ParseFlags::decode_header_words`] is on.
    pub fn set_header_decoder(&mut self, decoder: Box<dyn HeaderDecoder>) {
        self.decoder = Some(decoder);
    }

    /// Registers the folder-changed callback, fired before any mutating
    /// command is sent.
    pub fn on_folder_change(&mut self, callback: Box<dyn FnMut(&str) + Send>) {
        self.on_folder_change = Some(callback);
    }

    /// Looks up a cached response code (`uidvalidity`, `exists`,
    /// `permanentflags`, `appenduid`, …).
    #[must_use]
    pub fn response_code(&self, name: &str) -> Option<Atom> {
        self.codes.get(name).cloned()
    }

    /// Removes one cached response code.
    pub fn clear_response_code(&mut self, name: &str) {
        self.codes.remove(name);
    }

    /// Empties the response-code cache.
    pub fn clear_response_codes(&mut self) {
        self.codes.clear();
    }

    /// The folder rewriter in effect.
    #[must_use]
    pub const fn rewriter(&self) -> &FolderRewriter {
        &self.rewriter
    }

    /// Reconfigures the root-folder prefix rules.
    ///
    /// # Errors
    ///
    /// Matcher compilation errors.
    pub fn set_root_folder(
        &mut self,
        root: impl Into<String>,
        separator: char,
        alt_root: Option<String>,
        case_insensitive: bool,
    ) -> Result<()> {
        self.rewriter = FolderRewriter::new(root, separator, alt_root, case_insensitive)?;
        Ok(())
    }

    /// Probes whether the connection is still usable without blocking.
    ///
    /// Quiet is live. Pending `* BYE` means the peer is leaving: the session
    /// becomes Unconnected. Other unsolicited data is consumed and ignored.
    pub fn is_open(&mut self) -> bool {
        loop {
            if self.state == SessionState::Unconnected {
                return false;
            }
            let Some(stream) = self.stream.as_mut() else {
                return false;
            };

            match stream.poll_readable(Duration::ZERO) {
                Ok(false) => return true,
                Ok(true) => match stream.read_line() {
                    Ok(line) => {
                        if line.to_ascii_uppercase().starts_with(b"* BYE") {
                            tracing::debug!("peer announced BYE");
                            self.state = SessionState::Unconnected;
                            return false;
                        }
                        // Unsolicited alert/notification: ignore and re-probe
                        tracing::debug!(
                            line = %String::from_utf8_lossy(&line),
                            "discarding unsolicited data"
                        );
                    }
                    Err(_) => {
                        self.state = SessionState::Unconnected;
                        return false;
                    }
                },
                Err(_) => {
                    self.state = SessionState::Unconnected;
                    return false;
                }
            }
        }
    }

    /// Surrenders the underlying transport.
    ///
    /// The session is consumed; no LOGOUT is attempted and buffered unread
    /// data is discarded.
    #[must_use]
    pub fn release(mut self) -> Option<S> {
        self.state = SessionState::Unconnected;
        self.stream.take().map(BufStream::into_inner)
    }

    /// Runs one command: serialize, drain the reply, bump the tag, convert
    /// negative completions to errors, record failures.
    pub(crate) fn run(&mut self, command: Command, collect: Option<&str>) -> Result<Collected> {
        let result = self.run_inner(command, collect, false);
        self.finish(result)
    }

    pub(crate) fn run_inner(
        &mut self,
        mut command: Command,
        collect: Option<&str>,
        in_logout: bool,
    ) -> Result<Collected> {
        let tag = self.tag.to_string();
        tracing::debug!(tag = %tag, verb = command.verb(), "issuing command");
        self.send_tagged(&tag, &mut command)?;

        let reply = self.read_tagged(&tag, collect, in_logout)?;

        // The completion was read: the tag is spent whatever the outcome
        self.tag += 1;

        match reply.status {
            CompletionStatus::Ok | CompletionStatus::Bye => Ok(reply.data),
            CompletionStatus::No => Err(Error::No(reply.text)),
            CompletionStatus::Bad => Err(Error::Bad(reply.text)),
        }
    }

    /// Serializes one command under an explicit tag.
    pub(crate) fn send_tagged(&mut self, tag: &str, command: &mut Command) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::InvalidState("session has been released".into()));
        };
        send_command(stream, tag, command)
    }

    /// Drains the reply for an explicit tag. Does not bump the counter.
    pub(crate) fn read_tagged(
        &mut self,
        tag: &str,
        collect: Option<&str>,
        in_logout: bool,
    ) -> Result<parser::CommandReply> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::InvalidState("session has been released".into()));
        };
        let opts = ParseOptions {
            flags: self.parse_flags,
            uid_mode: self.uid_mode,
            pedantic: self.pedantic,
            in_logout,
            decoder: self.decoder.as_deref(),
        };
        let sink: Option<&mut (dyn Write + Send)> = match self.literal_sink.as_mut() {
            Some(sink) => Some(&mut **sink as &mut (dyn Write + Send)),
            None => None,
        };
        parser::read_reply(
            stream,
            sink,
            &mut self.codes,
            tag,
            collect,
            &opts,
        )
    }

    /// Records failures and downgrades the state on fatal errors.
    pub(crate) fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.last_error = Some(e.to_string());
            if e.is_fatal() {
                tracing::warn!(error = %e, "session is no longer usable");
                self.state = SessionState::Unconnected;
            }
        }
        result
    }

    /// Builds a command whose verb gains the `UID` prefix in UID mode.
    pub(crate) fn id_command(&self, verb: &str) -> Command {
        if self.uid_mode {
            Command::new(format!("UID {verb}"))
        } else {
            Command::new(verb)
        }
    }

    /// Fires the folder-changed callback.
    pub(crate) fn notify_folder_change(&mut self, folder: &str) {
        if let Some(callback) = self.on_folder_change.as_mut() {
            callback(folder);
        }
    }

    pub(crate) fn require(&mut self, need: SessionState) -> Result<()> {
        let ok = match need {
            SessionState::Unconnected => true,
            SessionState::Connected => self.state != SessionState::Unconnected,
            SessionState::Authenticated => self.state.is_authenticated(),
            SessionState::Selected => self.state == SessionState::Selected,
        };
        if ok {
            Ok(())
        } else {
            let error = Err(Error::InvalidState(format!(
                "operation requires {need:?}, session is {:?}",
                self.state
            )));
            self.finish(error)
        }
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        if state != self.state {
            tracing::debug!(from = ?self.state, to = ?state, "state transition");
            self.state = state;
        }
    }

    pub(crate) const fn codes(&self) -> &ResponseCodeCache {
        &self.codes
    }

    pub(crate) fn codes_mut(&mut self) -> &mut ResponseCodeCache {
        &mut self.codes
    }

    pub(crate) fn rewriter_mut(&mut self) -> &mut FolderRewriter {
        &mut self.rewriter
    }

    pub(crate) fn set_selected(&mut self, folder: Option<String>) {
        self.selected = folder;
    }
}

impl<S: ImapTransport> Drop for Session<S> {
    /// Best-effort LOGOUT when dropped while logged in; failures are
    /// suppressed.
    fn drop(&mut self) {
        if self.stream.is_some() && self.state.is_authenticated() {
            let _ = self.run_inner(Command::new("LOGOUT"), None, true);
        }
    }
}
