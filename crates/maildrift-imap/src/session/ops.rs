//! The public operations façade: one method per IMAP verb.
//!
//! Every method rewrites folder-name arguments through the prefix rules,
//! delegates to the serializer/parser pair, fires the folder-changed
//! callback for mutating verbs before the command is sent, and gates
//! extension verbs on the memoized capability map.

use std::collections::BTreeMap;

use super::Session;
use crate::command::{Command, LiteralSource};
use crate::connection::ImapTransport;
use crate::parser::{Atom, Collected, FetchRecord};
use crate::types::{FolderSummary, ListEntry, SessionState, StatusEntry};
use crate::{Error, Result};

impl<S: ImapTransport> Session<S> {
    // ---- authentication ----------------------------------------------

    /// Authenticates with plaintext LOGIN.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless the session is freshly connected;
    /// [`Error::No`]/[`Error::Bad`] when the server rejects the credentials.
    pub fn login(&mut self, user: &str, password: &str) -> Result<()> {
        if self.state() != SessionState::Connected {
            let error = Err(Error::InvalidState(format!(
                "LOGIN requires Connected, session is {:?}",
                self.state()
            )));
            return self.finish(error);
        }

        let command = Command::new("LOGIN").arg(user).quoted(password);
        self.run(command, None)?;
        self.set_state(SessionState::Authenticated);
        Ok(())
    }

    /// Logs out. The session is Unconnected afterwards even on failure.
    ///
    /// # Errors
    ///
    /// I/O errors encountered while completing the handshake.
    pub fn logout(&mut self) -> Result<()> {
        if self.state() == SessionState::Unconnected {
            return Ok(());
        }

        let result = self.run_inner(Command::new("LOGOUT"), None, true);
        self.set_state(SessionState::Unconnected);
        self.set_selected(None);
        self.finish(result).map(|_| ())
    }

    /// NOOP: a keep-alive that also drains pending unsolicited responses
    /// into the response-code cache.
    ///
    /// # Errors
    ///
    /// Protocol or I/O failures.
    pub fn noop(&mut self) -> Result<()> {
        self.require(SessionState::Connected)?;
        self.run(Command::new("NOOP"), None).map(|_| ())
    }

    /// CHECK: requests a server-side checkpoint of the selected folder.
    ///
    /// # Errors
    ///
    /// Protocol or I/O failures; requires a selected folder.
    pub fn check(&mut self) -> Result<()> {
        self.require(SessionState::Selected)?;
        self.run(Command::new("CHECK"), None).map(|_| ())
    }

    /// Returns the capability map, keyed by lowercase capability name with
    /// any `=` arguments collected per key.
    ///
    /// The first call asks the server; later calls reuse the cached result
    /// (a `[CAPABILITY …]` greeting code pre-fills it for free).
    ///
    /// # Errors
    ///
    /// Protocol or I/O failures on the initial fetch.
    pub fn capability(&mut self) -> Result<BTreeMap<String, Vec<String>>> {
        self.require(SessionState::Connected)?;

        if self.codes().get("capability").is_none() {
            self.run(Command::new("CAPABILITY"), None)?;
        }

        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if let Some(Atom::List(words)) = self.response_code("capability") {
            for word in words {
                let Some(text) = word.as_text() else { continue };
                let lower = text.to_lowercase();
                match lower.split_once('=') {
                    Some((name, value)) => {
                        map.entry(name.to_string()).or_default().push(value.to_string());
                    }
                    None => {
                        map.entry(lower).or_default();
                    }
                }
            }
        }
        Ok(map)
    }

    /// Tests one capability, `name` or `name=value`.
    ///
    /// # Errors
    ///
    /// As [`Session::capability`].
    pub fn has_capability(&mut self, name: &str) -> Result<bool> {
        let caps = self.capability()?;
        let lower = name.to_lowercase();
        Ok(match lower.split_once('=') {
            Some((name, value)) => caps
                .get(name)
                .is_some_and(|values| values.iter().any(|v| v == value)),
            None => caps.contains_key(&lower),
        })
    }

    fn require_capability(&mut self, name: &str) -> Result<()> {
        if self.has_capability(name)? {
            Ok(())
        } else {
            let error = Err(Error::MissingCapability(name.to_string()));
            self.finish(error)
        }
    }

    /// Returns the NAMESPACE data, memoized after the first call.
    ///
    /// # Errors
    ///
    /// Capability gate and protocol failures.
    pub fn namespace(&mut self) -> Result<Atom> {
        self.require(SessionState::Authenticated)?;
        self.require_capability("namespace")?;

        if self.codes().get("namespace").is_none() {
            self.run(Command::new("NAMESPACE"), None)?;
        }
        let result = self
            .response_code("namespace")
            .ok_or_else(|| Error::parse(0, "server sent no NAMESPACE data"));
        self.finish(result)
    }

    // ---- folder selection --------------------------------------------

    /// Selects a folder read-write and returns its side-channel summary.
    ///
    /// # Errors
    ///
    /// Protocol or I/O failures; requires authentication.
    pub fn select(&mut self, folder: &str) -> Result<FolderSummary> {
        self.open_folder("SELECT", folder, false)
    }

    /// Opens a folder read-only.
    ///
    /// # Errors
    ///
    /// As [`Session::select`].
    pub fn examine(&mut self, folder: &str) -> Result<FolderSummary> {
        self.open_folder("EXAMINE", folder, true)
    }

    fn open_folder(&mut self, verb: &str, folder: &str, read_only: bool) -> Result<FolderSummary> {
        self.require(SessionState::Authenticated)?;
        let name = self.rewriter().rewrite(folder);

        self.run(Command::new(verb).arg(name.clone()), None)?;
        self.set_state(SessionState::Selected);
        self.set_selected(Some(name));
        Ok(self.folder_summary(read_only))
    }

    /// Assembles the SELECT/EXAMINE side-channel data from the cache.
    fn folder_summary(&self, examine: bool) -> FolderSummary {
        let codes = self.codes();
        FolderSummary {
            exists: codes.get_u32("exists").unwrap_or(0),
            recent: codes.get_u32("recent").unwrap_or(0),
            uidvalidity: codes.get_u32("uidvalidity"),
            uidnext: codes.get_u32("uidnext"),
            unseen: codes.get_u32("unseen"),
            flags: text_list(codes.get("flags")),
            permanent_flags: text_list(codes.get("permanentflags")),
            read_only: examine
                || codes.get("foldermode").and_then(Atom::as_text) == Some("read-only"),
        }
    }

    /// Closes the selected folder, expunging deleted messages.
    ///
    /// # Errors
    ///
    /// Protocol or I/O failures; requires a selected folder.
    pub fn close(&mut self) -> Result<()> {
        self.require(SessionState::Selected)?;
        self.run(Command::new("CLOSE"), None)?;
        self.set_state(SessionState::Authenticated);
        self.set_selected(None);
        Ok(())
    }

    /// Leaves the selected folder without expunging (requires the UNSELECT
    /// capability).
    ///
    /// # Errors
    ///
    /// Capability gate and protocol failures.
    pub fn unselect(&mut self) -> Result<()> {
        self.require(SessionState::Selected)?;
        self.require_capability("unselect")?;
        self.run(Command::new("UNSELECT"), None)?;
        self.set_state(SessionState::Authenticated);
        self.set_selected(None);
        Ok(())
    }

    // ---- folder management -------------------------------------------

    /// Creates a folder.
    ///
    /// # Errors
    ///
    /// Protocol or I/O failures; requires authentication.
    pub fn create(&mut self, folder: &str) -> Result<()> {
        self.folder_mutation("CREATE", folder)
    }

    /// Deletes a folder.
    ///
    /// # Errors
    ///
    /// As [`Session::create`].
    pub fn delete(&mut self, folder: &str) -> Result<()> {
        self.folder_mutation("DELETE", folder)
    }

    fn folder_mutation(&mut self, verb: &str, folder: &str) -> Result<()> {
        self.require(SessionState::Authenticated)?;
        let name = self.rewriter().rewrite(folder);
        self.notify_folder_change(&name);
        self.run(Command::new(verb).arg(name), None).map(|_| ())
    }

    /// Renames a folder. The change callback fires for both names.
    ///
    /// # Errors
    ///
    /// As [`Session::create`].
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.require(SessionState::Authenticated)?;
        let from = self.rewriter().rewrite(from);
        let to = self.rewriter().rewrite(to);
        self.notify_folder_change(&from);
        self.notify_folder_change(&to);
        self.run(Command::new("RENAME").arg(from).arg(to), None)
            .map(|_| ())
    }

    /// Subscribes to a folder.
    ///
    /// # Errors
    ///
    /// Protocol or I/O failures; requires authentication.
    pub fn subscribe(&mut self, folder: &str) -> Result<()> {
        self.require(SessionState::Authenticated)?;
        let name = self.rewriter().rewrite(folder);
        self.run(Command::new("SUBSCRIBE").arg(name), None).map(|_| ())
    }

    /// Unsubscribes from a folder.
    ///
    /// # Errors
    ///
    /// As [`Session::subscribe`].
    pub fn unsubscribe(&mut self, folder: &str) -> Result<()> {
        self.require(SessionState::Authenticated)?;
        let name = self.rewriter().rewrite(folder);
        self.run(Command::new("UNSUBSCRIBE").arg(name), None)
            .map(|_| ())
    }

    /// Lists folders matching `pattern` under `reference`.
    ///
    /// Reported names come back prefix-stripped; a differing hierarchy
    /// separator in the results reconfigures the rewriter.
    ///
    /// # Errors
    ///
    /// Protocol or I/O failures; requires authentication.
    pub fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListEntry>> {
        self.list_command("LIST", "list", reference, pattern)
    }

    /// Lists subscribed folders.
    ///
    /// # Errors
    ///
    /// As [`Session::list`].
    pub fn lsub(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListEntry>> {
        self.list_command("LSUB", "lsub", reference, pattern)
    }

    fn list_command(
        &mut self,
        verb: &str,
        collect: &str,
        reference: &str,
        pattern: &str,
    ) -> Result<Vec<ListEntry>> {
        self.require(SessionState::Authenticated)?;
        let pattern = self.rewriter().rewrite(pattern);

        let command = Command::new(verb).arg(reference).arg(pattern);
        let data = self.run(command, Some(collect))?;
        let Collected::List(raw) = data else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::with_capacity(raw.len());
        for (attributes, delimiter, name) in raw {
            if let Some(sep) = delimiter {
                let adopted = self.rewriter_mut().adopt_separator(sep);
                self.finish(adopted)?;
            }
            entries.push(ListEntry {
                attributes,
                delimiter,
                name: self.rewriter().strip(&name),
            });
        }
        Ok(entries)
    }

    /// STATUS for one folder.
    ///
    /// # Errors
    ///
    /// Protocol or I/O failures, or a reply with no STATUS line.
    pub fn status(&mut self, folder: &str, items: &[&str]) -> Result<StatusEntry> {
        self.require(SessionState::Authenticated)?;
        let name = self.rewriter().rewrite(folder);
        let items = format!("({})", items.join(" "));

        let data = self.run(Command::new("STATUS").arg(name).raw(items), Some("status"))?;
        let entry = match data {
            Collected::Status(mut entries) if !entries.is_empty() => {
                let (name, items) = entries.remove(0);
                Ok(StatusEntry {
                    name: self.rewriter().strip(&name),
                    items,
                })
            }
            _ => Err(Error::parse(0, "server sent no STATUS line")),
        };
        self.finish(entry)
    }

    /// Batched STATUS: sends one command per folder back-to-back, then
    /// reads the tagged completions in issue order, attributing untagged
    /// STATUS lines to the command whose completion follows.
    ///
    /// Folders the server refuses are skipped (the error is recorded as the
    /// last error); wire-level failures abort the batch.
    ///
    /// # Errors
    ///
    /// I/O or parse failures.
    pub fn status_many(&mut self, folders: &[&str], items: &[&str]) -> Result<Vec<StatusEntry>> {
        self.require(SessionState::Authenticated)?;
        let items = format!("({})", items.join(" "));
        let names: Vec<String> = folders
            .iter()
            .map(|folder| self.rewriter.rewrite(folder))
            .collect();

        // Send phase: tags t, t+1, … without waiting
        let base = self.tag;
        for (i, name) in names.iter().enumerate() {
            let tag = (base + i as u32).to_string();
            let mut command = Command::new("STATUS").arg(name.clone()).raw(items.clone());
            let sent = self.send_tagged(&tag, &mut command);
            self.finish(sent)?;
        }

        // Read phase: completions arrive in issue order
        let mut entries = Vec::new();
        for i in 0..names.len() {
            let tag = (base + i as u32).to_string();
            let read_result = self.read_tagged(&tag, Some("status"), false);
            let reply = self.finish(read_result)?;
            self.tag += 1;

            match reply.status {
                crate::types::CompletionStatus::Ok => {
                    if let Collected::Status(batch) = reply.data {
                        for (name, items) in batch {
                            entries.push(StatusEntry {
                                name: self.rewriter.strip(&name),
                                items,
                            });
                        }
                    }
                }
                _ => {
                    // Per-folder refusal: note it and keep draining the batch
                    self.last_error = Some(reply.text);
                }
            }
        }

        Ok(entries)
    }

    // ---- messages ----------------------------------------------------

    /// Appends a message to a folder.
    ///
    /// `flags` is a pre-formed list like `(\Seen)`; `date` an INTERNALDATE
    /// string. The assigned UID, if the server reports one, is retrievable
    /// as the `appenduid` response code.
    ///
    /// # Errors
    ///
    /// Protocol or I/O failures; requires authentication.
    pub fn append(
        &mut self,
        folder: &str,
        message: impl Into<Vec<u8>>,
        flags: Option<&str>,
        date: Option<&str>,
    ) -> Result<()> {
        self.require(SessionState::Authenticated)?;
        let name = self.rewriter().rewrite(folder);
        self.notify_folder_change(&name);

        let mut command = Command::new("APPEND").arg(name);
        if let Some(flags) = flags {
            command = command.raw(flags);
        }
        if let Some(date) = date {
            command = command.arg(date);
        }
        command = command.literal(message.into());

        self.run(command, None).map(|_| ())
    }

    /// Appends a message streamed from a seekable source, sized by seeking.
    ///
    /// # Errors
    ///
    /// As [`Session::append`], plus source read failures.
    pub fn append_stream(
        &mut self,
        folder: &str,
        source: Box<dyn LiteralSource>,
        flags: Option<&str>,
        date: Option<&str>,
    ) -> Result<()> {
        self.require(SessionState::Authenticated)?;
        let name = self.rewriter().rewrite(folder);
        self.notify_folder_change(&name);

        let mut command = Command::new("APPEND").arg(name);
        if let Some(flags) = flags {
            command = command.raw(flags);
        }
        if let Some(date) = date {
            command = command.arg(date);
        }
        command = command.stream(source);

        self.run(command, None).map(|_| ())
    }

    /// Fetches message data.
    ///
    /// `set` is an id set (`1:5`, `1:*`); `items` the item or item list
    /// (`FLAGS`, `(FLAGS UID BODY[TEXT])`). In UID mode the set names UIDs
    /// and results are keyed by UID.
    ///
    /// # Errors
    ///
    /// Protocol or I/O failures; requires a selected folder.
    pub fn fetch(&mut self, set: &str, items: &str) -> Result<BTreeMap<u32, FetchRecord>> {
        self.require(SessionState::Selected)?;
        let command = self.id_command("FETCH").raw(set).raw(items);
        match self.run(command, Some("fetch"))? {
            Collected::Fetch(map) => Ok(map),
            _ => Ok(BTreeMap::new()),
        }
    }

    /// Fetches just the flags of a set, through the general parser.
    ///
    /// # Errors
    ///
    /// As [`Session::fetch`].
    pub fn fetch_flags(&mut self, set: &str) -> Result<BTreeMap<u32, Vec<String>>> {
        let records = self.fetch(set, "(FLAGS UID)")?;
        Ok(records
            .into_iter()
            .map(|(id, record)| (id, record.flags.unwrap_or_default()))
            .collect())
    }

    /// SEARCH with caller-composed criteria (`UNSEEN SINCE 1-Jan-2026`).
    ///
    /// # Errors
    ///
    /// Protocol or I/O failures; requires a selected folder.
    pub fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        self.require(SessionState::Selected)?;
        let command = self.id_command("SEARCH").raw(criteria);
        match self.run(command, Some("search"))? {
            Collected::Ids(ids) => Ok(ids),
            _ => Ok(Vec::new()),
        }
    }

    /// SORT (requires the SORT capability).
    ///
    /// `program` is a pre-formed list like `(REVERSE DATE)`.
    ///
    /// # Errors
    ///
    /// Capability gate and protocol failures.
    pub fn sort(&mut self, program: &str, charset: &str, criteria: &str) -> Result<Vec<u32>> {
        self.require(SessionState::Selected)?;
        self.require_capability("sort")?;
        let command = self
            .id_command("SORT")
            .raw(program)
            .raw(charset)
            .raw(criteria);
        match self.run(command, Some("sort"))? {
            Collected::Ids(ids) => Ok(ids),
            _ => Ok(Vec::new()),
        }
    }

    /// THREAD (requires a THREAD= capability). Returns the raw thread
    /// forest atoms.
    ///
    /// # Errors
    ///
    /// Capability gate and protocol failures.
    pub fn thread(&mut self, algorithm: &str, charset: &str, criteria: &str) -> Result<Vec<Atom>> {
        self.require(SessionState::Selected)?;
        self.require_capability("thread")?;
        let command = self
            .id_command("THREAD")
            .raw(algorithm)
            .raw(charset)
            .raw(criteria);
        let data = self.run(command, Some("thread"))?;
        Ok(strip_verb_markers(data))
    }

    /// STORE: changes flags on a set. `operation` is `FLAGS`, `+FLAGS`,
    /// `-FLAGS`, or a `.SILENT` variant; `flags` a pre-formed list.
    ///
    /// Returns the FETCH echoes non-silent stores produce.
    ///
    /// # Errors
    ///
    /// Protocol or I/O failures; requires a selected folder.
    pub fn store(
        &mut self,
        set: &str,
        operation: &str,
        flags: &str,
    ) -> Result<BTreeMap<u32, FetchRecord>> {
        self.require(SessionState::Selected)?;
        if let Some(folder) = self.selected_folder().map(str::to_string) {
            self.notify_folder_change(&folder);
        }

        let command = self.id_command("STORE").raw(set).raw(operation).raw(flags);
        match self.run(command, Some("fetch"))? {
            Collected::Fetch(map) => Ok(map),
            _ => Ok(BTreeMap::new()),
        }
    }

    /// COPY: copies a set into another folder. The assigned UIDs, when the
    /// server supports UIDPLUS, land in the `copyuid` response code.
    ///
    /// # Errors
    ///
    /// Protocol or I/O failures; requires a selected folder.
    pub fn copy(&mut self, set: &str, folder: &str) -> Result<()> {
        self.require(SessionState::Selected)?;
        let name = self.rewriter().rewrite(folder);
        self.notify_folder_change(&name);

        let command = self.id_command("COPY").raw(set).arg(name);
        self.run(command, None).map(|_| ())
    }

    /// EXPUNGE: removes messages flagged `\Deleted`.
    ///
    /// The cached `exists`/`recent` counts are stale afterwards and are
    /// invalidated.
    ///
    /// # Errors
    ///
    /// Protocol or I/O failures; requires a selected folder.
    pub fn expunge(&mut self) -> Result<()> {
        self.require(SessionState::Selected)?;
        if let Some(folder) = self.selected_folder().map(str::to_string) {
            self.notify_folder_change(&folder);
        }

        self.run(Command::new("EXPUNGE"), None)?;
        self.codes_mut().remove("exists");
        self.codes_mut().remove("recent");
        Ok(())
    }

    /// UID EXPUNGE: expunges only the given UID set (requires UIDPLUS).
    ///
    /// # Errors
    ///
    /// Capability gate and protocol failures.
    pub fn uid_expunge(&mut self, set: &str) -> Result<()> {
        self.require(SessionState::Selected)?;
        self.require_capability("uidplus")?;
        if let Some(folder) = self.selected_folder().map(str::to_string) {
            self.notify_folder_change(&folder);
        }

        self.run(Command::new("UID EXPUNGE").raw(set), None)?;
        self.codes_mut().remove("exists");
        self.codes_mut().remove("recent");
        Ok(())
    }

    // ---- extensions --------------------------------------------------

    /// GETQUOTA (requires QUOTA). Returns the QUOTA lines.
    ///
    /// # Errors
    ///
    /// Capability gate and protocol failures.
    pub fn getquota(&mut self, root: &str) -> Result<Vec<Atom>> {
        self.require(SessionState::Authenticated)?;
        self.require_capability("quota")?;
        let data = self.run(Command::new("GETQUOTA").arg(root), Some("quota"))?;
        Ok(strip_verb_markers(data))
    }

    /// GETQUOTAROOT (requires QUOTA). Returns the QUOTAROOT and QUOTA
    /// lines, each led by its verb.
    ///
    /// # Errors
    ///
    /// Capability gate and protocol failures.
    pub fn getquotaroot(&mut self, folder: &str) -> Result<Vec<Atom>> {
        self.require(SessionState::Authenticated)?;
        self.require_capability("quota")?;
        let name = self.rewriter().rewrite(folder);
        match self.run(Command::new("GETQUOTAROOT").arg(name), Some("quota"))? {
            Collected::Atoms(lines) => Ok(lines),
            _ => Ok(Vec::new()),
        }
    }

    /// SETQUOTA (requires QUOTA). `limits` is a pre-formed list like
    /// `(STORAGE 512000)`.
    ///
    /// # Errors
    ///
    /// Capability gate and protocol failures.
    pub fn setquota(&mut self, root: &str, limits: &str) -> Result<()> {
        self.require(SessionState::Authenticated)?;
        self.require_capability("quota")?;
        self.run(Command::new("SETQUOTA").arg(root).raw(limits), None)
            .map(|_| ())
    }

    /// GETACL (requires ACL). Returns the ACL lines.
    ///
    /// # Errors
    ///
    /// Capability gate and protocol failures.
    pub fn getacl(&mut self, folder: &str) -> Result<Vec<Atom>> {
        self.require(SessionState::Authenticated)?;
        self.require_capability("acl")?;
        let name = self.rewriter().rewrite(folder);
        let data = self.run(Command::new("GETACL").arg(name), Some("acl"))?;
        Ok(strip_verb_markers(data))
    }

    /// SETACL (requires ACL).
    ///
    /// # Errors
    ///
    /// Capability gate and protocol failures.
    pub fn setacl(&mut self, folder: &str, identifier: &str, rights: &str) -> Result<()> {
        self.require(SessionState::Authenticated)?;
        self.require_capability("acl")?;
        let name = self.rewriter().rewrite(folder);
        self.run(
            Command::new("SETACL").arg(name).arg(identifier).arg(rights),
            None,
        )
        .map(|_| ())
    }

    /// DELETEACL (requires ACL).
    ///
    /// # Errors
    ///
    /// Capability gate and protocol failures.
    pub fn deleteacl(&mut self, folder: &str, identifier: &str) -> Result<()> {
        self.require(SessionState::Authenticated)?;
        self.require_capability("acl")?;
        let name = self.rewriter().rewrite(folder);
        self.run(Command::new("DELETEACL").arg(name).arg(identifier), None)
            .map(|_| ())
    }

    /// LISTRIGHTS (requires ACL). Returns the LISTRIGHTS line atoms.
    ///
    /// # Errors
    ///
    /// Capability gate and protocol failures.
    pub fn listrights(&mut self, folder: &str, identifier: &str) -> Result<Vec<Atom>> {
        self.require(SessionState::Authenticated)?;
        self.require_capability("acl")?;
        let name = self.rewriter().rewrite(folder);
        let data = self.run(
            Command::new("LISTRIGHTS").arg(name).arg(identifier),
            Some("listrights"),
        )?;
        Ok(strip_verb_markers(data))
    }

    /// MYRIGHTS (requires ACL). Returns the MYRIGHTS line atoms.
    ///
    /// # Errors
    ///
    /// Capability gate and protocol failures.
    pub fn myrights(&mut self, folder: &str) -> Result<Vec<Atom>> {
        self.require(SessionState::Authenticated)?;
        self.require_capability("acl")?;
        let name = self.rewriter().rewrite(folder);
        let data = self.run(Command::new("MYRIGHTS").arg(name), Some("myrights"))?;
        Ok(strip_verb_markers(data))
    }

    /// GETANNOTATION (requires ANNOTATEMORE). Returns the ANNOTATION lines.
    ///
    /// # Errors
    ///
    /// Capability gate and protocol failures.
    pub fn getannotation(
        &mut self,
        folder: &str,
        entry: &str,
        attribute: &str,
    ) -> Result<Vec<Atom>> {
        self.require(SessionState::Authenticated)?;
        self.require_capability("annotatemore")?;
        let name = self.rewriter().rewrite(folder);
        let data = self.run(
            Command::new("GETANNOTATION")
                .arg(name)
                .quoted(entry)
                .quoted(attribute),
            Some("annotation"),
        )?;
        Ok(strip_verb_markers(data))
    }

    /// SETANNOTATION (requires ANNOTATEMORE). `value` is a pre-formed
    /// attribute/value list.
    ///
    /// # Errors
    ///
    /// Capability gate and protocol failures.
    pub fn setannotation(&mut self, folder: &str, entry: &str, value: &str) -> Result<()> {
        self.require(SessionState::Authenticated)?;
        self.require_capability("annotatemore")?;
        let name = self.rewriter().rewrite(folder);
        self.run(
            Command::new("SETANNOTATION").arg(name).quoted(entry).raw(value),
            None,
        )
        .map(|_| ())
    }
}

/// Unwraps a generic collection, dropping the per-line verb marker.
fn strip_verb_markers(data: Collected) -> Vec<Atom> {
    let Collected::Atoms(lines) = data else {
        return Vec::new();
    };
    lines
        .into_iter()
        .map(|line| match line {
            Atom::List(mut atoms) => {
                if !atoms.is_empty() {
                    atoms.remove(0);
                }
                Atom::List(atoms)
            }
            other => other,
        })
        .collect()
}

/// A cached list atom as plain strings.
fn text_list(atom: Option<&Atom>) -> Vec<String> {
    atom.and_then(Atom::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(|a| a.as_text().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
