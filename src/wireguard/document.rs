//! Line model of the daemon config (`wg0.conf`) and its client blocks.
//!
//! A client block starts at a `# Client: <name>` comment and runs up to the
//! next client block or the end of the document:
//!
//! ```text
//! # Client: alice
//! [Peer]
//! PublicKey = PKALICE
//! AllowedIPs = 10.0.0.2/32
//!
//! # Client: bob
//! ...
//! ```
//!
//! When the comment sits inside the section (`[Peer]` then `# Client: bob`),
//! the block starts at the `[Peer]` header instead.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

/// How many lines above a `PublicKey` line a client comment may sit.
pub const NAME_LOOKBACK: usize = 2;

const CLIENT_PREFIX: &str = "client:";
const PEER_HEADER: &str = "[peer]";

/// A named block in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientBlock {
    pub name: String,
    /// Line range, comment line (or its `[Peer]` header) included, end exclusive.
    pub lines: Range<usize>,
    pub public_key: Option<String>,
}

/// The config file as an ordered list of lines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigDocument {
    lines: Vec<String>,
    trailing_newline: bool,
    crlf: bool,
}

impl ConfigDocument {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            trailing_newline: text.ends_with('\n'),
            crlf: text.contains("\r\n"),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Name from the client comment at most two lines above the first
    /// `PublicKey` line whose value is exactly `public_key`.
    pub fn find_client_name(&self, public_key: &str) -> Option<String> {
        let idx = self
            .lines
            .iter()
            .position(|line| setting_value(line, "PublicKey") == Some(public_key))?;

        (1..=NAME_LOOKBACK)
            .filter_map(|back| idx.checked_sub(back))
            .find_map(|j| client_comment_name(&self.lines[j]))
            .map(str::to_string)
    }

    /// Public key to client name for every `PublicKey` line that has a name.
    /// Each key resolves the same way as [`find_client_name`](Self::find_client_name).
    pub fn pubkey_to_name(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for line in &self.lines {
            if let Some(key) = setting_value(line, "PublicKey") {
                if map.contains_key(key) {
                    continue;
                }
                if let Some(name) = self.find_client_name(key) {
                    map.insert(key.to_string(), name);
                }
            }
        }
        map
    }

    /// Index of the first comment naming `name` (case-insensitive).
    fn client_comment_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        self.lines.iter().position(|line| {
            client_comment_name(line).map(str::to_lowercase).as_deref() == Some(wanted.as_str())
        })
    }

    pub fn has_client(&self, name: &str) -> bool {
        self.client_comment_index(name).is_some()
    }

    /// First line of the block whose client comment is at `comment`: a
    /// `[Peer]` header directly above it, or the comment itself.
    fn block_start(&self, comment: usize) -> usize {
        match comment.checked_sub(1) {
            Some(j) if self.lines[j].trim().eq_ignore_ascii_case(PEER_HEADER) => j,
            _ => comment,
        }
    }

    /// End (exclusive) of the block whose client comment is at `comment`.
    fn block_end(&self, comment: usize) -> usize {
        self.lines[comment + 1..]
            .iter()
            .position(|line| client_comment_name(line).is_some())
            .map(|offset| self.block_start(comment + 1 + offset))
            .unwrap_or(self.lines.len())
    }

    fn block_at(&self, comment: usize) -> Option<ClientBlock> {
        let name = client_comment_name(&self.lines[comment])?.to_string();
        let start = self.block_start(comment);
        let end = self.block_end(comment);
        let public_key = self.lines[start..end]
            .iter()
            .find_map(|line| setting_value(line, "PublicKey"))
            .map(str::to_string);
        Some(ClientBlock {
            name,
            lines: start..end,
            public_key,
        })
    }

    /// All named blocks in document order.
    pub fn client_blocks(&self) -> Vec<ClientBlock> {
        (0..self.lines.len())
            .filter_map(|i| self.block_at(i))
            .collect()
    }

    /// Remove the block named `name`. Returns the removed block, or `None`
    /// (document untouched) when no comment names it.
    pub fn remove_client_block(&mut self, name: &str) -> Option<ClientBlock> {
        let comment = self.client_comment_index(name)?;
        let block = self.block_at(comment)?;
        self.lines.drain(block.lines.clone());

        // The last block took the end of the file with it; drop the blank
        // separator lines it leaves behind.
        if block.lines.start == self.lines.len() {
            while self.lines.last().map_or(false, |l| l.trim().is_empty()) {
                self.lines.pop();
            }
        }
        Some(block)
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let eol = if self.crlf { "\r\n" } else { "\n" };
        write!(f, "{}", self.lines.join(eol))?;
        if self.trailing_newline && !self.lines.is_empty() {
            f.write_str(eol)?;
        }
        Ok(())
    }
}

/// `<name>` from a `# Client: <name>` comment; the label is case-insensitive.
pub fn client_comment_name(line: &str) -> Option<&str> {
    let body = line.trim().strip_prefix('#')?.trim_start();
    let label = body.get(..CLIENT_PREFIX.len())?;
    if !label.eq_ignore_ascii_case(CLIENT_PREFIX) {
        return None;
    }
    let name = body[CLIENT_PREFIX.len()..].trim();
    (!name.is_empty()).then_some(name)
}

/// Value of a `Key = value` line, matching the key exactly.
pub fn setting_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (k, v) = line.trim().split_once('=')?;
    (k.trim() == key).then(|| v.trim())
}
