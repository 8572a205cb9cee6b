//! Wildcard expansion of unquoted `*` against the filesystem.

use crate::env::Environment;
use ::glob::{MatchOptions, Pattern};
use log::{trace, warn};
use regex::Regex;
use std::path::Path;

/// Regex fragment an unquoted `*` stands for.
const WILDCARD: &str = "[^/]*";

/// One argument under construction, kept in two forms at once.
///
/// `literal` is what the user would get back if nothing matches; `pattern`
/// is the same text as a regex where every literal character is escaped and
/// every unquoted `*` is a wildcard. Both grow in lockstep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobArgument {
    literal: String,
    pattern: String,
    /// Byte offset in `literal` of the first unquoted `*`.
    first_wildcard: Option<usize>,
    /// Set once a quoted span was closed, so `''` still yields an argument.
    quoted: bool,
}

impl GlobArgument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a character that must match itself.
    pub fn push_literal(&mut self, ch: char) {
        self.literal.push(ch);
        let mut buf = [0; 4];
        self.pattern.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
    }

    /// Append text that must match itself.
    pub fn push_str(&mut self, text: &str) {
        self.literal.push_str(text);
        self.pattern.push_str(&regex::escape(text));
    }

    /// Append an unquoted `*`.
    pub fn push_wildcard(&mut self) {
        self.first_wildcard.get_or_insert(self.literal.len());
        self.literal.push('*');
        self.pattern.push_str(WILDCARD);
    }

    pub fn mark_quoted(&mut self) {
        self.quoted = true;
    }

    /// Whether an unquoted `*` was seen.
    pub fn is_glob(&self) -> bool {
        self.first_wildcard.is_some()
    }

    /// An argument exists once it has text or a (possibly empty) quoted span.
    pub fn is_present(&self) -> bool {
        self.quoted || !self.literal.is_empty()
    }

    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// Expand against the filesystem.
    ///
    /// Returns the matching paths sorted by byte order, spelled the way the
    /// pattern spells them: relative patterns give paths relative to the
    /// current directory rather than absolute ones, absolute patterns give
    /// absolute paths. When nothing matches, or the argument holds no
    /// wildcard, the literal text is returned alone.
    pub fn expand(&self, env: &Environment) -> Vec<String> {
        let Some(first) = self.first_wildcard else {
            return vec![self.literal.clone()];
        };

        let re = match Regex::new(&format!("^(?:{})$", self.pattern)) {
            Ok(re) => re,
            Err(e) => {
                warn!("glob {:?} did not compile: {e}", self.literal);
                return vec![self.literal.clone()];
            }
        };

        // Walk from the last directory written before the first wildcard.
        let prefix_end = self.literal[..first].rfind('/').map_or(0, |i| i + 1);
        let prefix = &self.literal[..prefix_end];
        let root = env.resolve(prefix);
        let rest = self.literal[prefix_end..].trim_end_matches('/');
        let walk = Walk {
            re: &re,
            dirs_only: self.literal.ends_with('/'),
        };

        let mut found = Vec::new();
        walk.visit(&root, prefix, rest.matches('/').count() + 1, &mut found);
        trace!("glob {:?} under {} matched {:?}", self.literal, root.display(), found);

        if found.is_empty() {
            vec![self.literal.clone()]
        } else {
            found.sort();
            found
        }
    }
}

struct Walk<'a> {
    re: &'a Regex,
    dirs_only: bool,
}

impl Walk<'_> {
    /// Test every entry below `root`, at most `depth` levels down.
    ///
    /// `spelled` is how `root` appears in the pattern, with a trailing `/`
    /// unless it is empty. Hidden entries are never listed.
    fn visit(&self, root: &Path, spelled: &str, depth: usize, found: &mut Vec<String>) {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: true,
        };
        let mut layer = Pattern::escape(&root.to_string_lossy())
            .trim_end_matches('/')
            .to_string();

        for _ in 0..depth {
            layer.push_str("/*");
            let paths = match ::glob::glob_with(&layer, options) {
                Ok(paths) => paths,
                Err(e) => {
                    warn!("cannot list {layer:?}: {e}");
                    return;
                }
            };
            for entry in paths {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        trace!("skipping unreadable entry: {e}");
                        continue;
                    }
                };
                if let Some(tested) = self
                    .spell(root, &path, spelled)
                    .filter(|t| self.re.is_match(t))
                {
                    found.push(tested);
                }
            }
        }
    }

    /// `path` as the pattern would spell it, `/`-suffixed for directories
    /// when only directories are wanted.
    fn spell(&self, root: &Path, path: &Path, spelled: &str) -> Option<String> {
        let rel = path.strip_prefix(root).ok()?.to_str()?;
        let candidate = format!("{spelled}{rel}");
        if self.dirs_only && path.is_dir() {
            Some(format!("{candidate}/"))
        } else {
            Some(candidate)
        }
    }
}
