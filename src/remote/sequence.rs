//! Command sequences and their single-invocation composition.
//!
//! A sequence is sent as ONE shell invocation: every fragment is followed by
//! `"; "`, so `["a", "b"]` runs as `a; b; `. A failing fragment does not stop
//! the ones after it. Fragments that must abort the run are pushed with
//! [`CommandSequence::push_checked`], which appends `|| exit $?`.

/// Statement separator appended after every fragment.
pub const SEPARATOR: &str = "; ";

/// Suffix that turns a fragment into a short-circuiting one.
pub const CHECKED_SUFFIX: &str = " || exit $?";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSequence {
    fragments: Vec<String>,
}

impl CommandSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment that runs regardless of earlier failures and does
    /// not stop later fragments.
    pub fn push(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.fragments.push(fragment.into());
        self
    }

    /// Append a fragment that ends the whole invocation with its own exit
    /// status if it fails.
    pub fn push_checked(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.fragments
            .push(format!("{}{}", fragment.into(), CHECKED_SUFFIX));
        self
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// The single command string submitted to the remote shell.
    pub fn join(&self) -> String {
        let mut joined = String::new();
        for fragment in &self.fragments {
            joined.push_str(fragment);
            joined.push_str(SEPARATOR);
        }
        joined
    }
}

impl<S: Into<String>> FromIterator<S> for CommandSequence {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            fragments: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Quote a word for a POSIX shell.
pub fn shell_quote(word: &str) -> String {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+=:,@%".contains(c))
    {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', "'\\''"))
}
