// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;
use std::ops::Add;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Safety {
    IsSafe,
    #[default]
    IsNotSafe,
}

/// A string tagged with whether it still needs HTML escaping.
///
/// Any operation that changes characters drops the string back to
/// [`Safety::IsNotSafe`]; only trimming and slicing keep the tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SafeString {
    text: String,
    safety: Safety,
    needs_escape: bool,
}

impl SafeString {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            safety: Safety::IsNotSafe,
            needs_escape: false,
        }
    }

    pub fn safe(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            safety: Safety::IsSafe,
            needs_escape: false,
        }
    }

    pub fn with_safety(text: impl Into<String>, safety: Safety) -> Self {
        Self {
            text: text.into(),
            safety,
            needs_escape: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_safe(&self) -> bool {
        self.safety == Safety::IsSafe
    }

    pub fn safety(&self) -> Safety {
        self.safety
    }

    pub fn needs_escape(&self) -> bool {
        self.needs_escape
    }

    pub fn set_safety(&mut self, safety: Safety) {
        self.safety = safety;
    }

    pub fn mark_safe(mut self) -> Self {
        self.safety = Safety::IsSafe;
        self
    }

    /// Defers escaping to output time. Already-safe strings are left alone.
    pub fn mark_for_escaping(mut self) -> Self {
        if !self.is_safe() {
            self.needs_escape = true;
        }
        self
    }

    pub fn set_needs_escape(&mut self, needs_escape: bool) {
        self.needs_escape = needs_escape;
    }

    pub fn push_str(&mut self, other: &SafeString) {
        self.text.push_str(&other.text);
        if !other.is_safe() {
            self.safety = Safety::IsNotSafe;
        }
    }

    pub fn replace(&self, from: &str, to: &str) -> Self {
        Self::new(self.text.replace(from, to))
    }

    pub fn to_upper(&self) -> Self {
        Self::new(self.text.to_uppercase())
    }

    pub fn to_lower(&self) -> Self {
        Self::new(self.text.to_lowercase())
    }

    pub fn trimmed(&self) -> Self {
        Self::with_safety(self.text.trim(), self.safety)
    }

    /// Characters `start..end`, clamped to the string length.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let text: String = self
            .text
            .chars()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect();
        Self::with_safety(text, self.safety)
    }
}

impl Add for SafeString {
    type Output = SafeString;

    fn add(mut self, rhs: SafeString) -> SafeString {
        self.push_str(&rhs);
        self
    }
}

impl From<&str> for SafeString {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for SafeString {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl AsRef<str> for SafeString {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for SafeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
