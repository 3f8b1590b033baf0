//! Field paths and the conflicts recorded against them.
//!
//! A [`Conflict`] is the only failure signal produced while applying an instance type: it names
//! a field of the target that was already set when the instance type wanted to own it. Paths are
//! built from a caller supplied base (for example `spec` for a bare VirtualMachineInstance, or
//! `spec.template.spec` for a VirtualMachine) by appending child segments.

use std::{fmt::Display, ops::Deref};

use snafu::Snafu;

/// An ordered list of field names, rendered as a dotted path.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a new path extended by `segments`. The receiver is left untouched.
    pub fn child<I, S>(&self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = self.clone();
        path.segments.extend(segments.into_iter().map(Into::into));
        path
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// A field of the target that collides with a mandatory instance type value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Conflict {
    path: FieldPath,
    message: Option<String>,
}

impl Conflict {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldPath::new(segments).into()
    }

    /// Attaches a human readable explanation to the conflict.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl From<FieldPath> for Conflict {
    fn from(path: FieldPath) -> Self {
        Self {
            path,
            message: None,
        }
    }
}

impl Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.path.fmt(f)
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("VM field(s) {conflicts} conflicts with selected instance type"))]
pub struct ConflictsError {
    conflicts: Conflicts,
}

impl ConflictsError {
    pub fn conflicts(&self) -> &Conflicts {
        &self.conflicts
    }
}

/// A list of conflicts, in the order the appliers discovered them.
///
/// Renders as the comma separated list of conflicting paths.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Conflicts(Vec<Conflict>);

impl Conflicts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, conflict: impl Into<Conflict>) {
        self.0.push(conflict.into());
    }

    /// Turns a non-empty list into an error, so callers can use `?` on a resolution result.
    pub fn into_result(self) -> Result<(), ConflictsError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            ConflictsSnafu { conflicts: self }.fail()
        }
    }
}

impl Deref for Conflicts {
    type Target = [Conflict];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Conflicts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, conflict) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            conflict.fmt(f)?;
        }
        Ok(())
    }
}

impl From<Conflict> for Conflicts {
    fn from(conflict: Conflict) -> Self {
        Self(vec![conflict])
    }
}

impl From<FieldPath> for Conflicts {
    fn from(path: FieldPath) -> Self {
        Conflict::from(path).into()
    }
}

impl FromIterator<Conflict> for Conflicts {
    fn from_iter<T: IntoIterator<Item = Conflict>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Conflict> for Conflicts {
    fn extend<T: IntoIterator<Item = Conflict>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Conflicts {
    type IntoIter = std::vec::IntoIter<Conflict>;
    type Item = Conflict;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Conflicts {
    type IntoIter = std::slice::Iter<'a, Conflict>;
    type Item = &'a Conflict;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
