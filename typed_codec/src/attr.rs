//! Configuration knobs shared by the codecs and the record adapter.

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Endian {
    Little,
    #[default]
    Big,
}

/// How a [`crate::RecordAdapter`] lays out and decodes its record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct RecordOptions {
    /// Lay the fields out on the wire in reverse declaration order. `None`
    /// keeps the record's declared order (`#[record(reverse)]`).
    pub reverse: Option<bool>,
    /// Surround each field with `@<name` / `@>name` stream offset markers.
    pub markers: bool,
    /// Copy aggregate entries that are not declared fields into the record's extras.
    pub pass_through: bool,
}

impl RecordOptions {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = Some(reverse);
        self
    }

    pub fn markers(mut self, markers: bool) -> Self {
        self.markers = markers;
        self
    }

    pub fn pass_through(mut self, pass_through: bool) -> Self {
        self.pass_through = pass_through;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_chain() {
        assert_eq!(RecordOptions::zero().reverse, None);
        let options = RecordOptions::zero().reverse(true).markers(true);
        assert_eq!(options.reverse, Some(true));
        assert!(options.markers);
        assert!(!options.pass_through);
        assert_eq!(Endian::default(), Endian::Big);
    }
}
