//! Case-insensitive substring markers.

/// A marker string matched case-insensitively anywhere inside a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    text: String,
    needle: String,
}

impl Marker {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let needle = text.to_lowercase();
        Self { text, needle }
    }

    /// The marker as configured
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn matches(&self, line: &str) -> bool {
        line.to_lowercase().contains(&self.needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_exact_match() {
        assert!(Marker::new("sync_ok").matches("sync_ok\n"));
    }

    #[test]
    fn test_marker_case_insensitive() {
        let marker = Marker::new("Session Ready");
        assert!(marker.matches("[  12.004] SESSION READY on ttyS1"));
        assert!(marker.matches("session ready"));
    }

    #[test]
    fn test_marker_no_match() {
        assert!(!Marker::new("sync_ok").matches("noise\n"));
    }

    #[test]
    fn test_marker_keeps_original_text() {
        assert_eq!(Marker::new("FaTaL").as_str(), "FaTaL");
    }
}
