/// A message recorded while simulating, grouped by the component that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub category: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

/// Ordered log of diagnostics for a single simulation run. Every entry is also emitted as a
/// `tracing` debug event.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticLog {
    entries: Vec<Diagnostic>,
}

impl DiagnosticLog {
    pub fn add(&mut self, category: &'static str, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(target: "binsim::diagnostics", category, %message);
        self.entries.push(Diagnostic { category, message });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Diagnostics recorded under the given category, in the order they were added.
    pub fn by_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.entries
            .iter()
            .filter(move |diagnostic| diagnostic.category == category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
