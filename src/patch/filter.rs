/// Decides whether a loaded class is the patch target.
///
/// Implementations must be pure: the hook may call them from any thread.
pub trait ClassFilter: Send + Sync {
    fn matches(&self, class_name: &str) -> bool;
}

/// Exact match against one class name in internal (slash-separated) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactNameFilter {
    target: String,
}

impl ExactNameFilter {
    /// A dotted name such as `com.sun.glass.ui.Application` is accepted and
    /// stored in internal form.
    pub fn new(target: impl Into<String>) -> Self {
        let target: String = target.into();
        Self {
            target: target.replace('.', "/"),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl ClassFilter for ExactNameFilter {
    fn matches(&self, class_name: &str) -> bool {
        self.target == class_name
    }
}
