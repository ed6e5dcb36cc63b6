//! Capabilities the host editor lends to the annotation layer.

use crate::LensError;

/// Button offered next to a user-facing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserAction {
    /// Ask the user for a key.
    InputApiKey,
    /// Open the dashboard to create a key.
    GetNewApiKey,
    /// Open the dashboard to upgrade the plan.
    Upgrade,
}

impl UserAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::InputApiKey => "Input API Key",
            Self::GetNewApiKey => "Get New API Key",
            Self::Upgrade => "Upgrade",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [Self::InputApiKey, Self::GetNewApiKey, Self::Upgrade]
            .into_iter()
            .find(|action| action.label() == label)
    }

    /// Whether choosing the action opens the dashboard page.
    pub fn opens_dashboard(self) -> bool {
        matches!(self, Self::GetNewApiKey | Self::Upgrade)
    }
}

/// Host editor services used by the provider.
///
/// Calls must not block: implementations hand the work to the editor and
/// return immediately.
pub trait HostEditor: Send + Sync {
    /// Shows an error, offering [`LensError::actions`] as buttons.
    fn report_error(&self, error: &LensError);

    /// Shows a short informational message.
    fn show_info(&self, message: &str);

    /// Cached annotations changed; the editor should ask for them again.
    fn annotations_changed(&self);

    /// Starts a progress indicator identified by `key`.
    fn begin_progress(&self, key: &str, title: &str);

    /// Ends the progress indicator identified by `key`.
    fn end_progress(&self, key: &str);
}

/// Host that ignores everything. Used by one-shot tools without an editor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHost;

impl HostEditor for NoopHost {
    fn report_error(&self, _error: &LensError) {}
    fn show_info(&self, _message: &str) {}
    fn annotations_changed(&self) {}
    fn begin_progress(&self, _key: &str, _title: &str) {}
    fn end_progress(&self, _key: &str) {}
}
