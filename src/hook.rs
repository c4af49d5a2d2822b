//! The host boundary: one call per class load.

use crate::classfile::ClassFileResult;
use crate::config::{AgentConfig, RuleProfile};
use crate::patch::{ClassFilter, ExactNameFilter, PatchEngine, PatchReport};
use std::borrow::Cow;
use tracing::debug;

/// Opaque handle to a host object (class loader, class, protection domain).
/// The hook never looks inside.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HostRef(u64);

impl HostRef {
    pub const NULL: HostRef = HostRef(0);

    pub fn from_raw(raw: u64) -> Self {
        HostRef(raw)
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Host contract for load-time transformation. `None` keeps the original
/// bytes; `Some` replaces them.
pub trait ClassFileTransformer: Send + Sync {
    fn transform(
        &self,
        loader: HostRef,
        class_name: Option<&str>,
        class_being_redefined: HostRef,
        protection_domain: HostRef,
        class_file_buffer: &[u8],
    ) -> Option<Vec<u8>>;
}

#[derive(Debug)]
struct Active<F> {
    filter: F,
    engine: PatchEngine,
}

/// Wires filter, codec, and engine together.
///
/// When configuration is disabled nothing is kept, so the filter cannot be
/// consulted.
#[derive(Debug)]
pub struct LoadHook<F = ExactNameFilter> {
    active: Option<Active<F>>,
}

impl LoadHook<ExactNameFilter> {
    /// The standard JavaFX profile.
    pub fn new(config: &AgentConfig) -> Self {
        Self::from_profile(config, &RuleProfile::standard())
    }

    pub fn from_profile(config: &AgentConfig, profile: &RuleProfile) -> Self {
        let filter = ExactNameFilter::new(profile.target.class.clone());
        Self::with_filter(config, profile, filter)
    }
}

impl<F: ClassFilter> LoadHook<F> {
    pub fn with_filter(config: &AgentConfig, profile: &RuleProfile, filter: F) -> Self {
        debug!(
            application_name = config.application_name.as_deref().unwrap_or("<unset>"),
            "configuration observed"
        );
        let active = config.application_name.as_ref().map(|value| Active {
            filter,
            engine: PatchEngine::new(profile.rule_set(value.clone())),
        });
        Self { active }
    }

    pub fn is_enabled(&self) -> bool {
        self.active.is_some()
    }

    /// Returns the bytes the host should link: patched when `class_name` is
    /// the target and the class round-trips, the original otherwise.
    pub fn on_load<'a>(&self, class_name: &str, original: &'a [u8]) -> Cow<'a, [u8]> {
        let Some(active) = &self.active else {
            return Cow::Borrowed(original);
        };
        if !active.filter.matches(class_name) {
            return Cow::Borrowed(original);
        }

        debug!(class = class_name, "target class found");
        match active.engine.patch_bytes(original) {
            Ok((bytes, report)) if report.changed() => {
                debug!(
                    class = class_name,
                    changes = report.total_changes(),
                    "class patched"
                );
                Cow::Owned(bytes)
            }
            Ok(_) => {
                debug!(class = class_name, "nothing to patch");
                Cow::Borrowed(original)
            }
            Err(error) => {
                debug!(class = class_name, %error, "keeping original bytes");
                Cow::Borrowed(original)
            }
        }
    }

    /// Like [`LoadHook::on_load`], but surfaces the report and any codec
    /// error. `Ok(None)` means the hook would not touch this class.
    pub fn try_patch(
        &self,
        class_name: &str,
        original: &[u8],
    ) -> ClassFileResult<Option<(Vec<u8>, PatchReport)>> {
        match &self.active {
            Some(active) if active.filter.matches(class_name) => {
                active.engine.patch_bytes(original).map(Some)
            }
            _ => Ok(None),
        }
    }
}

impl<F: ClassFilter> ClassFileTransformer for LoadHook<F> {
    fn transform(
        &self,
        _loader: HostRef,
        class_name: Option<&str>,
        _class_being_redefined: HostRef,
        _protection_domain: HostRef,
        class_file_buffer: &[u8],
    ) -> Option<Vec<u8>> {
        // Hidden and lambda classes arrive without a name.
        let class_name = class_name?;
        match self.on_load(class_name, class_file_buffer) {
            Cow::Owned(bytes) => Some(bytes),
            Cow::Borrowed(_) => None,
        }
    }
}
