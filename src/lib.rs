//! George Agent: load-time class file patching for JavaFX application names.
//!
//! When `APPLICATION_NAME` is set, the agent rewrites
//! `com/sun/glass/ui/Application` as it is loaded so that the value becomes
//! the application name GTK reports (and `StartupWMClass` matches):
//!
//! - the `DEFAULT_NAME` constant is replaced by the configured value,
//! - `setName` is reduced to a bare `return`,
//! - every `ldc` in the constructor becomes `getstatic DEFAULT_NAME`.
//!
//! Every other class passes through byte for byte.
//!
//! # Architecture
//!
//! [`LoadHook`] is the host boundary. It asks a [`ClassFilter`] whether a
//! class is the target, decodes it into a [`ClassModel`], lets the
//! [`PatchEngine`] edit the model, and encodes it again. Any decode or encode
//! failure is logged and the original bytes are returned.
//!
//! # Example
//!
//! ```no_run
//! use george_agent::{AgentConfig, LoadHook};
//!
//! let config = AgentConfig::from_env();
//! george_agent::diagnostics::init(&config);
//! let hook = LoadHook::new(&config);
//!
//! let original = std::fs::read("Application.class").unwrap();
//! let linked = hook.on_load("com/sun/glass/ui/Application", &original);
//! println!("{} bytes", linked.len());
//! ```

pub mod archive;
pub mod checksum;
pub mod classfile;
pub mod config;
pub mod diagnostics;
pub mod hook;
pub mod patch;

// Re-exports
pub use archive::{extract, ArchiveError, ExtractSummary};
pub use checksum::checksum;
pub use classfile::{decode, encode, ClassModel, Instruction, MalformedInputError};
pub use config::{load_from_path, load_from_str, AgentConfig, ConfigError, RuleProfile};
pub use hook::{ClassFileTransformer, HostRef, LoadHook};
pub use patch::{
    ClassFilter, ExactNameFilter, PatchEngine, PatchReport, PatchRule, RuleOutcome, RuleSet,
};
