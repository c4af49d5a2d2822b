//! Integration tests for the load hook
//!
//! Covers pass-through for unrelated classes, the disabled state, malformed
//! input fallback, and concurrent use from several loader threads.

use george_agent::classfile::{decode, ConstantValue};
use george_agent::config::{load_from_str, AgentConfig};
use george_agent::{ClassFileTransformer, HostRef, LoadHook};
use std::borrow::Cow;
use std::sync::Arc;
use std::thread;

const APPLICATION: &[u8] = include_bytes!("fixtures/classes/com/sun/glass/ui/Application.class");
const PROBE: &[u8] = include_bytes!("fixtures/classes/probe/Probe.class");
const CLASS: &str = "com/sun/glass/ui/Application";

fn injected_name(bytes: &[u8]) -> Option<ConstantValue> {
    decode(bytes)
        .unwrap()
        .field("DEFAULT_NAME")
        .unwrap()
        .constant_value
        .clone()
}

#[test]
fn test_target_class_is_patched() {
    let hook = LoadHook::new(&AgentConfig::enabled("MyApp"));
    let linked = hook.on_load(CLASS, APPLICATION);

    assert!(matches!(linked, Cow::Owned(_)));
    assert_eq!(
        injected_name(&linked),
        Some(ConstantValue::String("MyApp".into()))
    );
}

#[test]
fn test_unrelated_class_is_returned_as_is() {
    let hook = LoadHook::new(&AgentConfig::enabled("MyApp"));
    let linked = hook.on_load("probe/Probe", PROBE);
    assert!(matches!(linked, Cow::Borrowed(bytes) if bytes == PROBE));

    // The name decides, not the contents.
    let linked = hook.on_load("com/sun/glass/ui/Window", APPLICATION);
    assert!(matches!(linked, Cow::Borrowed(bytes) if bytes == APPLICATION));
}

#[test]
fn test_disabled_config_passes_everything_through() {
    let hook = LoadHook::new(&AgentConfig::default());
    assert!(!hook.is_enabled());
    assert!(matches!(hook.on_load(CLASS, APPLICATION), Cow::Borrowed(_)));
    assert!(hook.try_patch(CLASS, APPLICATION).unwrap().is_none());
}

#[test]
fn test_debug_alone_does_not_enable_patching() {
    let config = AgentConfig::from_lookup(|key| (key == "DEBUG").then(String::new));
    assert!(config.debug);
    let hook = LoadHook::new(&config);
    assert!(matches!(hook.on_load(CLASS, APPLICATION), Cow::Borrowed(_)));
}

#[test]
fn test_corrupt_target_falls_back_to_original() {
    let hook = LoadHook::new(&AgentConfig::enabled("MyApp"));
    let mut corrupt = APPLICATION.to_vec();
    corrupt.truncate(corrupt.len() - 3);

    let linked = hook.on_load(CLASS, &corrupt);
    assert_eq!(linked.as_ref(), corrupt.as_slice());
    assert!(hook.try_patch(CLASS, &corrupt).is_err());
}

#[test]
fn test_already_patched_class_is_not_replaced() {
    let hook = LoadHook::new(&AgentConfig::enabled("MyApp"));
    let once = hook.on_load(CLASS, APPLICATION).into_owned();
    assert!(matches!(hook.on_load(CLASS, &once), Cow::Borrowed(_)));
}

#[test]
fn test_transformer_contract() {
    let hook = LoadHook::new(&AgentConfig::enabled("MyApp"));
    let loader = HostRef::from_raw(0x7f00_1000);

    let replaced = hook.transform(loader, Some(CLASS), HostRef::NULL, HostRef::NULL, APPLICATION);
    assert!(replaced.is_some());

    let kept = hook.transform(
        loader,
        Some("probe/Probe"),
        HostRef::NULL,
        HostRef::NULL,
        PROBE,
    );
    assert_eq!(kept, None);
}

#[test]
fn test_profile_can_retarget_with_dotted_name() {
    let profile = load_from_str(
        r#"
[target]
class = "probe.Probe"

[[rules]]
type = "erase-body"
method = "main"
"#,
    )
    .unwrap();
    let hook = LoadHook::from_profile(&AgentConfig::enabled("x"), &profile);

    let linked = hook.on_load("probe/Probe", PROBE);
    let model = decode(&linked).unwrap();
    let main = model.methods_named("main").next().unwrap();
    assert_eq!(main.instructions().len(), 1);
    assert!(matches!(hook.on_load(CLASS, APPLICATION), Cow::Borrowed(_)));
}

#[test]
fn test_concurrent_loads_share_one_hook() {
    let hook = Arc::new(LoadHook::new(&AgentConfig::enabled("MyApp")));
    let expected = hook.on_load(CLASS, APPLICATION).into_owned();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let hook = Arc::clone(&hook);
            thread::spawn(move || {
                if i % 2 == 0 {
                    hook.on_load(CLASS, APPLICATION).into_owned()
                } else {
                    hook.on_load("probe/Probe", PROBE).into_owned()
                }
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let bytes = handle.join().unwrap();
        if i % 2 == 0 {
            assert_eq!(bytes, expected);
        } else {
            assert_eq!(bytes, PROBE);
        }
    }
}
