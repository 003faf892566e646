//! Environment overrides for the collector configuration.
//!
//! Kept in its own test binary, as a single test, because it mutates the
//! process environment.

use proto_gc::config::{
    ENV_COLLECT_ON_DROP, ENV_ROOT_CAPACITY, ENV_ROOT_TRIGGER, ENV_VERIFY_ROOTS,
};
use proto_gc::{CollectorConfig, ConfigError, Heap};

fn set(var: &str, value: &str) {
    // SAFETY: this binary runs a single test, so no other thread reads the
    // environment concurrently.
    unsafe { std::env::set_var(var, value) };
}

fn clear(var: &str) {
    // SAFETY: as above.
    unsafe { std::env::remove_var(var) };
}

#[test]
fn test_config_from_env() {
    // Nothing set: defaults
    for var in [ENV_ROOT_TRIGGER, ENV_ROOT_CAPACITY, ENV_COLLECT_ON_DROP, ENV_VERIFY_ROOTS] {
        clear(var);
    }
    assert_eq!(CollectorConfig::from_env(), Ok(CollectorConfig::default()));

    // Overrides
    set(ENV_ROOT_TRIGGER, "64");
    set(ENV_ROOT_CAPACITY, " 32 ");
    set(ENV_COLLECT_ON_DROP, "off");
    set(ENV_VERIFY_ROOTS, "YES");
    let config = CollectorConfig::from_env().expect("valid overrides");
    assert_eq!(config.root_buffer_trigger, 64);
    assert_eq!(config.initial_root_capacity, 32);
    assert!(!config.collect_on_drop);
    assert!(config.verify_roots);
    assert!(Heap::new(config).is_ok());

    // Unparseable value
    set(ENV_ROOT_TRIGGER, "lots");
    assert_eq!(
        CollectorConfig::from_env(),
        Err(ConfigError::InvalidEnv {
            var: ENV_ROOT_TRIGGER,
            value: "lots".into(),
        })
    );

    // Parseable but invalid
    set(ENV_ROOT_TRIGGER, "0");
    assert_eq!(CollectorConfig::from_env(), Err(ConfigError::ZeroRootTrigger));

    set(ENV_ROOT_TRIGGER, "1");
    set(ENV_ROOT_CAPACITY, "17");
    assert_eq!(
        CollectorConfig::from_env(),
        Err(ConfigError::RootCapacityTooLarge { capacity: 17, max: 16 })
    );

    set(ENV_COLLECT_ON_DROP, "maybe");
    set(ENV_ROOT_CAPACITY, "1");
    assert!(matches!(
        CollectorConfig::from_env(),
        Err(ConfigError::InvalidEnv { var: ENV_COLLECT_ON_DROP, .. })
    ));

    for var in [ENV_ROOT_TRIGGER, ENV_ROOT_CAPACITY, ENV_COLLECT_ON_DROP, ENV_VERIFY_ROOTS] {
        clear(var);
    }
}
