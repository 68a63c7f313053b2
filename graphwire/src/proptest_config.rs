use proptest::test_runner::Config;

/// Shared config for property tests.
pub(crate) fn proptest_cfg() -> Config {
    Config {
        cases: 256,
        failure_persistence: None,
        ..Config::default()
    }
}
