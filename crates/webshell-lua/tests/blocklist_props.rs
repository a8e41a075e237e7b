//! Blocked code never runs, whatever surrounds the pattern.

use proptest::prelude::*;
use webshell_auth::DEFAULT_BLOCKED_PATTERNS;
use webshell_lua::testing::ConsoleHarness;
use webshell_lua::ConsoleError;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn blocked_code_has_no_effect(
        prefix in "[a-z =;]{0,12}",
        suffix in "[a-z ()';]{0,12}",
        index in 0..DEFAULT_BLOCKED_PATTERNS.len(),
    ) {
        let h = ConsoleHarness::new();
        let pattern = DEFAULT_BLOCKED_PATTERNS[index];
        let code = format!("marker = 1; {prefix}{pattern}{suffix}");

        let err = h.execute(&code).expect_err("blocked");
        prop_assert!(matches!(err, ConsoleError::BlockedPattern { .. }), "{err:?}");
        prop_assert_eq!(h.execute("marker").expect("execute"), "");
    }
}
