use redis::Script;
use std::sync::LazyLock;

pub const COUNTED_MEMBERSHIP_SCRIPT_BODY: &str = include_str!("../../lua/counted_membership.lua");
pub const RECONCILE_COUNTER_SCRIPT_BODY: &str = include_str!("../../lua/reconcile_counter.lua");

pub static COUNTED_MEMBERSHIP_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(COUNTED_MEMBERSHIP_SCRIPT_BODY));
pub static RECONCILE_COUNTER_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(RECONCILE_COUNTER_SCRIPT_BODY));
