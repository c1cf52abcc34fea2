//! Rule engines over existing links.
//!
//! Safe-confirm promotes `suggested -> confirmed`; reject demotes
//! `suggested -> rejected`. Both re-read the structured reason stamped by
//! the pipelines instead of re-extracting signals.

pub mod engine;
pub mod reason;
pub mod reject;
pub mod safe_confirm;

pub use engine::{run_auto_reject, run_safe_confirm, RulePassReport};
pub use reason::{
    format_auto_confirm, format_auto_reject, parse_reason, CryptoDailyReason,
    CryptoIntradayReason, GenericReason, MacroReason, ParsedReason, Tier,
};
pub use reject::{evaluate_reject, RejectConfig, RejectVerdict};
pub use safe_confirm::{evaluate_safe_confirm, ConfirmVerdict, SAFE_CONFIRM_VERSIONS};
