//! Error handling foundation for flowwright.
//!
//! Only the `Result` alias lives here. Each crate owns its domain errors and
//! wraps them in a rootcause `Report` where they cross a process boundary.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_alias_carries_values() {
        let ok: Result<u32> = Ok(7);
        assert_eq!(ok.expect("should be ok"), 7);
    }
}
