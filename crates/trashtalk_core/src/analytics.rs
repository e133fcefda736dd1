//! crates/trashtalk_core/src/analytics.rs
//!
//! Pure functions computing the derived display metrics (chaos level, sanity
//! remaining, viral potential) from a session's local generation count.
//! No I/O, deterministic given their inputs.

/// Display label for how unhinged the current session has become.
pub fn chaos_level(session_count: u32) -> &'static str {
    match session_count {
        0 => "Dormant",
        1..=2 => "Warming Up",
        3..=4 => "Getting Spicy",
        5..=9 => "Full Chaos",
        _ => "MAXIMUM OVERDRIVE",
    }
}

/// Sanity decays by 10 points per generation, floored at zero.
pub fn sanity_remaining(session_count: u32) -> u32 {
    100u32.saturating_sub(session_count.saturating_mul(10))
}

/// Synthetic "viral potential" percentage, capped at 99.
///
/// `random_factor` must yield an integer in `[0, 10)`; it is injected so
/// tests can pin the result.
pub fn viral_potential(session_count: u32, random_factor: impl FnOnce() -> u32) -> u32 {
    let base = 50;
    let bonus = (session_count * 5).min(40);
    (base + bonus + random_factor()).min(99)
}

/// A `random_factor` provider for production use, drawing from the thread
/// RNG.
pub fn thread_rng_factor() -> u32 {
    use rand::Rng;
    rand::thread_rng().gen_range(0..10)
}

/// Formats a session duration in minutes as `"Xm"` or `"Xh Ym"`.
pub fn format_session_duration(minutes: u64) -> String {
    if minutes < 60 {
        format!("{}m", minutes)
    } else {
        format!("{}h {}m", minutes / 60, minutes % 60)
    }
}
