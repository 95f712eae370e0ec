use muallim_core::{ReviewStats, messages};

/// Host portion of the backend URL, for the status bar.
pub fn format_host(base_url: &str) -> String {
    base_url
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .trim_end_matches('/')
        .to_string()
}

/// Multi-line notice for the /stats output: totals, average, then the
/// per-star distribution from five stars down to one.
pub fn format_stats(stats: &ReviewStats) -> String {
    let mut out = format!(
        "{}: {}\n{}: {:.1}",
        messages::STATS_TOTAL_LABEL,
        stats.total_reviews,
        messages::STATS_AVERAGE_LABEL,
        stats.average_rating,
    );
    for rating in (1..=5u8).rev() {
        let count = stats
            .rating_distribution
            .get(&rating.to_string())
            .copied()
            .unwrap_or(0);
        out.push_str(&format!("\n{:<5} {}", "★".repeat(rating as usize), count));
    }
    out
}
