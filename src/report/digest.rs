use crate::models::Candidate;

/// Digest for a run with no candidates
pub const EMPTY_DIGEST: &str = "No candidates found";

const BREAKOUT_TAG: &str = "  breakout";

/// Human-readable alert text, at most `max_length` characters.
///
/// Lowest-ranked entries are dropped whole until the text fits; a final
/// `(+N more in CSV)` line counts the dropped entries.
pub fn to_digest(candidates: &[Candidate], max_length: usize) -> String {
    if candidates.is_empty() {
        return EMPTY_DIGEST.to_string();
    }

    let entries: Vec<String> = candidates.iter().map(format_entry).collect();

    // prefix[k] = length of the first k entries joined by newlines
    let mut prefix = vec![0usize; entries.len() + 1];
    for (i, entry) in entries.iter().enumerate() {
        let separator = usize::from(i > 0);
        prefix[i + 1] = prefix[i] + separator + entry.chars().count();
    }

    let total = entries.len();
    for keep in (1..=total).rev() {
        let dropped = total - keep;
        let overflow = (dropped > 0).then(|| format!("(+{dropped} more in CSV)"));

        let length = prefix[keep]
            + overflow
                .as_ref()
                .map_or(0, |line| 1 + line.chars().count());

        if length <= max_length {
            let mut lines: Vec<&str> = entries[..keep].iter().map(String::as_str).collect();
            if let Some(line) = overflow.as_deref() {
                lines.push(line);
            }
            return lines.join("\n");
        }
    }

    // Not even the top entry fits
    format!("(+{total} more in CSV)")
}

/// `TICKER  $price  volume  +change%`, tagged when the close is a 20-session breakout
fn format_entry(candidate: &Candidate) -> String {
    let quote = &candidate.quote;
    let mut entry = format!(
        "{}  ${}  {}  {:+.2}%",
        quote.ticker,
        format_price(quote.price),
        group_thousands(quote.volume),
        quote.percent_change
    );
    if quote.is_breakout() {
        entry.push_str(BREAKOUT_TAG);
    }
    entry
}

/// Sub-dollar prices keep four decimals
fn format_price(price: f64) -> String {
    if price >= 1.0 {
        format!("{price:.2}")
    } else {
        format!("{price:.4}")
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    grouped
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::Quote;

    fn candidate(ticker: &str, rank: u32) -> Candidate {
        Candidate {
            quote: Quote {
                ticker: ticker.to_string(),
                price: 1.2,
                volume: 500_000,
                percent_change: 12.0,
                timestamp: Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap(),
                avg_volume: None,
                high_20d: None,
            },
            score: 69.0,
            rank,
        }
    }

    #[test]
    fn test_empty_digest_literal() {
        assert_eq!(to_digest(&[], 1900), "No candidates found");
    }

    #[test]
    fn test_entry_format() {
        assert_eq!(to_digest(&[candidate("ABC", 1)], 1900), "ABC  $1.20  500,000  +12.00%");

        let mut cheap = candidate("CHP", 1);
        cheap.quote.price = 0.2534;
        cheap.quote.percent_change = -3.456;
        cheap.quote.volume = 1_234_567_890;
        assert_eq!(to_digest(&[cheap], 1900), "CHP  $0.2534  1,234,567,890  -3.46%");
    }

    #[test]
    fn test_breakout_entry_is_tagged() {
        let mut hot = candidate("HOT", 1);
        hot.quote.high_20d = Some(1.2);
        let mut cold = candidate("CLD", 2);
        cold.quote.high_20d = Some(1.5);

        assert_eq!(
            to_digest(&[hot, cold], 1900),
            "HOT  $1.20  500,000  +12.00%  breakout\nCLD  $1.20  500,000  +12.00%"
        );
    }

    #[test]
    fn test_entries_joined_in_rank_order() {
        let digest = to_digest(&[candidate("AAA", 1), candidate("BBB", 2)], 1900);
        let lines: Vec<&str> = digest.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("AAA"));
        assert!(lines[1].starts_with("BBB"));
    }

    #[test]
    fn test_tail_entries_dropped_whole() {
        let candidates: Vec<Candidate> = (1..=10)
            .map(|i| candidate(&format!("T{i:02}"), i))
            .collect();
        let entry_len = "T01  $1.20  500,000  +12.00%".len();

        // Room for three entries plus the overflow line
        let budget = entry_len * 3 + 2 + 1 + "(+7 more in CSV)".len();
        let digest = to_digest(&candidates, budget);
        let lines: Vec<&str> = digest.lines().collect();

        assert!(digest.chars().count() <= budget);
        assert_eq!(lines, vec![
            "T01  $1.20  500,000  +12.00%",
            "T02  $1.20  500,000  +12.00%",
            "T03  $1.20  500,000  +12.00%",
            "(+7 more in CSV)",
        ]);
    }

    #[test]
    fn test_full_digest_when_it_fits() {
        let candidates: Vec<Candidate> = (1..=3)
            .map(|i| candidate(&format!("T{i:02}"), i))
            .collect();
        let digest = to_digest(&candidates, 1900);

        assert_eq!(digest.lines().count(), 3);
        assert!(!digest.contains("more in CSV"));
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(-1234567), "-1,234,567");
    }
}
